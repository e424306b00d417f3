//! Build metadata and listener API version accessors.
//! Includes the version.rs generated by the build script.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Parse the listener API version string from the build script into u32.
/// Falls back to a stable default if parsing fails.
pub fn get_api_version() -> u32 {
    LISTENER_API_VERSION.parse().unwrap_or(20251015)
}

/// Crate version from Cargo.toml
pub fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}
