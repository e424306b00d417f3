//! Runtime Settings
//!
//! Operator-facing configuration loaded from TOML. Listener configs are
//! declared in code; a settings file can only override them.
//!
//! ```toml
//! [manager]
//! wait_time = 20
//! shutdown_timeout = 10
//!
//! [manager.poll_backoff]
//! initial_delay = 1000
//! max_delay = 30000
//!
//! [logging]
//! level = "joblistener=debug,info"
//! format = "json"
//!
//! [listeners.SendWelcomeEmail]
//! workers = 4
//! retry_on_error = true
//! ```
//!
//! Without an explicit path, `<config dir>/joblistener/joblistener.toml` is
//! used when it exists.

pub(crate) mod error;
pub(crate) mod loader;

pub mod api;

#[cfg(test)]
mod tests;
