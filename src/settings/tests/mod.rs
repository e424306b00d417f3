//! Test modules for runtime settings
