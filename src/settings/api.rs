//! Public API for runtime settings

pub use crate::settings::error::{SettingsError, SettingsResult};
pub use crate::settings::loader::{
    default_settings_path, ListenerOverrides, LoggingSettings, Settings,
};
