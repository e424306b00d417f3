//! Settings Error Types

use crate::core::error_handling::ContextualError;
use crate::core::logging::LoggingError;
use crate::listener::api::ListenerError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Cannot read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Settings override unknown listener '{listener}'")]
    UnknownListener { listener: String },

    #[error("Settings produce an invalid listener")]
    Listener {
        #[from]
        #[source]
        source: ListenerError,
    },

    #[error("Invalid logging settings")]
    Logging {
        #[from]
        #[source]
        source: LoggingError,
    },
}

impl ContextualError for SettingsError {
    fn is_user_actionable(&self) -> bool {
        match self {
            SettingsError::Listener { source } => source.is_user_actionable(),
            SettingsError::Logging { source } => {
                matches!(source, LoggingError::UnknownFormat { .. })
            }
            _ => true,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            SettingsError::Io { .. } => Some("Check that the settings file exists and is readable"),
            SettingsError::Parse { .. } => Some("Fix the TOML syntax or field names in the settings file"),
            SettingsError::UnknownListener { .. } => {
                Some("Every [listeners.<name>] section must match a registered listener")
            }
            SettingsError::Listener { source } => source.user_message(),
            SettingsError::Logging { source } => match source {
                LoggingError::UnknownFormat { .. } => Some("Use log format text, ext or json"),
                _ => None,
            },
        }
    }
}

/// Result type alias for settings operations
pub type SettingsResult<T> = Result<T, SettingsError>;
