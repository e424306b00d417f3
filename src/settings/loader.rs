//! TOML settings loading and listener overrides

use crate::core::logging::{init_logging, LogFormat};
use crate::listener::api::{ListenerConfig, ListenerRegistration, ManagerConfig};
use crate::settings::error::{SettingsError, SettingsResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// `<config dir>/joblistener/joblistener.toml`, if the platform has a config dir
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("joblistener").join("joblistener.toml"))
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub manager: ManagerConfig,
    pub logging: LoggingSettings,
    /// Per-listener overrides keyed by registration name
    pub listeners: BTreeMap<String, ListenerOverrides>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: String,
    pub file: Option<String>,
    pub color: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: None,
            format: "text".to_string(),
            file: None,
            color: true,
        }
    }
}

impl LoggingSettings {
    pub fn log_format(&self) -> SettingsResult<LogFormat> {
        Ok(self.format.parse::<LogFormat>()?)
    }

    /// Install the global logger from these settings
    pub fn init(&self) -> SettingsResult<()> {
        init_logging(
            self.level.as_deref(),
            self.log_format()?,
            self.file.as_deref(),
            self.color,
        )?;
        Ok(())
    }
}

/// Optional replacement for each `ListenerConfig` field
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenerOverrides {
    pub queue: Option<String>,
    pub workers: Option<u32>,
    pub auto_ack: Option<bool>,
    pub visibility_timeout: Option<u32>,
    pub max_messages: Option<u32>,
    pub retry_on_error: Option<bool>,
    pub max_retries: Option<u32>,
}

impl ListenerOverrides {
    pub fn apply(&self, config: &mut ListenerConfig) {
        if let Some(queue) = &self.queue {
            config.queue = queue.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(auto_ack) = self.auto_ack {
            config.auto_ack = auto_ack;
        }
        if let Some(seconds) = self.visibility_timeout {
            config.visibility_timeout = seconds;
        }
        if let Some(max_messages) = self.max_messages {
            config.max_messages = max_messages;
        }
        if let Some(retry) = self.retry_on_error {
            config.retry_on_error = retry;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
    }
}

impl Settings {
    /// Parse settings from TOML text; `origin` names the source in errors
    pub fn parse(contents: &str, origin: &str) -> SettingsResult<Self> {
        toml::from_str(contents).map_err(|source| SettingsError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Load settings from a file that must exist
    pub async fn load(path: &Path) -> SettingsResult<Self> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
        let settings = Self::parse(&contents, &path.display().to_string())?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load `path` if given, else the default file if present, else defaults
    pub async fn discover(path: Option<&Path>) -> SettingsResult<Self> {
        match path {
            Some(path) => Self::load(path).await,
            None => match default_settings_path() {
                Some(default) if default.exists() => Self::load(&default).await,
                _ => {
                    log::trace!("No settings file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Rewrite registrations with the `[listeners.<name>]` overrides
    ///
    /// Fails if an override names no registration or leaves a config invalid.
    pub fn apply_overrides(
        &self,
        mut registrations: Vec<ListenerRegistration>,
    ) -> SettingsResult<Vec<ListenerRegistration>> {
        for name in self.listeners.keys() {
            if !registrations.iter().any(|r| r.name() == name) {
                return Err(SettingsError::UnknownListener {
                    listener: name.clone(),
                });
            }
        }

        for registration in &mut registrations {
            if let Some(overrides) = self.listeners.get(registration.name()) {
                overrides.apply(registration.config_mut());
                registration.validate()?;
                log::debug!(
                    "Applied settings overrides to listener '{}'",
                    registration.name()
                );
            }
        }
        Ok(registrations)
    }
}
