use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::config::types::Config;

/// Environment variables that override file values.
pub const ENV_API_URL: &str = "PAYSYNC_API_URL";
pub const ENV_WS_URL: &str = "PAYSYNC_WS_URL";
pub const ENV_TOKEN: &str = "PAYSYNC_TOKEN";
pub const ENV_USER_ID: &str = "PAYSYNC_USER_ID";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/paysync/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("paysync").join("config.toml")
    }

    /// Loads configuration from the default config file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from `path`.
    ///
    /// - If the file doesn't exist, returns `Config::default()`.
    /// - If the file exists, parses it as TOML and validates.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Applies `PAYSYNC_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = get(ENV_API_URL) {
            self.api.base_url = url;
        }
        if let Some(url) = get(ENV_WS_URL) {
            self.events.ws_url = url;
        }
        if let Some(token) = get(ENV_TOKEN) {
            self.auth.token = Some(token);
        }
        if let Some(user_id) = get(ENV_USER_ID) {
            self.auth.user_id = Some(user_id);
        }
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - API and event URLs parse and use a supported scheme
    /// - The namespace starts with `/`
    /// - Timeouts and buffers are non-zero
    /// - The reconnect backoff bounds are ordered
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("api.base_url", &self.api.base_url, &["http", "https"])?;
        check_url(
            "events.ws_url",
            &self.events.ws_url,
            &["http", "https", "ws", "wss"],
        )?;

        if !self.events.namespace.starts_with('/') {
            return Err(invalid(format!(
                "events.namespace '{}' must start with '/'",
                self.events.namespace
            )));
        }
        if self.api.timeout_seconds == 0 || self.api.connect_timeout_seconds == 0 {
            return Err(invalid("API timeouts must be greater than zero".to_string()));
        }
        if self.events.auth_timeout_ms == 0 || self.events.reply_timeout_ms == 0 {
            return Err(invalid("Event timeouts must be greater than zero".to_string()));
        }
        if self.events.event_buffer == 0 {
            return Err(invalid("events.event_buffer must be greater than zero".to_string()));
        }
        if self.events.reconnect_base_ms == 0
            || self.events.reconnect_base_ms > self.events.reconnect_max_ms
        {
            return Err(invalid(format!(
                "Reconnect backoff must satisfy 0 < reconnect_base_ms ({}) <= reconnect_max_ms ({})",
                self.events.reconnect_base_ms, self.events.reconnect_max_ms
            )));
        }

        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::ValidationError { message }
}

fn check_url(field: &str, value: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| invalid(format!("{} '{}' is not a valid URL: {}", field, value, e)))?;
    if !schemes.contains(&url.scheme()) {
        return Err(invalid(format!(
            "{} '{}' has unsupported scheme '{}'",
            field,
            value,
            url.scheme()
        )));
    }
    Ok(())
}
