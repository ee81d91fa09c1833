//! Server connection and logging settings.
//!
//! Read once at startup from `~/.config/caldav-rpc/config.toml` (or an
//! explicit path), then overridden by `CALDAV_*` environment variables.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_SERVER_URL: &str = "http://localhost:5232";
const DEFAULT_USERNAME: &str = "user";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// URL of the calendar collection records are stored in
    pub server_url: String,
    pub username: String,
    pub password: String,
    pub verify_tls: bool,
    pub timeout_secs: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: DEFAULT_SERVER_URL.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: String::new(),
            verify_tls: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("verify_tls", &self.verify_tls)
            .field("timeout_secs", &self.timeout_secs)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError("Could not determine config directory".into()))?
            .join("caldav-rpc");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path` (which must exist) or from the default location (which
    /// may not), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let default_path = Self::config_path()?;
                if default_path.exists() {
                    Self::read(&default_path)?
                } else {
                    Config::default()
                }
            }
        };

        config.with_env(|key| std::env::var(key).ok())
    }

    fn read(path: &Path) -> Result<Config, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError(format!("Could not read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Config, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError(format!("Invalid config file: {e}")))
    }

    /// Apply `CALDAV_*` and `LOG_LEVEL` overrides read through `lookup`.
    pub fn with_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Config, ConfigError> {
        if let Some(url) = lookup("CALDAV_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(username) = lookup("CALDAV_USERNAME") {
            self.username = username;
        }
        if let Some(password) = lookup("CALDAV_PASSWORD") {
            self.password = password;
        }
        for key in ["CALDAV_USE_SSL", "CALDAV_VERIFY_TLS"] {
            if let Some(value) = lookup(key) {
                self.verify_tls = parse_bool(key, &value)?;
            }
        }
        if let Some(value) = lookup("CALDAV_TIMEOUT_SECS") {
            self.timeout_secs = value
                .trim()
                .parse()
                .map_err(|_| ConfigError(format!("CALDAV_TIMEOUT_SECS is not a number: {value}")))?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.server_url)
            .map_err(|e| ConfigError(format!("Invalid server_url '{}': {e}", self.server_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError(format!(
                "server_url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError("timeout_secs must be greater than zero".into()));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError(format!("{key} is not a boolean: {value}"))),
    }
}
