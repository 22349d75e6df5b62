//! Configuration system (layered: defaults < TOML file < environment).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TurnkitError};
use crate::permission::PermissionConfig;
use crate::stream::StreamConfig;

/// Environment variable overriding the permission timeout (seconds).
pub const ENV_PERMISSION_TIMEOUT_SECS: &str = "TURNKIT_PERMISSION_TIMEOUT_SECS";
/// Environment variable toggling the no-handler fast rejection.
pub const ENV_REJECT_WITHOUT_HANDLER: &str = "TURNKIT_REJECT_WITHOUT_HANDLER";
/// Environment variable toggling the `always` allow-list.
pub const ENV_REMEMBER_ALWAYS: &str = "TURNKIT_REMEMBER_ALWAYS";
/// Environment variable overriding the decoder line cap (bytes).
pub const ENV_MAX_LINE_BYTES: &str = "TURNKIT_MAX_LINE_BYTES";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnkitConfig {
    pub permission: PermissionConfig,
    pub stream: StreamConfig,
}

impl TurnkitConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Defaults plus environment overrides (`.env` is loaded if present).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Full resolution: defaults, then the default config file if it exists,
    /// then environment overrides.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let path = default_config_path();
        let mut config = match Self::load_file(&path) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded config file");
                config
            }
            Err(TurnkitError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(err) => return Err(err),
        };
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment, in practice).
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_PERMISSION_TIMEOUT_SECS) {
            self.permission.timeout_secs = parse_number(ENV_PERMISSION_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_REJECT_WITHOUT_HANDLER) {
            self.permission.reject_without_handler = parse_flag(ENV_REJECT_WITHOUT_HANDLER, &value)?;
        }
        if let Some(value) = lookup(ENV_REMEMBER_ALWAYS) {
            self.permission.remember_always = parse_flag(ENV_REMEMBER_ALWAYS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_LINE_BYTES) {
            self.stream.max_line_bytes = parse_number(ENV_MAX_LINE_BYTES, &value)?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.permission.timeout_secs == 0 {
            return Err(TurnkitError::Configuration(
                "permission timeout must be at least one second".into(),
            ));
        }
        if self.stream.max_line_bytes == 0 {
            return Err(TurnkitError::Configuration(
                "max_line_bytes must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// `~/.turnkit/config.toml`.
pub fn default_config_path() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".turnkit"))
        .unwrap_or_else(|| PathBuf::from(".turnkit"))
        .join("config.toml")
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TurnkitError::Configuration(format!("{key}: expected a number, got {value:?}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(TurnkitError::Configuration(format!(
            "{key}: expected a boolean, got {value:?}"
        ))),
    }
}
