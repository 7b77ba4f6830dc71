//! Configuration management for critterlog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "critterlog";

/// Default sighting file name.
const DATA_FILE_NAME: &str = "sightings.txt";

/// Placeholder shown instead of secrets.
const REDACTED: &str = "********";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CRITTERLOG_`, sections split on `__`)
/// 2. TOML config file at `~/.config/critterlog/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the sighting file.
    /// Defaults to `~/.local/share/critterlog/sightings.txt`
    pub data_file: Option<PathBuf>,
}

/// Authentication configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Require a login before any sighting operation.
    pub enabled: bool,
    /// Shared login password.
    pub password: Option<String>,
    /// Extra password required to clear every sighting.
    pub mass_delete_password: Option<String>,
    /// Secret used to sign session cookies. Random per process when unset,
    /// which logs everyone out on restart.
    pub session_secret: Option<String>,
    /// Lifetime of a session cookie, in hours.
    pub session_ttl_hours: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            max_body_bytes: 64 * 1024,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            password: None,
            mass_delete_password: None,
            session_secret: None,
            session_ttl_hours: 24,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &self.enabled)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field(
                "mass_delete_password",
                &self.mass_delete_password.as_ref().map(|_| REDACTED),
            )
            .field(
                "session_secret",
                &self.session_secret.as_ref().map(|_| REDACTED),
            )
            .field("session_ttl_hours", &self.session_ttl_hours)
            .finish()
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Self::figment(config_path).extract::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration without validating it.
    ///
    /// Used by commands that only inspect the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_unchecked(config_path: Option<PathBuf>) -> Result<Self> {
        Ok(Self::figment(config_path).extract::<Config>()?)
    }

    fn figment(config_path: Option<PathBuf>) -> Figment {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("CRITTERLOG_").split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if self.server.max_body_bytes == 0 {
            return Err(Error::ConfigValidation {
                message: "server.max_body_bytes must be greater than 0".to_string(),
            });
        }

        if self.auth.enabled && self.auth.password.as_deref().map_or(true, str::is_empty) {
            return Err(Error::ConfigValidation {
                message: "auth.password must be set when auth.enabled is true".to_string(),
            });
        }

        if self.auth.mass_delete_password.as_deref() == Some("") {
            return Err(Error::ConfigValidation {
                message: "auth.mass_delete_password must not be empty".to_string(),
            });
        }

        if self.auth.session_ttl_hours == 0 {
            return Err(Error::ConfigValidation {
                message: "auth.session_ttl_hours must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the sighting file path, resolving defaults if not set.
    #[must_use]
    pub fn data_file(&self) -> PathBuf {
        self.storage
            .data_file
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATA_FILE_NAME))
    }

    /// Parse the listen address.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.bind_addr` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind_addr
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid server.bind_addr: {}", self.server.bind_addr),
            })
    }

    /// Get the session lifetime as a Duration.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(u64::from(self.auth.session_ttl_hours) * 60 * 60)
    }

    /// A copy of this configuration with every secret replaced by a placeholder.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        let redact = |secret: &mut Option<String>| {
            if secret.is_some() {
                *secret = Some(REDACTED.to_string());
            }
        };
        redact(&mut config.auth.password);
        redact(&mut config.auth.mass_delete_password);
        redact(&mut config.auth.session_secret);
        config
    }
}
