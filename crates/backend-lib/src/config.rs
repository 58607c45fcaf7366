// ============================
// livepad-backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use figment::{Figment, providers::{Env, Format, Json, Serialized, Toml}};
use anyhow::{bail, Result};

/// Default configuration file names, looked up in the working directory
pub const DEFAULT_TOML_FILE: &str = "livepad.toml";
pub const DEFAULT_JSON_FILE: &str = "livepad.json";

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "LIVEPAD_";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level
    pub log_level: String,
    /// Interval of the batch write-back sweep, in seconds
    pub save_interval_secs: u64,
    /// Interval of the eviction sweep, in seconds
    pub cleanup_interval_secs: u64,
    /// Secret for document encryption at rest; compression only when unset
    pub encryption_key: Option<String>,
    /// Largest accepted document text, in bytes
    pub max_document_bytes: usize,
    /// Durable storage settings
    pub storage: StorageSettings,
}

/// Durable storage settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Root directory of the flat-file store; in-memory only when unset
    pub path: Option<PathBuf>,
    /// Upper bound on every storage call, in milliseconds
    pub timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5829)),
            log_level: "info".to_string(),
            save_interval_secs: 60,
            cleanup_interval_secs: 300,
            encryption_key: None,
            max_document_bytes: 4 * 1024 * 1024,
            storage: StorageSettings::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: None,
            timeout_ms: 5_000,
        }
    }
}

impl Settings {
    /// Load settings from `livepad.toml`, `livepad.json` and `LIVEPAD_*`
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Self::base_figment()
                .merge(Toml::file(DEFAULT_TOML_FILE))
                .merge(Json::file(DEFAULT_JSON_FILE)),
        )
    }

    /// Load settings from an explicit TOML file, still honoring `LIVEPAD_*`
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            bail!("config file {} does not exist", path.display());
        }
        Self::from_figment(Self::base_figment().merge(Toml::file(path)))
    }

    fn base_figment() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.save_interval_secs == 0 {
            bail!("save_interval_secs must be greater than zero");
        }
        if self.cleanup_interval_secs == 0 {
            bail!("cleanup_interval_secs must be greater than zero");
        }
        if self.cleanup_interval_secs < self.save_interval_secs {
            bail!("cleanup_interval_secs must not be shorter than save_interval_secs");
        }
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            bail!("unknown log level '{}'", self.log_level);
        }
        if matches!(&self.encryption_key, Some(key) if key.is_empty()) {
            bail!("encryption_key must not be empty when set");
        }
        if self.max_document_bytes == 0 {
            bail!("max_document_bytes must be greater than zero");
        }
        if self.storage.timeout_ms == 0 {
            bail!("storage.timeout_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.timeout_ms)
    }
}

#[cfg(test)]
#[path = "config/config_tests.rs"]
mod config_tests;
