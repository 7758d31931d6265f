//! Configuration infrastructure
//!
//! Settings are layered with the `config` crate:
//! 1. Built-in defaults (see [`defaults`])
//! 2. Optional config file (`inventory-sync.toml` or `--config <path>`)
//! 3. Environment overrides, e.g. `INVENTORY_SYNC__SYNC__DELAY_SECONDS=5`

#![allow(clippy::derivable_impls)]

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::category::{CategoryDef, CategoryRegistry};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Storage layout and retention policy
    pub sync: SyncConfig,

    /// Remote shop endpoints and transport behavior
    pub remote: RemoteConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Monitoring endpoint
    pub monitoring: MonitoringConfig,

    /// Category registry: `{name, remote_id}` table
    pub categories: Vec<CategoryDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root directory holding one sub-directory per category
    pub inventory_root: PathBuf,

    /// Pause between index pages and before detail fetches
    pub delay_seconds: u64,

    /// A persisted index younger than this is reused without network access
    pub index_ttl_minutes: u64,

    /// A lock file older than this is considered abandoned
    pub lock_stale_hours: u64,

    /// Top-level legacy files older than this are deleted
    pub legacy_retention_days: u64,

    /// Cap on the total size of historical archives
    pub archive_cap_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Shop home page, fetched once to initialize cookies
    pub home_url: String,

    /// JSON listing endpoint
    pub index_url: String,

    /// Items requested per listing page
    pub per_page: u32,

    /// Prefix for image paths found in detail payloads
    pub storage_base_url: String,

    pub request_timeout_seconds: u64,

    /// Attempts per request for connection-level failures
    pub max_retries: u32,

    pub user_agent: String,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; defaults to the user data directory
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// File containing the heartbeat URL. Missing file disables notifications.
    pub heartbeat_url_file: Option<PathBuf>,

    /// Send a heartbeat after successful runs too, not only failures
    pub report_success: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            remote: RemoteConfig::default(),
            logging: LoggingConfig::default(),
            monitoring: MonitoringConfig::default(),
            categories: defaults::categories(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            inventory_root: PathBuf::from(defaults::INVENTORY_ROOT),
            delay_seconds: defaults::DELAY_SECONDS,
            index_ttl_minutes: defaults::INDEX_TTL_MINUTES,
            lock_stale_hours: defaults::LOCK_STALE_HOURS,
            legacy_retention_days: defaults::LEGACY_RETENTION_DAYS,
            archive_cap_mb: defaults::ARCHIVE_CAP_MB,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            home_url: defaults::HOME_URL.to_string(),
            index_url: defaults::INDEX_URL.to_string(),
            per_page: defaults::PER_PAGE,
            storage_base_url: defaults::STORAGE_BASE_URL.to_string(),
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_retries: defaults::MAX_RETRIES,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            directory: None,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            heartbeat_url_file: Some(PathBuf::from(defaults::HEARTBEAT_URL_FILE)),
            report_success: true,
        }
    }
}

impl SyncConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_seconds)
    }

    pub fn index_ttl(&self) -> Duration {
        Duration::from_secs(self.index_ttl_minutes * 60)
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_hours * 60 * 60)
    }

    pub fn legacy_retention(&self) -> Duration {
        Duration::from_secs(self.legacy_retention_days * 24 * 60 * 60)
    }

    pub fn archive_cap_bytes(&self) -> u64 {
        self.archive_cap_mb * 1024 * 1024
    }
}

impl AppConfig {
    /// Load layered configuration. An explicit path must exist; the default
    /// file name is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file_source = match path {
            Some(path) => config::File::from(path),
            None => config::File::with_name(defaults::CONFIG_FILE_STEM).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file_source)
            .add_source(config::Environment::with_prefix(defaults::ENV_PREFIX).separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.index_ttl_minutes == 0 {
            return Err(ConfigError::invalid("sync.index_ttl_minutes must be greater than 0"));
        }
        if self.sync.lock_stale_hours == 0 {
            return Err(ConfigError::invalid("sync.lock_stale_hours must be greater than 0"));
        }
        if self.sync.archive_cap_mb == 0 {
            return Err(ConfigError::invalid("sync.archive_cap_mb must be greater than 0"));
        }
        if self.remote.per_page == 0 {
            return Err(ConfigError::invalid("remote.per_page must be greater than 0"));
        }
        if self.remote.max_retries == 0 {
            return Err(ConfigError::invalid("remote.max_retries must be at least 1"));
        }
        for (field, value) in [
            ("remote.home_url", &self.remote.home_url),
            ("remote.index_url", &self.remote.index_url),
            ("remote.storage_base_url", &self.remote.storage_base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ConfigError::invalid(format!("{field} is not a valid URL: {e}")))?;
        }

        if self.categories.is_empty() {
            return Err(ConfigError::invalid("at least one category must be registered"));
        }
        let mut names = HashSet::new();
        for category in &self.categories {
            let name = category.name.trim();
            if name.is_empty() || name.contains(['/', '\\', ',']) {
                return Err(ConfigError::invalid(format!(
                    "invalid category name '{}'",
                    category.name
                )));
            }
            if !names.insert(name) {
                return Err(ConfigError::invalid(format!(
                    "duplicate category '{}'",
                    category.name
                )));
            }
        }

        Ok(())
    }

    pub fn category_registry(&self) -> CategoryRegistry {
        CategoryRegistry::new(self.categories.clone())
    }
}

/// Default configuration values
pub mod defaults {
    use crate::domain::category::CategoryDef;

    /// Config file looked up in the working directory (any supported extension)
    pub const CONFIG_FILE_STEM: &str = "inventory-sync";

    /// Prefix for environment overrides
    pub const ENV_PREFIX: &str = "INVENTORY_SYNC";

    pub const INVENTORY_ROOT: &str = "inventory";

    /// Default pause between requests, in seconds
    pub const DELAY_SECONDS: u64 = 15;

    pub const INDEX_TTL_MINUTES: u64 = 55;

    pub const LOCK_STALE_HOURS: u64 = 24;

    pub const LEGACY_RETENTION_DAYS: u64 = 30;

    pub const ARCHIVE_CAP_MB: u64 = 2048;

    pub const HOME_URL: &str = "https://veikals.banknote.lv/lv/";

    pub const INDEX_URL: &str = "https://veikals.banknote.lv/lv/filter-products";

    pub const PER_PAGE: u32 = 120;

    pub const STORAGE_BASE_URL: &str = "https://veikals.banknote.lv/storage";

    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    pub const MAX_RETRIES: u32 = 5;

    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

    pub const LOG_LEVEL: &str = "info";

    pub const HEARTBEAT_URL_FILE: &str = "heartbeat.url";

    pub fn categories() -> Vec<CategoryDef> {
        vec![CategoryDef::new("laptops", 8), CategoryDef::new("monitors", 11)]
    }
}
