//! Infrastructure layer: configuration, logging, filesystem storage and
//! the HTTP-facing collaborators of the sync core.

pub mod attribute_normalizer;
pub mod banknote_catalog;
pub mod config;
pub mod detail_page_parser;
pub mod file_lock;
pub mod file_times;
pub mod fs_snapshot_repository;
pub mod heartbeat;
pub mod http_client;
pub mod inventory_paths;
pub mod logging;

// Re-export commonly used items
pub use attribute_normalizer::{FieldRule, RuleBasedNormalizer};
pub use banknote_catalog::BanknoteCatalog;
pub use config::{AppConfig, ConfigError};
pub use file_lock::FileLock;
pub use fs_snapshot_repository::FsSnapshotRepository;
pub use heartbeat::HttpHeartbeat;
pub use http_client::{HttpClient, HttpClientConfig};
pub use inventory_paths::InventoryPaths;
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
