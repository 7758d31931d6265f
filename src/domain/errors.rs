//! Typed errors for the synchronization pipeline
//!
//! Run-level failures are `SyncError`. The index cache and storage layers
//! have their own variants so callers can branch on decode vs I/O instead
//! of swallowing everything.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Unknown category: {name} (known categories: {known})")]
    UnknownCategory { name: String, known: String },

    #[error("Another instance is running: lock {} is {age_minutes} minutes old", .path.display())]
    LockContention { path: PathBuf, age_minutes: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed for {url}: {message}")]
    Http { url: String, message: String },

    #[error("Failed to decode {what}: {source}")]
    Decode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn http(url: &str, message: impl ToString) -> Self {
        Self::Http {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    /// Fatal errors stop the whole run; everything else degrades to skipping an item
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownCategory { .. } | Self::LockContention { .. } | Self::Config(_)
        )
    }
}

impl From<LockError> for SyncError {
    fn from(error: LockError) -> Self {
        match error {
            LockError::Held { path, age } => Self::LockContention {
                path,
                age_minutes: age.as_secs() / 60,
            },
            LockError::Io { path, source } => Self::Io { path, source },
        }
    }
}

/// Why a persisted index could not be used; every variant means "refetch"
#[derive(Error, Debug)]
pub enum IndexCacheError {
    #[error("index file does not exist")]
    Missing,

    #[error("index file is {age_minutes} minutes old")]
    Stale { age_minutes: u64 },

    #[error("index file could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("index file could not be parsed: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt data at {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

#[derive(Error, Debug)]
pub enum LockError {
    #[error("lock {} is held ({age:?} old)", .path.display())]
    Held { path: PathBuf, age: Duration },

    #[error("lock I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_held_lock_maps_to_contention() {
        let error: SyncError = LockError::Held {
            path: PathBuf::from("sync_laptops.lock"),
            age: Duration::from_secs(600),
        }
        .into();
        assert!(matches!(error, SyncError::LockContention { age_minutes: 10, .. }));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_item_level_errors_are_not_fatal() {
        assert!(!SyncError::http("https://example.test", "connection reset").is_fatal());
        let io = SyncError::io("/tmp/x", std::io::Error::other("boom"));
        assert!(!io.is_fatal());
    }
}
