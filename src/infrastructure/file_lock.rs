//! Advisory lock file over one category set
//!
//! The lock is a file created with `create_new`, so two processes can never
//! both create it. A holder that died leaves the file behind; once its mtime
//! is older than the staleness window the next run renames it to a tombstone,
//! re-checks the tombstone's age and only then takes the lock over.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::domain::category::CategoryDef;
use crate::domain::errors::LockError;
use crate::domain::services::{DistributedMutex, MutexGuard};
use crate::infrastructure::file_times;

/// Diagnostic body of the lock file; never parsed for correctness
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    created_at_rfc3339: String,
    categories: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    categories: Vec<String>,
    stale_after: Duration,
}

impl FileLock {
    pub fn new(path: PathBuf, categories: Vec<String>, stale_after: Duration) -> Self {
        Self {
            path,
            categories,
            stale_after,
        }
    }

    /// Lock scoped by the category set: `sync_<a>_<b>.lock` under `lock_dir`.
    /// Names are sorted and deduplicated so every spelling of a set maps to one file.
    pub fn for_categories(lock_dir: &Path, categories: &[CategoryDef], stale_after: Duration) -> Self {
        let mut names: Vec<String> = categories.iter().map(|c| c.name.clone()).collect();
        names.sort();
        names.dedup();
        let path = lock_dir.join(format!("sync_{}.lock", names.join("_")));
        Self::new(path, names, stale_after)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> LockError {
        LockError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn age(&self) -> Result<Option<Duration>, LockError> {
        match file_times::age_at(&self.path, SystemTime::now()) {
            Ok(age) => Ok(Some(age)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn tombstone_path(&self) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".stale-{}-{}", std::process::id(), nanos));
        PathBuf::from(name)
    }

    /// Move a lock believed stale aside and check its age again on the moved
    /// file. Another run may have reclaimed and recreated the lock between our
    /// check and the rename; such a lock is put back and its age returned.
    fn reclaim_stale(&self) -> Result<Option<Duration>, LockError> {
        let tombstone = self.tombstone_path();
        match fs::rename(&self.path, &tombstone) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        }

        let age = file_times::age_at(&tombstone, SystemTime::now()).map_err(|e| self.io_error(e))?;
        if age < self.stale_after {
            warn!("🔒 Lock {} was taken over meanwhile, restoring it", self.path.display());
            // hard_link never replaces an existing lock
            match fs::hard_link(&tombstone, &self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(self.io_error(e)),
            }
            fs::remove_file(&tombstone).map_err(|e| self.io_error(e))?;
            return Ok(Some(age));
        }

        fs::remove_file(&tombstone).map_err(|e| self.io_error(e))?;
        Ok(None)
    }

    fn create(&self) -> Result<(), LockError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    LockError::Held {
                        path: self.path.clone(),
                        age: Duration::ZERO,
                    }
                } else {
                    self.io_error(e)
                }
            })?;

        let info = LockInfo {
            pid: std::process::id(),
            created_at_rfc3339: Utc::now().to_rfc3339(),
            categories: self.categories.clone(),
        };
        let body = serde_json::to_string_pretty(&info).map_err(|e| self.io_error(e.into()))?;
        file.write_all(body.as_bytes()).map_err(|e| self.io_error(e))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

impl DistributedMutex for FileLock {
    fn try_acquire(&self) -> Result<Box<dyn MutexGuard>, LockError> {
        if let Some(age) = self.age()? {
            if age < self.stale_after {
                return Err(LockError::Held {
                    path: self.path.clone(),
                    age,
                });
            }

            warn!(
                "🔓 Reclaiming stale lock {} ({} hours old)",
                self.path.display(),
                age.as_secs() / 3600
            );
            if let Some(fresh_age) = self.reclaim_stale()? {
                return Err(LockError::Held {
                    path: self.path.clone(),
                    age: fresh_age,
                });
            }
        }

        self.create()?;
        info!("🔒 Lock acquired: {}", self.path.display());
        Ok(Box::new(FileLockGuard {
            path: self.path.clone(),
            released: false,
        }))
    }

    fn is_stale(&self) -> Result<bool, LockError> {
        Ok(self.age()?.is_some_and(|age| age >= self.stale_after))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Holding the guard means holding the lock; dropping it releases
#[derive(Debug)]
pub struct FileLockGuard {
    path: PathBuf,
    released: bool,
}

impl FileLockGuard {
    fn release_inner(&mut self) -> Result<(), LockError> {
        if self.released {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(LockError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        }
        self.released = true;
        info!("🔓 Lock released: {}", self.path.display());
        Ok(())
    }
}

impl MutexGuard for FileLockGuard {
    fn release(mut self: Box<Self>) -> Result<(), LockError> {
        self.release_inner()
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!("Failed to release lock on drop: {}", e);
        }
    }
}
