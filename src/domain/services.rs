//! Collaborator interfaces the synchronization core is written against
//!
//! The remote catalog, the attribute normalizer, the cross-process lock and
//! the monitoring endpoint are all reached through these traits so they can
//! be replaced (and faked in tests) without touching orchestration logic.

use async_trait::async_trait;
use std::fmt;

use crate::domain::category::CategoryDef;
use crate::domain::errors::{LockError, SyncError};
use crate::domain::inventory::{IndexEntry, NormalizedFields, RawAttributes};

/// One page of the remote listing
#[derive(Debug, Clone, Default)]
pub struct IndexPage {
    pub entries: Vec<IndexEntry>,
    /// Last page number as reported by the server
    pub last_page: u32,
}

/// Result of fetching a detail page
#[derive(Debug, Clone, PartialEq)]
pub enum DetailFetch {
    Found(RawAttributes),
    /// Item was delisted (redirected away, sold, or no product payload)
    NotFound { reason: String },
}

/// 원격 카탈로그 (목록 페이지 + 상세 페이지)
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_index_page(&self, category: &CategoryDef, page: u32) -> Result<IndexPage, SyncError>;

    async fn fetch_detail_page(&self, url: &str) -> Result<DetailFetch, SyncError>;
}

/// Maps free-text detail attributes into structured fields
pub trait AttributeNormalizer: Send + Sync {
    fn normalize(&self, category: &str, attributes: &RawAttributes) -> NormalizedFields;
}

/// Cross-process mutual exclusion over one category set.
///
/// Acquisition hands back a guard; dropping the guard releases the mutex,
/// so every exit path of the holder releases it.
pub trait DistributedMutex: Send + Sync {
    fn try_acquire(&self) -> Result<Box<dyn MutexGuard>, LockError>;

    /// Whether an existing holder has outlived the staleness window
    fn is_stale(&self) -> Result<bool, LockError>;

    fn describe(&self) -> String;
}

pub trait MutexGuard: Send + fmt::Debug {
    /// Explicit release so the caller can observe release failures
    fn release(self: Box<Self>) -> Result<(), LockError>;
}

/// External monitoring endpoint. Notification problems are never fatal.
#[async_trait]
pub trait HeartbeatReporter: Send + Sync {
    async fn report_success(&self);

    async fn report_failure(&self);
}
