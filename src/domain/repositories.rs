//! Repository interface for versioned product records
//!
//! 제품 레코드(스냅샷 목록 + last_seen 마커)에 대한 저장소 추상화.
//! The filesystem layout is one implementation; nothing above this trait
//! globs directories itself.

use async_trait::async_trait;

use crate::domain::errors::StorageError;
use crate::domain::inventory::{ProductId, RawAttributes};
use crate::domain::timestamp::SnapshotTimestamp;

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Snapshot timestamps for one record, oldest first. Empty (zero-byte)
    /// snapshots are not listed.
    async fn list_snapshots(&self, id: &ProductId) -> Result<Vec<SnapshotTimestamp>, StorageError>;

    async fn read_snapshot(
        &self,
        id: &ProductId,
        timestamp: SnapshotTimestamp,
    ) -> Result<RawAttributes, StorageError>;

    /// Stored bytes, used for content hashing
    async fn read_snapshot_bytes(
        &self,
        id: &ProductId,
        timestamp: SnapshotTimestamp,
    ) -> Result<Vec<u8>, StorageError>;

    /// Writes (or overwrites, within the same second) one snapshot
    async fn write_snapshot(
        &self,
        id: &ProductId,
        timestamp: SnapshotTimestamp,
        attributes: &RawAttributes,
    ) -> Result<(), StorageError>;

    async fn delete_snapshot(
        &self,
        id: &ProductId,
        timestamp: SnapshotTimestamp,
    ) -> Result<(), StorageError>;

    /// Refresh the liveness marker
    async fn mark_seen(&self, id: &ProductId, at: SnapshotTimestamp) -> Result<(), StorageError>;

    async fn last_seen(&self, id: &ProductId) -> Result<Option<SnapshotTimestamp>, StorageError>;

    /// Every record id currently stored, in no particular order
    async fn list_records(&self) -> Result<Vec<ProductId>, StorageError>;

    /// Remove the record with all its snapshots and marker
    async fn delete_record(&self, id: &ProductId) -> Result<(), StorageError>;
}
