//! Domain layer for catalog inventory synchronization
//!
//! Contains the data model, timestamp encoding, typed errors and the trait
//! seams (repository and external collaborators) the application layer
//! is written against.

pub mod category;
pub mod errors;
pub mod inventory;
pub mod repositories;
pub mod services;
pub mod timestamp;

pub use category::{CategoryDef, CategoryRegistry};
pub use errors::{IndexCacheError, LockError, StorageError, SyncError};
pub use inventory::{
    ArticleKey, Branch, IndexEntry, NormalizedFields, NormalizedInventory, NormalizedItem, Price,
    ProductId, ProductSnapshot, RawAttributes, SpecEntry,
};
pub use repositories::SnapshotRepository;
pub use services::{
    AttributeNormalizer, CatalogSource, DetailFetch, DistributedMutex, HeartbeatReporter,
    IndexPage, MutexGuard,
};
pub use timestamp::SnapshotTimestamp;
