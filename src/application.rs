//! Application layer
//!
//! The synchronization pipeline: index cache, per-item snapshot
//! reconciliation, legacy migration, normalization, retention sweeps and
//! archive rotation, orchestrated by [`SyncCoordinator`].

pub mod archive_builder;
pub mod archive_pruner;
pub mod index_cache;
pub mod inventory_normalizer;
pub mod legacy_migrator;
pub mod snapshot_store;
pub mod sync_coordinator;

pub use archive_builder::{ArchiveBuilder, ArchiveOutcome};
pub use archive_pruner::{ArchivePruner, PruneReport};
pub use index_cache::{IndexCache, LoadedIndex};
pub use inventory_normalizer::InventoryNormalizer;
pub use legacy_migrator::LegacyMigrator;
pub use snapshot_store::{Reconciliation, ReconciledInventory, SnapshotStore};
pub use sync_coordinator::{
    CategoryReport, MutexFactory, RepositoryFactory, RunContext, SyncCoordinator, SyncReport,
    SyncSettings, SyncState,
};
