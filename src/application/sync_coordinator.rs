//! Synchronization run orchestration
//!
//! ```text
//! Init → LockAcquired → [ IndexReady → Reconciled → Normalized → Pruned → Archived ]* → Done
//!                                      (repeated per category)
//! Failed is reachable from every state.
//! ```
//!
//! The lock is held through a guard for the whole locked section; it is
//! released on success, on error, and (via `Drop`) on panic.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};

use crate::application::archive_builder::{ArchiveBuilder, ArchiveOutcome};
use crate::application::archive_pruner::{ArchivePruner, PruneReport, list_historical_archives};
use crate::application::index_cache::{IndexCache, persist_index};
use crate::application::inventory_normalizer::{InventoryNormalizer, persist_normalized};
use crate::application::legacy_migrator::{LegacyMigrator, migrate_flat_layout};
use crate::application::snapshot_store::SnapshotStore;
use crate::domain::category::{CategoryDef, CategoryRegistry};
use crate::domain::errors::SyncError;
use crate::domain::repositories::SnapshotRepository;
use crate::domain::services::{AttributeNormalizer, CatalogSource, DistributedMutex};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::file_lock::FileLock;
use crate::infrastructure::fs_snapshot_repository::FsSnapshotRepository;
use crate::infrastructure::inventory_paths::InventoryPaths;

/// Builds the snapshot repository for one category
pub type RepositoryFactory = Arc<dyn Fn(&InventoryPaths) -> Arc<dyn SnapshotRepository> + Send + Sync>;

/// Builds the run lock for the selected category set
pub type MutexFactory = Arc<dyn Fn(&[CategoryDef]) -> Arc<dyn DistributedMutex> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncState {
    Init,
    LockAcquired,
    IndexReady,
    Reconciled,
    Normalized,
    Pruned,
    Archived,
    Done,
    Failed,
}

impl SyncState {
    pub fn can_transition_to(self, next: Self) -> bool {
        use SyncState::{Archived, Done, Failed, IndexReady, Init, LockAcquired, Normalized, Pruned, Reconciled};
        matches!(
            (self, next),
            (Init, LockAcquired)
                | (LockAcquired | Archived, IndexReady)
                | (IndexReady, Reconciled)
                | (Reconciled, Normalized)
                | (Normalized, Pruned)
                | (Pruned, Archived)
                | (LockAcquired | Archived, Done)
        ) || (next == Failed && !self.is_terminal())
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-run state threaded through the pipeline stages
#[derive(Debug, Clone)]
pub struct RunContext {
    state: SyncState,
    history: Vec<SyncState>,
    category: Option<String>,
    started_at: SystemTime,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            state: SyncState::Init,
            history: vec![SyncState::Init],
            category: None,
            started_at: SystemTime::now(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn history(&self) -> &[SyncState] {
        &self.history
    }

    pub fn advance(&mut self, next: SyncState) -> Result<(), SyncError> {
        if !self.state.can_transition_to(next) {
            return Err(SyncError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(
            "🔄 {} → {}{}",
            self.state,
            next,
            self.category.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default()
        );
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    fn enter_category(&mut self, name: &str) {
        self.category = Some(name.to_string());
    }

    fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = SyncState::Failed;
            self.history.push(SyncState::Failed);
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings the coordinator needs, extracted from [`AppConfig`]
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub inventory_root: PathBuf,
    pub delay: Duration,
    pub index_ttl: Duration,
    pub lock_stale_after: Duration,
    pub legacy_retention: Duration,
    pub archive_cap_bytes: u64,
    pub storage_base_url: String,
}

impl SyncSettings {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            inventory_root: config.sync.inventory_root.clone(),
            delay: config.sync.delay(),
            index_ttl: config.sync.index_ttl(),
            lock_stale_after: config.sync.lock_stale_after(),
            legacy_retention: config.sync.legacy_retention(),
            archive_cap_bytes: config.sync.archive_cap_bytes(),
            storage_base_url: config.remote.storage_base_url.clone(),
        }
    }
}

/// Counts logged after each category finishes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InventoryStats {
    pub records: usize,
    pub snapshots: usize,
    pub archives: usize,
    pub archive_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub category: String,
    pub index_from_cache: bool,
    pub listed: usize,
    pub normalized: usize,
    pub fetched: usize,
    pub delisted: usize,
    pub failed: usize,
    pub prune: PruneReport,
    pub archive: ArchiveOutcome,
    pub stats: InventoryStats,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub categories: Vec<CategoryReport>,
    pub history: Vec<SyncState>,
    pub elapsed: Duration,
}

pub struct SyncCoordinator {
    settings: SyncSettings,
    registry: CategoryRegistry,
    catalog: Arc<dyn CatalogSource>,
    normalizer: Arc<dyn AttributeNormalizer>,
    repository_factory: RepositoryFactory,
    mutex_factory: MutexFactory,
}

impl SyncCoordinator {
    pub fn new(
        settings: SyncSettings,
        registry: CategoryRegistry,
        catalog: Arc<dyn CatalogSource>,
        normalizer: Arc<dyn AttributeNormalizer>,
    ) -> Self {
        let lock_dir = settings.inventory_root.clone();
        let stale_after = settings.lock_stale_after;
        Self {
            settings,
            registry,
            catalog,
            normalizer,
            repository_factory: Arc::new(FsSnapshotRepository::shared),
            mutex_factory: Arc::new(move |categories: &[CategoryDef]| -> Arc<dyn DistributedMutex> {
                Arc::new(FileLock::for_categories(&lock_dir, categories, stale_after))
            }),
        }
    }

    pub fn with_repository_factory(mut self, factory: RepositoryFactory) -> Self {
        self.repository_factory = factory;
        self
    }

    pub fn with_mutex_factory(mut self, factory: MutexFactory) -> Self {
        self.mutex_factory = factory;
        self
    }

    /// Run one synchronization over `requested` categories (all when empty)
    pub async fn run(&self, requested: &[String]) -> Result<SyncReport, SyncError> {
        let mut ctx = RunContext::new();
        let result = self.run_with_context(&mut ctx, requested).await;
        match result {
            Ok(categories) => {
                ctx.advance(SyncState::Done)?;
                let elapsed = ctx.started_at.elapsed().unwrap_or_default();
                info!("✅ Synchronization finished in {:.1}s", elapsed.as_secs_f64());
                Ok(SyncReport {
                    categories,
                    history: ctx.history,
                    elapsed,
                })
            }
            Err(e) => {
                ctx.fail();
                error!("❌ Synchronization failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_with_context(&self, ctx: &mut RunContext, requested: &[String]) -> Result<Vec<CategoryReport>, SyncError> {
        // Unknown names abort before anything on disk is touched
        let categories = self.registry.resolve(requested)?;

        let mutex = (self.mutex_factory)(&categories);
        let guard = mutex.try_acquire().map_err(|e| {
            warn!("Another instance is running ({}), exiting", mutex.describe());
            SyncError::from(e)
        })?;
        ctx.advance(SyncState::LockAcquired)?;

        let result = self.run_locked(ctx, &categories).await;

        match (result, guard.release()) {
            (Ok(reports), Ok(())) => Ok(reports),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), release) => {
                if let Err(release_error) = release {
                    warn!("Failed to release lock after error: {}", release_error);
                }
                Err(e)
            }
        }
    }

    async fn run_locked(&self, ctx: &mut RunContext, categories: &[CategoryDef]) -> Result<Vec<CategoryReport>, SyncError> {
        // 등록된 모든 카테고리의 디렉터리를 먼저 준비
        for category in self.registry.all() {
            self.paths(category).ensure_layout().await?;
        }
        migrate_flat_layout(&self.settings.inventory_root, &self.registry).await?;

        let mut reports = Vec::with_capacity(categories.len());
        for category in categories {
            ctx.enter_category(&category.name);
            reports.push(self.sync_category(ctx, category).await?);
        }
        Ok(reports)
    }

    fn paths(&self, category: &CategoryDef) -> InventoryPaths {
        InventoryPaths::new(&self.settings.inventory_root, &category.name)
    }

    async fn sync_category(&self, ctx: &mut RunContext, category: &CategoryDef) -> Result<CategoryReport, SyncError> {
        let paths = self.paths(category);
        let repository = (self.repository_factory)(&paths);
        info!("📦 [{}] Synchronizing category (remote id {})", category.name, category.remote_id);

        let index_cache = IndexCache::new(self.catalog.clone(), self.settings.index_ttl, self.settings.delay);
        let index = index_cache.get_index(category, &paths).await?;
        ctx.advance(SyncState::IndexReady)?;

        let store = SnapshotStore::new(
            &category.name,
            repository.clone(),
            self.catalog.clone(),
            LegacyMigrator::new(paths.clone()),
            self.settings.delay,
        );
        let reconciled = store.reconcile_all(&index.entries).await?;
        if !reconciled.delisted.is_empty() {
            // Rewritten with the original mtime so the TTL window is unchanged
            persist_index(&paths, &reconciled.entries, Some(index.fetched_at)).await?;
        }
        ctx.advance(SyncState::Reconciled)?;

        let normalizer = InventoryNormalizer::new(self.normalizer.clone(), &self.settings.storage_base_url);
        let normalized = normalizer.build(&category.name, &reconciled.entries, &reconciled.snapshots, index.fetched_at);
        persist_normalized(&paths, &normalized).await?;
        ctx.advance(SyncState::Normalized)?;

        let pruner = ArchivePruner::new(
            paths.clone(),
            repository.clone(),
            self.settings.legacy_retention,
            self.settings.archive_cap_bytes,
        );
        let prune = pruner.prune(SystemTime::now()).await?;
        ctx.advance(SyncState::Pruned)?;

        let archive = ArchiveBuilder::new(paths.clone(), repository.clone()).archive().await?;
        ctx.advance(SyncState::Archived)?;

        let stats = collect_stats(&paths, repository.as_ref()).await?;
        info!(
            "📊 [{}] {} records, {} snapshots, {} archives ({} MB)",
            category.name,
            stats.records,
            stats.snapshots,
            stats.archives,
            stats.archive_bytes / (1024 * 1024)
        );

        Ok(CategoryReport {
            category: category.name.clone(),
            index_from_cache: index.from_cache,
            listed: index.entries.len(),
            normalized: normalized.inventory.len(),
            fetched: reconciled.fetched,
            delisted: reconciled.delisted.len(),
            failed: reconciled.failed.len(),
            prune,
            archive,
            stats,
        })
    }
}

/// Archive count and size include `latest.zip`
pub async fn collect_stats(paths: &InventoryPaths, repository: &dyn SnapshotRepository) -> Result<InventoryStats, SyncError> {
    let records = repository.list_records().await?;
    let mut snapshots = 0;
    for id in &records {
        snapshots += repository.list_snapshots(id).await?.len();
    }

    let historical = list_historical_archives(paths).await?;
    let mut archives = historical.len();
    let mut archive_bytes: u64 = historical.iter().map(|a| a.size).sum();
    if let Ok(metadata) = tokio::fs::metadata(paths.latest_archive()).await {
        archives += 1;
        archive_bytes += metadata.len();
    }

    Ok(InventoryStats {
        records: records.len(),
        snapshots,
        archives,
        archive_bytes,
    })
}
