//! Reload coordinator - runs a complete reload of one entity kind
//!
//! The coordinator issues the fixed operation sequence inside a single
//! transaction:
//!
//! 1. Create the merging staging table (and, for payments, the stats staging
//!    table)
//! 2. Bulk load the records
//! 3. Recompute the stats (payments only)
//! 4. Swap
//! 5. Commit
//!
//! Any failure rolls the transaction back and the live dataset is unchanged.
//! A shutdown signal is honoured between chunks and right before the swap;
//! once the swap has started it runs to completion. File-backed sources are
//! read on the blocking thread pool (see [`ReloadCoordinator::reload_source`]).

use crate::adapters::store::{create_reload_store, ReloadStore};
use crate::config::ShadowswapConfig;
use crate::core::loader::{BulkLoader, LoadReport, RecordFeed};
use crate::core::reload::state::ReloadState;
use crate::core::reload::summary::ReloadSummary;
use crate::core::reload::ReloadTransaction;
use crate::core::source::{read_in_background, RecordIter};
use crate::core::{create_staging, recompute_stats, swap};
use crate::domain::{EntityKind, ReloadError, Result, Table};
use serde_json::Value;
use std::iter::Empty;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Reload coordinator
pub struct ReloadCoordinator {
    store: Arc<dyn ReloadStore + Send + Sync>,
    loader: BulkLoader,
    shutdown: watch::Receiver<bool>,
}

impl ReloadCoordinator {
    /// Create a coordinator over an existing store
    pub fn new(
        store: Arc<dyn ReloadStore + Send + Sync>,
        batch_size: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let loader = BulkLoader::new(batch_size).with_shutdown(shutdown.clone());
        Self {
            store,
            loader,
            shutdown,
        }
    }

    /// Create a coordinator with the backend and batch size from `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be created or reached.
    pub async fn from_config(
        config: &ShadowswapConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        let store = create_reload_store(config).await?;
        store.test_connection().await?;
        Ok(Self::new(store, config.load.batch_size, shutdown))
    }

    pub fn store(&self) -> &Arc<dyn ReloadStore + Send + Sync> {
        &self.store
    }

    /// Reload every row of `kind` from `records`
    ///
    /// # Errors
    ///
    /// Returns the first error of the reload after rolling it back. Rejections
    /// (see [`ReloadError::is_rejection`]) leave the live dataset untouched.
    pub async fn reload<I>(&self, kind: EntityKind, records: I) -> Result<ReloadSummary>
    where
        I: IntoIterator<Item = Result<Value>>,
    {
        self.execute(kind, RecordFeed::Iter(records.into_iter())).await
    }

    /// Reload every row of `kind` from a file-backed source
    ///
    /// The source is read on the blocking thread pool, at most one chunk
    /// ahead of the loader.
    ///
    /// # Errors
    ///
    /// Same as [`ReloadCoordinator::reload`].
    pub async fn reload_source(
        &self,
        kind: EntityKind,
        records: RecordIter,
    ) -> Result<ReloadSummary> {
        let receiver = read_in_background(records, self.loader.chunk_size());
        self.execute(kind, RecordFeed::<Empty<Result<Value>>>::Channel(receiver))
            .await
    }

    async fn execute<I>(&self, kind: EntityKind, records: RecordFeed<I>) -> Result<ReloadSummary>
    where
        I: Iterator<Item = Result<Value>>,
    {
        let start_time = Instant::now();
        let mut tx = ReloadTransaction::begin(self.store.as_ref()).await?;
        let mut summary = ReloadSummary::new(tx.reload_id(), kind);

        crate::log_reload_start!(tx.reload_id(), kind, self.store.name());

        match self.run(&mut tx, kind, records).await {
            Ok((report, stats_rows)) => {
                tx.commit().await?;
                summary.report = report;
                summary.stats_rows = stats_rows;
                summary.state = ReloadState::Swapped;
            }
            Err(e) => {
                let reload_id = tx.reload_id();
                let reached = tx.state(kind);
                tracing::error!(
                    reload_id = %reload_id,
                    entity = %kind,
                    state = %reached,
                    error = %e,
                    "Reload failed; rolling back"
                );
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::warn!(
                        reload_id = %reload_id,
                        error = %rollback_error,
                        "Rollback failed; the backend discards the transaction"
                    );
                }
                return Err(e);
            }
        }

        let summary = summary.with_duration(start_time.elapsed());
        crate::log_reload_complete!(summary);
        Ok(summary)
    }

    async fn run<I>(
        &self,
        tx: &mut ReloadTransaction,
        kind: EntityKind,
        records: RecordFeed<I>,
    ) -> Result<(LoadReport, Option<u64>)>
    where
        I: Iterator<Item = Result<Value>>,
    {
        create_staging(tx, kind.table(), true).await?;
        if kind.is_dependent() {
            create_staging(tx, Table::PatientStats, false).await?;
        }

        let report = self.loader.load_feed(tx, kind, records).await?;

        let stats_rows = if kind.is_dependent() {
            Some(recompute_stats(tx).await?)
        } else {
            None
        };

        if *self.shutdown.borrow() {
            return Err(ReloadError::Cancelled(format!(
                "shutdown requested before swapping {kind}"
            )));
        }

        swap(tx, kind).await?;
        Ok((report, stats_rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use serde_json::json;

    fn coordinator(store: &MemoryStore) -> (ReloadCoordinator, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let coordinator = ReloadCoordinator::new(Arc::new(store.clone()), 2, shutdown_rx);
        (coordinator, shutdown_tx)
    }

    #[tokio::test]
    async fn test_patient_reload_summary() {
        let store = MemoryStore::new();
        let (coordinator, _shutdown) = coordinator(&store);
        let records = vec![
            Ok(json!({"externalId": "usr1", "firstName": "Rick", "lastName": "Deckard", "dateOfBirth": "2000-01-01"})),
            Ok(json!({"externalId": "usr1", "firstName": "Rick", "lastName": "Deckard", "dateOfBirth": "2000-01-01"})),
            Ok(json!({"externalId": "usr2", "firstName": "Ann", "lastName": "Lee", "dateOfBirth": "1990-05-05"})),
        ];

        let summary = coordinator.reload(EntityKind::Patient, records).await.unwrap();
        assert!(summary.is_successful());
        assert_eq!(summary.report.staged, 2);
        assert_eq!(summary.report.dropped_duplicates, 1);
        assert_eq!(summary.report.chunks, 2);
        assert_eq!(summary.stats_rows, None);
        assert_eq!(store.live_count(Table::Patients).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_before_swap_rolls_back() {
        let store = MemoryStore::new();
        let (coordinator, shutdown) = coordinator(&store);
        shutdown.send(true).unwrap();

        let err = coordinator
            .reload(EntityKind::Patient, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ReloadError::Cancelled(_)));
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn test_from_memory_config() {
        let config = crate::config::parse_config("database_target = \"memory\"").unwrap();
        let (_tx, rx) = watch::channel(false);
        let coordinator = ReloadCoordinator::from_config(&config, rx).await.unwrap();
        assert_eq!(coordinator.store().name(), "memory");
    }
}
