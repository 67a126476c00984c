//! Storage backend traits
//!
//! A backend exposes two surfaces. [`ReloadStore`] is the long-lived handle:
//! it pages through the live dataset and opens transactions. [`StoreTransaction`] is a
//! single reload's unit of work; every staging, lookup, insert, aggregation and
//! promotion statement of a reload runs through one of these, and nothing it
//! does becomes visible to readers until [`StoreTransaction::commit`].
//!
//! Batched methods take whole chunks of external ids so a backend can answer
//! them in one round trip.

use crate::domain::{
    EntityId, EntityKind, EntityRow, ExternalId, Page, PageOf, PatientFilter, PatientStats,
    PaymentFilter, Result, Table,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Long-lived handle on a storage backend
#[async_trait]
pub trait ReloadStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Test the backend connection
    ///
    /// # Errors
    ///
    /// Returns `ReloadError::Connection` if the backend cannot be reached.
    async fn test_connection(&self) -> Result<()>;

    /// Create the live tables if they do not exist yet
    async fn ensure_schema(&self) -> Result<()>;

    /// Open a reload transaction
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// One page of live patients ordered by surrogate id
    ///
    /// With payment bounds, only patients whose stats total lies within them
    /// are returned; patients without stats are left out.
    async fn query_patients(&self, filter: &PatientFilter, page: Page) -> Result<PageOf<EntityRow>>;

    /// One page of live payments ordered by surrogate id
    async fn query_payments(&self, filter: &PaymentFilter, page: Page) -> Result<PageOf<EntityRow>>;

    /// One page of live stats ordered by patient id
    async fn query_stats(&self, page: Page) -> Result<PageOf<PatientStats>>;

    /// Number of live rows in a table
    async fn live_count(&self, table: Table) -> Result<u64>;
}

/// One reload's unit of work
///
/// Dropping a transaction without calling [`commit`](Self::commit) abandons
/// all of its work.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Drop any leftover staging table and create a fresh, empty one shaped
    /// like the live table
    ///
    /// # Errors
    ///
    /// Returns `ReloadError::Schema` if the live table does not exist.
    async fn create_staging_table(&mut self, table: Table) -> Result<()>;

    /// Drop the staging table if it exists
    async fn drop_staging_table(&mut self, table: Table) -> Result<()>;

    /// Live rows whose external id is in `ids`
    async fn lookup_live(
        &mut self,
        kind: EntityKind,
        ids: &[ExternalId],
    ) -> Result<HashMap<ExternalId, EntityRow>>;

    /// Which of `ids` already have a row in the staging table
    async fn lookup_staged(
        &mut self,
        kind: EntityKind,
        ids: &[ExternalId],
    ) -> Result<HashSet<ExternalId>>;

    /// Which of `ids` exist as live patients
    async fn live_patient_ids(&mut self, ids: &[ExternalId]) -> Result<HashSet<ExternalId>>;

    /// Draw `count` fresh surrogate ids from the kind's sequence
    ///
    /// Sequences only move forward; ids drawn by an abandoned transaction are
    /// not reused.
    async fn allocate_ids(&mut self, kind: EntityKind, count: usize) -> Result<Vec<EntityId>>;

    /// Append fully resolved rows to the staging table
    ///
    /// Rows whose external id is already staged are skipped. Returns the
    /// number of rows written.
    async fn insert_staged(&mut self, kind: EntityKind, rows: &[EntityRow]) -> Result<u64>;

    /// Fill the staging stats table with per-patient payment totals from the
    /// staging payments table. Returns the number of stats rows written.
    async fn aggregate_payment_totals(&mut self) -> Result<u64>;

    /// Refresh planner statistics for the staging table
    async fn analyze_staging(&mut self, table: Table) -> Result<()>;

    /// Put the staging table in the live position and drop the retired one
    ///
    /// # Errors
    ///
    /// Returns `ReloadError::SwapConflict` if the staging table is missing or
    /// a retired table from an earlier swap is still present.
    async fn promote_staging(&mut self, table: Table) -> Result<()>;

    /// Make the transaction's work visible
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Abandon the transaction's work
    async fn rollback(self: Box<Self>) -> Result<()>;
}
