//! Double-buffered in-memory store
//!
//! Every live table is an immutable snapshot behind an `Arc`. A transaction
//! builds its staging tables privately; promoting one records the new snapshot
//! in the transaction's overlay, and commit swaps every promoted pointer under
//! a single write lock. Readers clone the current `Arc`s and keep reading
//! them, so they see either the complete old dataset or the complete new one.

use crate::adapters::store::traits::{ReloadStore, StoreTransaction};
use crate::domain::entity::normalize_amount;
use crate::domain::{
    EntityId, EntityKind, EntityRow, ExternalId, Page, PageOf, PatientFilter, PatientStats,
    PaymentFilter, Record, ReloadError, Result, Table,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Rows of an entity table with an external-id index
#[derive(Debug, Clone, Default)]
struct EntityTable {
    rows: Vec<EntityRow>,
    index: HashMap<ExternalId, usize>,
}

impl EntityTable {
    fn get(&self, id: &ExternalId) -> Option<&EntityRow> {
        self.index.get(id).map(|&pos| &self.rows[pos])
    }

    /// Appends a row unless its external id is already present
    fn insert(&mut self, row: EntityRow) -> bool {
        if self.index.contains_key(row.external_id()) {
            return false;
        }
        self.index.insert(row.external_id().clone(), self.rows.len());
        self.rows.push(row);
        true
    }
}

#[derive(Debug, Clone)]
enum MemTable {
    Entities(EntityTable),
    Stats(BTreeMap<ExternalId, Decimal>),
}

impl MemTable {
    fn empty(table: Table) -> Self {
        match table.entity_kind() {
            Some(_) => MemTable::Entities(EntityTable::default()),
            None => MemTable::Stats(BTreeMap::new()),
        }
    }

    fn len(&self) -> usize {
        match self {
            MemTable::Entities(t) => t.rows.len(),
            MemTable::Stats(s) => s.len(),
        }
    }

    fn entities(&self, table: Table) -> Result<&EntityTable> {
        match self {
            MemTable::Entities(t) => Ok(t),
            MemTable::Stats(_) => Err(ReloadError::Other(format!("{table} does not hold entity rows"))),
        }
    }

    fn stats(&self, table: Table) -> Result<&BTreeMap<ExternalId, Decimal>> {
        match self {
            MemTable::Stats(s) => Ok(s),
            MemTable::Entities(_) => Err(ReloadError::Other(format!("{table} does not hold stats rows"))),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    live: RwLock<HashMap<Table, Arc<MemTable>>>,
    sequences: Mutex<HashMap<EntityKind, i64>>,
}

/// In-process storage backend
///
/// Cloning yields another handle on the same dataset.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Creates a store with empty live tables
    pub fn new() -> Self {
        let store = Self::without_schema();
        store.create_missing_tables();
        store
    }

    /// Creates a store with no tables at all
    pub fn without_schema() -> Self {
        Self::default()
    }

    fn create_missing_tables(&self) {
        let mut live = self.shared.live.write();
        for table in Table::ALL {
            live.entry(table)
                .or_insert_with(|| Arc::new(MemTable::empty(table)));
        }
    }

    fn snapshot(&self, table: Table) -> Result<Arc<MemTable>> {
        self.shared
            .live
            .read()
            .get(&table)
            .cloned()
            .ok_or_else(|| missing_live(table))
    }
}

#[async_trait]
impl ReloadStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.create_missing_tables();
        tracing::info!("In-memory schema initialized");
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.shared),
            staging: HashMap::new(),
            promoted: HashMap::new(),
        }))
    }

    async fn query_patients(&self, filter: &PatientFilter, page: Page) -> Result<PageOf<EntityRow>> {
        let snapshot = self.snapshot(Table::Patients)?;
        let mut rows: Vec<EntityRow> = snapshot.entities(Table::Patients)?.rows.clone();

        if filter.joins_stats() {
            let stats = self.snapshot(Table::PatientStats)?;
            let totals = stats.stats(Table::PatientStats)?;
            rows.retain(|row| {
                totals
                    .get(row.external_id())
                    .is_some_and(|total| filter.admits(*total))
            });
        }

        rows.sort_by_key(|row| row.id);
        Ok(PageOf::from_all(page, rows))
    }

    async fn query_payments(&self, filter: &PaymentFilter, page: Page) -> Result<PageOf<EntityRow>> {
        let snapshot = self.snapshot(Table::Payments)?;
        let mut rows: Vec<EntityRow> = snapshot
            .entities(Table::Payments)?
            .rows
            .iter()
            .filter(|row| filter.matches(&row.record))
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.id);
        Ok(PageOf::from_all(page, rows))
    }

    async fn query_stats(&self, page: Page) -> Result<PageOf<PatientStats>> {
        let snapshot = self.snapshot(Table::PatientStats)?;
        let stats = snapshot
            .stats(Table::PatientStats)?
            .iter()
            .map(|(patient_id, total)| PatientStats {
                patient_id: patient_id.clone(),
                total_amount: *total,
            })
            .collect();
        Ok(PageOf::from_all(page, stats))
    }

    async fn live_count(&self, table: Table) -> Result<u64> {
        Ok(self.snapshot(table)?.len() as u64)
    }
}

/// A reload's private view of a [`MemoryStore`]
struct MemoryTransaction {
    shared: Arc<Shared>,
    staging: HashMap<Table, MemTable>,
    /// Staging tables already swapped into the live position, pending commit
    promoted: HashMap<Table, Arc<MemTable>>,
}

impl MemoryTransaction {
    /// The live table as this transaction sees it
    fn live(&self, table: Table) -> Result<Arc<MemTable>> {
        if let Some(promoted) = self.promoted.get(&table) {
            return Ok(Arc::clone(promoted));
        }
        self.shared
            .live
            .read()
            .get(&table)
            .cloned()
            .ok_or_else(|| missing_live(table))
    }

    fn staged_entities(&mut self, table: Table) -> Result<&mut EntityTable> {
        match self.staging.get_mut(&table) {
            Some(MemTable::Entities(t)) => Ok(t),
            Some(MemTable::Stats(_)) => Err(ReloadError::Other(format!(
                "{} does not hold entity rows",
                table.staging_name()
            ))),
            None => Err(missing_staging(table)),
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn create_staging_table(&mut self, table: Table) -> Result<()> {
        self.live(table).map_err(|_| {
            ReloadError::Schema(format!(
                "cannot create {}: live table {} does not exist",
                table.staging_name(),
                table
            ))
        })?;
        self.staging.insert(table, MemTable::empty(table));
        Ok(())
    }

    async fn drop_staging_table(&mut self, table: Table) -> Result<()> {
        self.staging.remove(&table);
        Ok(())
    }

    async fn lookup_live(
        &mut self,
        kind: EntityKind,
        ids: &[ExternalId],
    ) -> Result<HashMap<ExternalId, EntityRow>> {
        let snapshot = self.live(kind.table())?;
        let table = snapshot.entities(kind.table())?;
        Ok(ids
            .iter()
            .filter_map(|id| table.get(id).map(|row| (id.clone(), row.clone())))
            .collect())
    }

    async fn lookup_staged(
        &mut self,
        kind: EntityKind,
        ids: &[ExternalId],
    ) -> Result<HashSet<ExternalId>> {
        let table = self.staged_entities(kind.table())?;
        Ok(ids
            .iter()
            .filter(|id| table.index.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn live_patient_ids(&mut self, ids: &[ExternalId]) -> Result<HashSet<ExternalId>> {
        let snapshot = self.live(Table::Patients)?;
        let patients = snapshot.entities(Table::Patients)?;
        Ok(ids
            .iter()
            .filter(|id| patients.index.contains_key(*id))
            .cloned()
            .collect())
    }

    async fn allocate_ids(&mut self, kind: EntityKind, count: usize) -> Result<Vec<EntityId>> {
        let mut sequences = self.shared.sequences.lock();
        let last = sequences.entry(kind).or_insert(0);
        let first = *last + 1;
        *last += count as i64;
        Ok((first..=*last).map(EntityId::new).collect())
    }

    async fn insert_staged(&mut self, kind: EntityKind, rows: &[EntityRow]) -> Result<u64> {
        let table = self.staged_entities(kind.table())?;
        let written = rows
            .iter()
            .filter(|row| table.insert((*row).clone()))
            .count();
        Ok(written as u64)
    }

    async fn aggregate_payment_totals(&mut self) -> Result<u64> {
        let payments = match self.staging.get(&Table::Payments) {
            Some(MemTable::Entities(t)) => t,
            _ => return Err(missing_staging(Table::Payments)),
        };

        let mut totals: BTreeMap<ExternalId, Decimal> = BTreeMap::new();
        for row in &payments.rows {
            if let Record::Payment(payment) = &row.record {
                *totals.entry(payment.patient_id.clone()).or_default() += payment.amount;
            }
        }
        for total in totals.values() {
            normalize_amount(*total)
                .map_err(|e| ReloadError::Database(format!("numeric field overflow: {e}")))?;
        }

        match self.staging.get_mut(&Table::PatientStats) {
            Some(MemTable::Stats(stats)) => {
                let written = totals.len() as u64;
                stats.extend(totals);
                Ok(written)
            }
            _ => Err(missing_staging(Table::PatientStats)),
        }
    }

    async fn analyze_staging(&mut self, table: Table) -> Result<()> {
        if !self.staging.contains_key(&table) {
            return Err(ReloadError::SwapConflict(format!(
                "cannot analyze {}: it does not exist",
                table.staging_name()
            )));
        }
        Ok(())
    }

    async fn promote_staging(&mut self, table: Table) -> Result<()> {
        let staged = self.staging.remove(&table).ok_or_else(|| {
            ReloadError::SwapConflict(format!(
                "expected {} to exist before swapping {}",
                table.staging_name(),
                table
            ))
        })?;
        self.promoted.insert(table, Arc::new(staged));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction {
            shared, promoted, ..
        } = *self;
        if promoted.is_empty() {
            return Ok(());
        }
        let mut live = shared.live.write();
        for (table, snapshot) in promoted {
            live.insert(table, snapshot);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

fn missing_live(table: Table) -> ReloadError {
    ReloadError::Schema(format!("live table {table} does not exist"))
}

fn missing_staging(table: Table) -> ReloadError {
    ReloadError::Schema(format!("staging table {} does not exist", table.staging_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PatientRecord, PaymentRecord, Record};
    use chrono::{NaiveDate, Utc};
    use std::str::FromStr;

    fn ext(id: &str) -> ExternalId {
        ExternalId::new(id).unwrap()
    }

    fn patient_row(id: i64, external_id: &str) -> EntityRow {
        EntityRow {
            id: EntityId::new(id),
            created: Utc::now(),
            updated: None,
            record: Record::Patient(PatientRecord {
                external_id: ext(external_id),
                first_name: "Rick".into(),
                last_name: "Deckard".into(),
                middle_name: None,
                date_of_birth: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            }),
        }
    }

    fn payment_row(id: i64, external_id: &str, patient: &str, amount: &str) -> EntityRow {
        EntityRow {
            id: EntityId::new(id),
            created: Utc::now(),
            updated: None,
            record: Record::Payment(PaymentRecord {
                external_id: ext(external_id),
                patient_id: ext(patient),
                amount: Decimal::from_str(amount).unwrap(),
            }),
        }
    }

    #[tokio::test]
    async fn test_staging_requires_live_table() {
        let store = MemoryStore::without_schema();
        let mut tx = store.begin().await.unwrap();
        let err = tx.create_staging_table(Table::Patients).await.unwrap_err();
        assert!(matches!(err, ReloadError::Schema(_)));
    }

    #[tokio::test]
    async fn test_commit_swaps_promoted_tables() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_staging_table(Table::Patients).await.unwrap();
        tx.insert_staged(EntityKind::Patient, &[patient_row(1, "usr1")])
            .await
            .unwrap();
        tx.promote_staging(Table::Patients).await.unwrap();

        // Promoted but uncommitted: visible inside, invisible outside
        assert_eq!(store.live_count(Table::Patients).await.unwrap(), 0);
        let seen = tx.live_patient_ids(&[ext("usr1")]).await.unwrap();
        assert!(seen.contains(&ext("usr1")));

        tx.commit().await.unwrap();
        assert_eq!(store.live_count(Table::Patients).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_everything() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_staging_table(Table::Patients).await.unwrap();
        tx.insert_staged(EntityKind::Patient, &[patient_row(1, "usr1")])
            .await
            .unwrap();
        tx.promote_staging(Table::Patients).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.live_count(Table::Patients).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_staged_skips_conflicts() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_staging_table(Table::Patients).await.unwrap();
        let written = tx
            .insert_staged(
                EntityKind::Patient,
                &[patient_row(1, "usr1"), patient_row(2, "usr1"), patient_row(3, "usr2")],
            )
            .await
            .unwrap();
        assert_eq!(written, 2);

        let staged = tx
            .lookup_staged(EntityKind::Patient, &[ext("usr1"), ext("usr9")])
            .await
            .unwrap();
        assert_eq!(staged, HashSet::from([ext("usr1")]));
    }

    #[tokio::test]
    async fn test_aggregate_payment_totals() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_staging_table(Table::Payments).await.unwrap();
        tx.create_staging_table(Table::PatientStats).await.unwrap();
        tx.insert_staged(
            EntityKind::Payment,
            &[
                payment_row(1, "pay1", "usr1", "10.25"),
                payment_row(2, "pay2", "usr1", "0.75"),
                payment_row(3, "pay3", "usr2", "5.00"),
            ],
        )
        .await
        .unwrap();

        assert_eq!(tx.aggregate_payment_totals().await.unwrap(), 2);
        tx.promote_staging(Table::PatientStats).await.unwrap();
        tx.commit().await.unwrap();

        let stats = store.query_stats(Page::first()).await.unwrap().items;
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].patient_id, ext("usr1"));
        assert_eq!(stats[0].total_amount, Decimal::from(11));
    }

    #[tokio::test]
    async fn test_promote_without_staging_is_conflict() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.promote_staging(Table::Payments).await.unwrap_err();
        assert!(matches!(err, ReloadError::SwapConflict(_)));
    }

    #[tokio::test]
    async fn test_sequences_are_monotonic_across_transactions() {
        let store = MemoryStore::new();
        let mut first = store.begin().await.unwrap();
        let ids = first.allocate_ids(EntityKind::Patient, 2).await.unwrap();
        assert_eq!(ids, vec![EntityId::new(1), EntityId::new(2)]);
        first.rollback().await.unwrap();

        let mut second = store.begin().await.unwrap();
        let ids = second.allocate_ids(EntityKind::Patient, 1).await.unwrap();
        assert_eq!(ids, vec![EntityId::new(3)]);
        let other = second.allocate_ids(EntityKind::Payment, 1).await.unwrap();
        assert_eq!(other, vec![EntityId::new(1)]);
    }

    #[tokio::test]
    async fn test_patient_query_joins_stats() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        for table in Table::ALL {
            tx.create_staging_table(table).await.unwrap();
        }
        tx.insert_staged(
            EntityKind::Patient,
            &[patient_row(1, "usr1"), patient_row(2, "usr2"), patient_row(3, "usr3")],
        )
        .await
        .unwrap();
        tx.insert_staged(
            EntityKind::Payment,
            &[
                payment_row(1, "pay1", "usr1", "5.00"),
                payment_row(2, "pay2", "usr2", "40.00"),
                payment_row(3, "pay3", "usr2", "2.50"),
            ],
        )
        .await
        .unwrap();
        tx.aggregate_payment_totals().await.unwrap();
        for table in Table::ALL {
            tx.promote_staging(table).await.unwrap();
        }
        tx.commit().await.unwrap();

        // usr3 has no payments: listed without bounds, never with them
        let all = store
            .query_patients(&PatientFilter::default(), Page::first())
            .await
            .unwrap();
        assert_eq!(all.total_entries, 3);

        let filter = PatientFilter {
            payment_min: Some(Decimal::from(5)),
            payment_max: None,
        };
        let page = store.query_patients(&filter, Page::first()).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|row| row.external_id().as_str()).collect();
        assert_eq!(ids, vec!["usr1", "usr2"]);

        let filter = PatientFilter {
            payment_min: Some(Decimal::from(0)),
            payment_max: Some(Decimal::from(10)),
        };
        let page = store.query_patients(&filter, Page::first()).await.unwrap();
        assert_eq!(page.total_entries, 1);
        assert_eq!(page.items[0].external_id().as_str(), "usr1");

        let payments = store
            .query_payments(
                &PaymentFilter {
                    patient_id: Some(ext("usr2")),
                    ..Default::default()
                },
                Page::first(),
            )
            .await
            .unwrap();
        let ids: Vec<_> = payments.items.iter().map(|row| row.id.get()).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
