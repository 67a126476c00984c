//! PostgreSQL adapter implementing the storage traits
//!
//! Readers address the parent tables (`patients`, `payments`,
//! `patients_stats`); their rows live in an inheriting `_sub` child. A reload
//! builds a `_new` sibling inside one explicit transaction and repoints the
//! inheritance at commit time, so readers switch datasets in one step.

use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{
    entity_row_from_pg, external_id, stats_from_pg, StagedColumns,
};
use crate::adapters::postgresql::sql;
use crate::adapters::store::traits::{ReloadStore, StoreTransaction};
use crate::domain::{
    EntityId, EntityKind, EntityRow, ExternalId, Page, PageOf, PatientFilter, PatientStats,
    PaymentFilter, ReloadError, Result, Table,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// PostgreSQL implementation of [`ReloadStore`]
pub struct PostgreSQLStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLStore {
    /// Create a new PostgreSQL store
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl ReloadStore for PostgreSQLStore {
    fn name(&self) -> &str {
        "postgresql"
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_schema().await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let conn = self.client.get_connection().await?;
        conn.batch_execute("BEGIN")
            .await
            .map_err(|e| ReloadError::Database(format!("Failed to begin transaction: {}", e)))?;

        let timeout = self.client.statement_timeout_seconds();
        if timeout > 0 {
            conn.batch_execute(&sql::set_statement_timeout(timeout))
                .await
                .map_err(|e| {
                    ReloadError::Database(format!("Failed to set statement timeout: {}", e))
                })?;
        }

        Ok(Box::new(PgTransaction { conn: Some(conn) }))
    }

    async fn query_patients(&self, filter: &PatientFilter, page: Page) -> Result<PageOf<EntityRow>> {
        let conn = self.client.get_connection().await?;
        let (limit, offset) = page_bounds(page);
        let joined = filter.joins_stats();

        let (rows, total) = if joined {
            let bounds: [&(dyn ToSql + Sync); 2] = [&filter.payment_min, &filter.payment_max];
            let rows = conn
                .query(&sql::select_patients_page(true), &[bounds[0], bounds[1], &limit, &offset])
                .await;
            let total = conn.query_one(&sql::count_patients(true), &bounds).await;
            (rows, total)
        } else {
            let rows = conn
                .query(&sql::select_patients_page(false), &[&limit, &offset])
                .await;
            let total = conn.query_one(&sql::count_patients(false), &[]).await;
            (rows, total)
        };

        let rows = rows.map_err(|e| ReloadError::Database(format!("Failed to query patients: {e}")))?;
        let total = total.map_err(|e| ReloadError::Database(format!("Failed to count patients: {e}")))?;
        let items = rows
            .iter()
            .map(|row| entity_row_from_pg(EntityKind::Patient, row))
            .collect::<Result<Vec<_>>>()?;
        Ok(PageOf::new(page, read_count(&total)?, items))
    }

    async fn query_payments(&self, filter: &PaymentFilter, page: Page) -> Result<PageOf<EntityRow>> {
        let conn = self.client.get_connection().await?;
        let (limit, offset) = page_bounds(page);
        let external_id = filter.external_id.as_ref().map(ExternalId::as_str);
        let patient_id = filter.patient_id.as_ref().map(ExternalId::as_str);

        let rows = conn
            .query(&sql::select_payments_page(), &[&external_id, &patient_id, &limit, &offset])
            .await
            .map_err(|e| ReloadError::Database(format!("Failed to query payments: {e}")))?;
        let total = conn
            .query_one(&sql::count_payments(), &[&external_id, &patient_id])
            .await
            .map_err(|e| ReloadError::Database(format!("Failed to count payments: {e}")))?;

        let items = rows
            .iter()
            .map(|row| entity_row_from_pg(EntityKind::Payment, row))
            .collect::<Result<Vec<_>>>()?;
        Ok(PageOf::new(page, read_count(&total)?, items))
    }

    async fn query_stats(&self, page: Page) -> Result<PageOf<PatientStats>> {
        let conn = self.client.get_connection().await?;
        let (limit, offset) = page_bounds(page);
        let rows = conn
            .query(&sql::select_stats_page(), &[&limit, &offset])
            .await
            .map_err(|e| ReloadError::Database(format!("Failed to query patients_stats: {e}")))?;
        let items = rows.iter().map(stats_from_pg).collect::<Result<Vec<_>>>()?;
        let total = self.live_count(Table::PatientStats).await?;
        Ok(PageOf::new(page, total, items))
    }

    async fn live_count(&self, table: Table) -> Result<u64> {
        let conn = self.client.get_connection().await?;
        let row = conn
            .query_one(&sql::count_live(table), &[])
            .await
            .map_err(|e| ReloadError::Database(format!("Failed to count {}: {}", table, e)))?;
        read_count(&row)
    }
}

fn page_bounds(page: Page) -> (i64, i64) {
    (page.limit() as i64, page.offset() as i64)
}

fn read_count(row: &tokio_postgres::Row) -> Result<u64> {
    let count: i64 = row
        .try_get(0)
        .map_err(|e| ReloadError::Database(format!("Failed to read count: {}", e)))?;
    Ok(count as u64)
}

/// One reload transaction on a dedicated pooled connection
///
/// The connection is `None` once the transaction has finished.
struct PgTransaction {
    conn: Option<deadpool_postgres::Object>,
}

impl PgTransaction {
    fn conn(&self) -> Result<&deadpool_postgres::Object> {
        self.conn
            .as_ref()
            .ok_or_else(|| ReloadError::Database("transaction already finished".to_string()))
    }

    async fn execute(&self, statement: &str) -> Result<u64> {
        self.conn()?
            .execute(statement, &[])
            .await
            .map_err(|e| ReloadError::Database(format!("Statement failed ({statement}): {e}")))
    }

    async fn relation_exists(&self, name: &str) -> Result<bool> {
        let row = self
            .conn()?
            .query_one(sql::relation_exists(), &[&name])
            .await
            .map_err(|e| ReloadError::Database(format!("Failed to inspect {name}: {e}")))?;
        row.try_get(0)
            .map_err(|e| ReloadError::Database(format!("Failed to inspect {name}: {e}")))
    }

    async fn external_id_set(&self, statement: &str, ids: &[ExternalId]) -> Result<HashSet<ExternalId>> {
        let keys: Vec<&str> = ids.iter().map(ExternalId::as_str).collect();
        let rows = self
            .conn()?
            .query(statement, &[&keys])
            .await
            .map_err(|e| ReloadError::Database(format!("Lookup failed: {e}")))?;
        rows.iter().map(|row| external_id(row, "external_id")).collect()
    }

    async fn finish(&mut self, statement: &str) -> Result<()> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| ReloadError::Database("transaction already finished".to_string()))?;
        let outcome = conn.batch_execute(statement).await;
        if outcome.is_err() {
            // The session state is unknown; keep it out of the pool
            let _ = deadpool_postgres::Object::take(conn);
        }
        outcome.map_err(|e| ReloadError::Database(format!("{statement} failed: {e}")))
    }
}

impl Drop for PgTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Closing the connection makes the server roll the transaction back
            tracing::warn!("Reload transaction dropped without commit; discarding its connection");
            let _ = deadpool_postgres::Object::take(conn);
        }
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn create_staging_table(&mut self, table: Table) -> Result<()> {
        if !self.relation_exists(table.live_name()).await? {
            return Err(ReloadError::Schema(format!(
                "cannot create {}: live table {} does not exist",
                table.staging_name(),
                table
            )));
        }
        self.execute(&sql::drop_staging(table)).await?;
        self.execute(&sql::create_staging(table))
            .await
            .map_err(|e| ReloadError::Schema(e.to_string()))?;
        Ok(())
    }

    async fn drop_staging_table(&mut self, table: Table) -> Result<()> {
        self.execute(&sql::drop_staging(table)).await?;
        Ok(())
    }

    async fn lookup_live(
        &mut self,
        kind: EntityKind,
        ids: &[ExternalId],
    ) -> Result<HashMap<ExternalId, EntityRow>> {
        let keys: Vec<&str> = ids.iter().map(ExternalId::as_str).collect();
        let rows = self
            .conn()?
            .query(&sql::lookup_live(kind), &[&keys])
            .await
            .map_err(|e| ReloadError::Database(format!("Live lookup on {kind} failed: {e}")))?;

        let mut found = HashMap::with_capacity(rows.len());
        for row in &rows {
            let entity = entity_row_from_pg(kind, row)?;
            found.insert(entity.external_id().clone(), entity);
        }
        Ok(found)
    }

    async fn lookup_staged(
        &mut self,
        kind: EntityKind,
        ids: &[ExternalId],
    ) -> Result<HashSet<ExternalId>> {
        self.external_id_set(&sql::lookup_staged(kind), ids).await
    }

    async fn live_patient_ids(&mut self, ids: &[ExternalId]) -> Result<HashSet<ExternalId>> {
        self.external_id_set(&sql::live_patient_ids(), ids).await
    }

    async fn allocate_ids(&mut self, kind: EntityKind, count: usize) -> Result<Vec<EntityId>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let rows = self
            .conn()?
            .query(&sql::allocate_ids(kind), &[&(count as i64)])
            .await
            .map_err(|e| ReloadError::Database(format!("Failed to allocate {kind} ids: {e}")))?;
        rows.iter()
            .map(|row| {
                row.try_get::<_, i64>(0)
                    .map(EntityId::new)
                    .map_err(|e| ReloadError::Database(format!("Failed to read id: {e}")))
            })
            .collect()
    }

    async fn insert_staged(&mut self, kind: EntityKind, rows: &[EntityRow]) -> Result<u64> {
        let columns = StagedColumns::from_rows(kind, rows)?;
        if columns.is_empty() {
            return Ok(0);
        }
        self.conn()?
            .execute(&sql::insert_staged(kind), &columns.params())
            .await
            .map_err(|e| {
                ReloadError::Database(format!(
                    "Failed to stage {} rows into {}: {e}",
                    columns.len(),
                    kind.table().staging_name()
                ))
            })
    }

    async fn aggregate_payment_totals(&mut self) -> Result<u64> {
        self.execute(&sql::aggregate_payment_totals()).await
    }

    async fn analyze_staging(&mut self, table: Table) -> Result<()> {
        if !self.relation_exists(&table.staging_name()).await? {
            return Err(ReloadError::SwapConflict(format!(
                "cannot analyze {}: it does not exist",
                table.staging_name()
            )));
        }
        self.execute(&sql::analyze_staging(table)).await?;
        Ok(())
    }

    async fn promote_staging(&mut self, table: Table) -> Result<()> {
        if !self.relation_exists(&table.staging_name()).await? {
            return Err(ReloadError::SwapConflict(format!(
                "expected {} to exist before swapping {}",
                table.staging_name(),
                table
            )));
        }
        if self.relation_exists(&table.retired_name()).await? {
            return Err(ReloadError::SwapConflict(format!(
                "{} is left over from an earlier swap; inspect and drop it manually",
                table.retired_name()
            )));
        }

        for statement in sql::swap(table) {
            self.execute(&statement)
                .await
                .map_err(|e| ReloadError::SwapConflict(e.to_string()))?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut tx = self;
        tx.finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut tx = self;
        tx.finish("ROLLBACK").await
    }
}
