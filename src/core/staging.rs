//! Shadow table manager
//!
//! Creates and discards the staging tables a reload builds into. Staging
//! tables are shaped like their live table and are private to the reload
//! transaction until the swap.

use crate::core::reload::state::{ReloadOperation, ReloadState};
use crate::core::reload::ReloadTransaction;
use crate::domain::{EntityKind, ReloadError, Result, Table};

/// Create (or reset) the staging table for `table`
///
/// Any staging table left from an earlier attempt is dropped first. With
/// `with_merge`, rows loaded into an entity table go through the merge policy;
/// without it they are staged as new rows. The stats table never merges.
///
/// Resetting the payments staging table also forgets the stats staging table,
/// which must be created again before the stats are recomputed.
///
/// # Errors
///
/// Returns `ReloadError::Schema` if the live table does not exist.
pub async fn create_staging(
    tx: &mut ReloadTransaction,
    table: Table,
    with_merge: bool,
) -> Result<()> {
    let kind = table.entity_kind();
    if kind.is_none() && with_merge {
        return Err(ReloadError::Schema(format!(
            "{} holds derived rows and cannot merge",
            table.staging_name()
        )));
    }
    if let Some(kind) = kind {
        tx.check(kind, ReloadOperation::CreateStaging)?;
    }

    tx.store().create_staging_table(table).await?;
    tx.record_staging(table, with_merge);

    tracing::info!(
        reload_id = %tx.reload_id(),
        table = %table.staging_name(),
        with_merge,
        "Staging table created"
    );

    if let Some(kind) = kind {
        if kind == EntityKind::Payment {
            tx.forget_staging(Table::PatientStats);
        }
        tx.set_state(kind, ReloadState::StagingCreated);
    }
    Ok(())
}

/// Drop the staging tables of an entity kind and return it to idle
///
/// For payments this also drops the stats staging table.
pub async fn discard_staging(tx: &mut ReloadTransaction, kind: EntityKind) -> Result<()> {
    let next = tx.check(kind, ReloadOperation::Discard)?;

    let mut tables = vec![kind.table()];
    if kind == EntityKind::Payment {
        tables.push(Table::PatientStats);
    }

    for table in tables {
        tx.store().drop_staging_table(table).await?;
        if tx.has_staging(table) {
            tracing::info!(
                reload_id = %tx.reload_id(),
                table = %table.staging_name(),
                "Staging table discarded"
            );
        }
        tx.forget_staging(table);
    }

    tx.set_state(kind, next);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;

    #[tokio::test]
    async fn test_create_staging_moves_state() {
        let store = MemoryStore::new();
        let mut tx = ReloadTransaction::begin(&store).await.unwrap();

        create_staging(&mut tx, Table::Patients, true).await.unwrap();
        assert_eq!(tx.state(EntityKind::Patient), ReloadState::StagingCreated);
        assert!(tx.merges_into(Table::Patients));

        create_staging(&mut tx, Table::PatientStats, false).await.unwrap();
        assert!(tx.has_staging(Table::PatientStats));
        assert!(!tx.merges_into(Table::PatientStats));
    }

    #[tokio::test]
    async fn test_stats_table_cannot_merge() {
        let store = MemoryStore::new();
        let mut tx = ReloadTransaction::begin(&store).await.unwrap();
        let err = create_staging(&mut tx, Table::PatientStats, true).await.unwrap_err();
        assert!(matches!(err, ReloadError::Schema(_)));
    }

    #[tokio::test]
    async fn test_missing_live_table_is_schema_error() {
        let store = MemoryStore::without_schema();
        let mut tx = ReloadTransaction::begin(&store).await.unwrap();
        let err = create_staging(&mut tx, Table::Patients, true).await.unwrap_err();
        assert!(matches!(err, ReloadError::Schema(_)));
        assert_eq!(tx.state(EntityKind::Patient), ReloadState::Idle);
    }

    #[tokio::test]
    async fn test_resetting_payments_forgets_stats() {
        let store = MemoryStore::new();
        let mut tx = ReloadTransaction::begin(&store).await.unwrap();
        create_staging(&mut tx, Table::Payments, true).await.unwrap();
        create_staging(&mut tx, Table::PatientStats, false).await.unwrap();

        create_staging(&mut tx, Table::Payments, true).await.unwrap();
        assert!(!tx.has_staging(Table::PatientStats));
    }

    #[tokio::test]
    async fn test_discard_payments_drops_stats() {
        let store = MemoryStore::new();
        let mut tx = ReloadTransaction::begin(&store).await.unwrap();
        create_staging(&mut tx, Table::Payments, true).await.unwrap();
        create_staging(&mut tx, Table::PatientStats, false).await.unwrap();

        discard_staging(&mut tx, EntityKind::Payment).await.unwrap();
        assert!(!tx.has_staging(Table::Payments));
        assert!(!tx.has_staging(Table::PatientStats));
        assert_eq!(tx.state(EntityKind::Payment), ReloadState::Idle);
    }
}
