//! Swap coordinator
//!
//! Promotes staging tables into the live position. Each table gets a
//! planner-statistics refresh first, then the backend's constant-time
//! promotion. The new data becomes visible to readers when the transaction
//! commits.

use crate::core::reload::state::ReloadOperation;
use crate::core::reload::ReloadTransaction;
use crate::domain::{EntityKind, Result, Table};

/// Tables promoted by a swap of `kind`, in promotion order
pub fn swap_tables(kind: EntityKind) -> &'static [Table] {
    match kind {
        EntityKind::Patient => &[Table::Patients],
        EntityKind::Payment => &[Table::Payments, Table::PatientStats],
    }
}

/// Promote the staging tables of `kind`
///
/// Swapping payments promotes the payments and the stats staging tables
/// together.
///
/// # Errors
///
/// - `ReloadError::InvalidTransition` if the reload has not reached the
///   swap (patients must be loaded, payments aggregated)
/// - `ReloadError::SwapConflict` if the backend does not find the expected
///   staging or retired table state
pub async fn swap(tx: &mut ReloadTransaction, kind: EntityKind) -> Result<()> {
    let next = tx.check(kind, ReloadOperation::Swap)?;

    for &table in swap_tables(kind) {
        tx.store().analyze_staging(table).await?;
        tx.store().promote_staging(table).await?;
        tx.forget_staging(table);

        tracing::info!(
            reload_id = %tx.reload_id(),
            table = %table,
            "Staging table promoted"
        );
    }

    tx.set_state(kind, next);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::adapters::store::ReloadStore;
    use crate::core::reload::state::ReloadState;
    use crate::core::{bulk_load, create_staging};
    use crate::domain::ReloadError;
    use serde_json::json;

    #[test]
    fn test_payment_swap_includes_stats() {
        assert_eq!(swap_tables(EntityKind::Patient), &[Table::Patients]);
        assert_eq!(
            swap_tables(EntityKind::Payment),
            &[Table::Payments, Table::PatientStats]
        );
    }

    #[tokio::test]
    async fn test_swap_visible_only_after_commit() {
        let store = MemoryStore::new();
        let mut tx = ReloadTransaction::begin(&store).await.unwrap();
        create_staging(&mut tx, Table::Patients, true).await.unwrap();
        let records = vec![Ok(json!({
            "externalId": "usr1",
            "firstName": "Rick",
            "lastName": "Deckard",
            "dateOfBirth": "2000-01-01"
        }))];
        bulk_load(&mut tx, EntityKind::Patient, records).await.unwrap();

        swap(&mut tx, EntityKind::Patient).await.unwrap();
        assert_eq!(tx.state(EntityKind::Patient), ReloadState::Swapped);
        assert_eq!(store.live_count(Table::Patients).await.unwrap(), 0);

        tx.commit().await.unwrap();
        assert_eq!(store.live_count(Table::Patients).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_swap_before_load_is_rejected() {
        let store = MemoryStore::new();
        let mut tx = ReloadTransaction::begin(&store).await.unwrap();
        create_staging(&mut tx, Table::Patients, true).await.unwrap();

        let err = swap(&mut tx, EntityKind::Patient).await.unwrap_err();
        assert!(matches!(err, ReloadError::InvalidTransition { .. }));
    }
}
