//! Aggregation engine
//!
//! Rebuilds the per-patient payment totals from the staged payments. Totals
//! are derived from scratch on every payment reload and never merged with the
//! previous stats.

use crate::core::reload::state::ReloadOperation;
use crate::core::reload::ReloadTransaction;
use crate::domain::{EntityKind, ReloadError, Result, Table};

/// Fill the stats staging table from the staged payments
///
/// Returns the number of stats rows written, one per patient with at least
/// one accepted payment.
///
/// # Errors
///
/// - `ReloadError::InvalidTransition` unless payments are loaded and not yet
///   aggregated
/// - `ReloadError::Schema` if the stats staging table was not created
pub async fn recompute_stats(tx: &mut ReloadTransaction) -> Result<u64> {
    let next = tx.check(EntityKind::Payment, ReloadOperation::RecomputeStats)?;
    if !tx.has_staging(Table::PatientStats) {
        return Err(ReloadError::Schema(format!(
            "{} must be created before recomputing stats",
            Table::PatientStats.staging_name()
        )));
    }

    let written = tx.store().aggregate_payment_totals().await?;
    tx.set_state(EntityKind::Payment, next);

    tracing::info!(
        reload_id = %tx.reload_id(),
        table = %Table::PatientStats.staging_name(),
        rows = written,
        "Patient stats recomputed"
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::core::reload::state::ReloadState;
    use crate::core::{bulk_load, create_staging};

    #[tokio::test]
    async fn test_requires_loaded_payments() {
        let store = MemoryStore::new();
        let mut tx = ReloadTransaction::begin(&store).await.unwrap();
        create_staging(&mut tx, Table::Payments, true).await.unwrap();
        create_staging(&mut tx, Table::PatientStats, false).await.unwrap();

        let err = recompute_stats(&mut tx).await.unwrap_err();
        assert!(matches!(err, ReloadError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_requires_stats_staging() {
        let store = MemoryStore::new();
        let mut tx = ReloadTransaction::begin(&store).await.unwrap();
        create_staging(&mut tx, Table::Payments, true).await.unwrap();
        bulk_load(&mut tx, EntityKind::Payment, Vec::new()).await.unwrap();

        let err = recompute_stats(&mut tx).await.unwrap_err();
        assert!(matches!(err, ReloadError::Schema(_)));
        assert_eq!(tx.state(EntityKind::Payment), ReloadState::Loaded);
    }

    #[tokio::test]
    async fn test_empty_payments_yield_no_stats() {
        let store = MemoryStore::new();
        let mut tx = ReloadTransaction::begin(&store).await.unwrap();
        create_staging(&mut tx, Table::Payments, true).await.unwrap();
        create_staging(&mut tx, Table::PatientStats, false).await.unwrap();
        bulk_load(&mut tx, EntityKind::Payment, Vec::new()).await.unwrap();

        assert_eq!(recompute_stats(&mut tx).await.unwrap(), 0);
        assert_eq!(tx.state(EntityKind::Payment), ReloadState::Aggregated);
    }
}
