//! Reload transaction handle
//!
//! Wraps a backend [`StoreTransaction`] with the bookkeeping every reload
//! operation needs: a reload id for logs, the reload start time used as "now"
//! for every row it touches, per-entity state, and which staging tables exist.

use crate::adapters::store::traits::StoreTransaction;
use crate::adapters::store::ReloadStore;
use crate::core::reload::state::{invalid, transition, ReloadOperation, ReloadState};
use crate::domain::{EntityKind, Result, Table};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// An open reload transaction
///
/// Nothing done through this handle is visible to readers until
/// [`commit`](Self::commit). Dropping it without committing abandons the work.
pub struct ReloadTransaction {
    inner: Box<dyn StoreTransaction>,
    reload_id: Uuid,
    started_at: DateTime<Utc>,
    states: HashMap<EntityKind, ReloadState>,
    /// Staging tables created in this transaction, and whether they merge
    staging: HashMap<Table, bool>,
}

impl ReloadTransaction {
    /// Open a transaction on `store`
    pub async fn begin(store: &dyn ReloadStore) -> Result<Self> {
        let inner = store.begin().await?;
        let tx = Self::new(inner, Utc::now());
        tracing::debug!(
            reload_id = %tx.reload_id,
            backend = store.name(),
            "Reload transaction opened"
        );
        Ok(tx)
    }

    /// Wrap an already-open backend transaction
    pub fn new(inner: Box<dyn StoreTransaction>, started_at: DateTime<Utc>) -> Self {
        Self {
            inner,
            reload_id: Uuid::new_v4(),
            started_at,
            states: HashMap::new(),
            staging: HashMap::new(),
        }
    }

    pub fn reload_id(&self) -> Uuid {
        self.reload_id
    }

    /// Timestamp stamped into `created` and `updated` by this reload
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self, kind: EntityKind) -> ReloadState {
        self.states.get(&kind).copied().unwrap_or_default()
    }

    /// Whether `table` has a staging table in this transaction
    pub fn has_staging(&self, table: Table) -> bool {
        self.staging.contains_key(&table)
    }

    /// Whether the staging table for `table` applies the merge policy
    pub fn merges_into(&self, table: Table) -> bool {
        self.staging.get(&table).copied().unwrap_or(false)
    }

    /// The backend transaction
    pub(crate) fn store(&mut self) -> &mut dyn StoreTransaction {
        self.inner.as_mut()
    }

    /// Fail unless `operation` is legal for `kind` right now; returns the
    /// state it leads to without applying it
    pub(crate) fn check(&self, kind: EntityKind, operation: ReloadOperation) -> Result<ReloadState> {
        transition(kind, self.state(kind), operation)
    }

    pub(crate) fn set_state(&mut self, kind: EntityKind, state: ReloadState) {
        tracing::debug!(
            reload_id = %self.reload_id,
            entity = %kind,
            from = %self.state(kind),
            to = %state,
            "Reload state changed"
        );
        self.states.insert(kind, state);
    }

    pub(crate) fn record_staging(&mut self, table: Table, with_merge: bool) {
        self.staging.insert(table, with_merge);
    }

    pub(crate) fn forget_staging(&mut self, table: Table) {
        self.staging.remove(&table);
    }

    /// Commit every swap performed in this transaction
    ///
    /// # Errors
    ///
    /// Returns `ReloadError::InvalidTransition` if an entity still has staged
    /// work that was never swapped or discarded. The transaction is rolled
    /// back in that case.
    pub async fn commit(self) -> Result<()> {
        let pending = self
            .states
            .iter()
            .find(|(_, state)| state.is_in_flight())
            .map(|(kind, state)| (*kind, *state));

        if let Some((kind, state)) = pending {
            let reload_id = self.reload_id;
            self.inner.rollback().await?;
            tracing::warn!(
                reload_id = %reload_id,
                entity = %kind,
                state = %state,
                "Commit refused with an unfinished reload; rolled back"
            );
            return Err(invalid(ReloadOperation::Commit, kind, state));
        }

        let reload_id = self.reload_id;
        self.inner.commit().await?;
        tracing::debug!(reload_id = %reload_id, "Reload transaction committed");
        Ok(())
    }

    /// Abandon everything done in this transaction
    ///
    /// Returns the state each touched entity had reached, all of which are
    /// now [`ReloadState::Aborted`].
    pub async fn rollback(self) -> Result<HashMap<EntityKind, ReloadState>> {
        let reload_id = self.reload_id;
        let reached = self.states;
        self.inner.rollback().await?;
        tracing::debug!(reload_id = %reload_id, "Reload transaction rolled back");
        Ok(reached)
    }
}
