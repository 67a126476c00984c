//! Reload state machine
//!
//! One entity kind moves through
//! `Idle → StagingCreated → Loaded → Aggregated (payments only) → Swapped`
//! inside a transaction; rolling back marks it `Aborted`.

use crate::domain::{EntityKind, ReloadError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a single entity kind stands within a reload transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadState {
    #[default]
    Idle,
    StagingCreated,
    Loaded,
    Aggregated,
    Swapped,
    Aborted,
}

impl ReloadState {
    /// Staged work exists that has not been swapped in
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            ReloadState::StagingCreated | ReloadState::Loaded | ReloadState::Aggregated
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReloadState::Idle => "idle",
            ReloadState::StagingCreated => "staging_created",
            ReloadState::Loaded => "loaded",
            ReloadState::Aggregated => "aggregated",
            ReloadState::Swapped => "swapped",
            ReloadState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ReloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The calls a caller makes against a reload transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOperation {
    CreateStaging,
    BulkLoad,
    RecomputeStats,
    Swap,
    Discard,
    Commit,
}

impl ReloadOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            ReloadOperation::CreateStaging => "create staging for",
            ReloadOperation::BulkLoad => "bulk load",
            ReloadOperation::RecomputeStats => "recompute stats for",
            ReloadOperation::Swap => "swap",
            ReloadOperation::Discard => "discard staging for",
            ReloadOperation::Commit => "commit",
        }
    }
}

impl fmt::Display for ReloadOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The state `operation` moves `kind` to, if the call is legal from `from`
pub fn transition(
    kind: EntityKind,
    from: ReloadState,
    operation: ReloadOperation,
) -> Result<ReloadState> {
    use ReloadOperation as Op;
    use ReloadState as S;

    let next = match (operation, from) {
        (Op::CreateStaging, _) => Some(S::StagingCreated),
        (Op::BulkLoad, S::StagingCreated | S::Loaded) => Some(S::Loaded),
        (Op::RecomputeStats, S::Loaded) if kind == EntityKind::Payment => Some(S::Aggregated),
        (Op::Swap, S::Loaded) if kind == EntityKind::Patient => Some(S::Swapped),
        (Op::Swap, S::Aggregated) if kind == EntityKind::Payment => Some(S::Swapped),
        (Op::Discard, state) if state != S::Swapped => Some(S::Idle),
        (Op::Commit, state) if !state.is_in_flight() => Some(state),
        _ => None,
    };

    next.ok_or_else(|| invalid(operation, kind, from))
}

pub fn invalid(operation: ReloadOperation, kind: EntityKind, state: ReloadState) -> ReloadError {
    ReloadError::InvalidTransition {
        operation: operation.to_string(),
        entity: kind.to_string(),
        state: state.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    use EntityKind::{Patient, Payment};
    use ReloadOperation as Op;
    use ReloadState as S;

    #[test_case(Patient, S::Idle, Op::CreateStaging => S::StagingCreated)]
    #[test_case(Patient, S::Swapped, Op::CreateStaging => S::StagingCreated)]
    #[test_case(Patient, S::StagingCreated, Op::BulkLoad => S::Loaded)]
    #[test_case(Payment, S::Loaded, Op::BulkLoad => S::Loaded)]
    #[test_case(Payment, S::Loaded, Op::RecomputeStats => S::Aggregated)]
    #[test_case(Patient, S::Loaded, Op::Swap => S::Swapped)]
    #[test_case(Payment, S::Aggregated, Op::Swap => S::Swapped)]
    #[test_case(Payment, S::Loaded, Op::Discard => S::Idle)]
    #[test_case(Patient, S::Swapped, Op::Commit => S::Swapped)]
    #[test_case(Patient, S::Idle, Op::Commit => S::Idle)]
    fn test_legal_transitions(kind: EntityKind, from: ReloadState, op: ReloadOperation) -> ReloadState {
        transition(kind, from, op).unwrap()
    }

    #[test_case(Patient, S::Idle, Op::BulkLoad ; "load before staging")]
    #[test_case(Patient, S::StagingCreated, Op::Swap ; "swap before load")]
    #[test_case(Payment, S::Loaded, Op::Swap ; "payment swap without stats")]
    #[test_case(Patient, S::Loaded, Op::RecomputeStats ; "stats for patients")]
    #[test_case(Payment, S::StagingCreated, Op::RecomputeStats ; "stats before load")]
    #[test_case(Payment, S::Aggregated, Op::BulkLoad ; "load after stats")]
    #[test_case(Patient, S::Swapped, Op::Discard ; "discard after swap")]
    #[test_case(Payment, S::Loaded, Op::Commit ; "commit mid reload")]
    fn test_illegal_transitions(kind: EntityKind, from: ReloadState, op: ReloadOperation) {
        let err = transition(kind, from, op).unwrap_err();
        assert!(matches!(err, ReloadError::InvalidTransition { .. }));
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = transition(Payment, S::Loaded, Op::Swap).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid reload sequence: cannot swap payments while loaded"
        );
    }
}
