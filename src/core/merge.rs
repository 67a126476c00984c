//! Merge policy
//!
//! The per-row upsert decision applied to every record before it is staged.
//! Given the incoming record and what the transaction already knows about its
//! external id, [`evaluate`] either resolves the row's identity and timestamps
//! or says why the row is dropped. It performs no I/O; the bulk loader gathers
//! the context for a whole chunk in batched lookups and then asks the policy
//! about each record in feed order.
//!
//! Order of checks:
//!
//! 1. Identity: a live row with the same external id lends its `id` and
//!    `created`. `updated` becomes the reload time when content differs and
//!    otherwise keeps the live row's value.
//! 2. Duplicate suppression: an external id that is already staged drops the
//!    row (first write wins).
//! 3. Referential check: a payment whose owning patient is not live drops the
//!    row.

use crate::domain::{EntityId, EntityRow, Record};
use chrono::{DateTime, Utc};

/// What the transaction knows about an incoming record's external id
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeContext<'a> {
    /// The live row sharing the record's external id, if any
    pub live: Option<&'a EntityRow>,

    /// Whether the external id is already staged in this reload
    pub already_staged: bool,

    /// Whether the owning patient is live; ignored for independent records
    pub owner_present: bool,
}

/// How an accepted row got its surrogate identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// Carried over from the live row
    Existing {
        id: EntityId,
        created: DateTime<Utc>,
    },
    /// Needs a freshly allocated id; `created` is the reload time
    Fresh,
}

/// Outcome of comparing an accepted record with the live version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Inserted,
    Unchanged,
    Updated,
}

/// A record that will be staged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub identity: Identity,
    pub updated: Option<DateTime<Utc>>,
    pub change: Change,
    pub record: Record,
}

impl Accepted {
    /// Builds the stored row, using `fresh_id` when the identity is new
    pub fn into_row(self, fresh_id: Option<EntityId>, now: DateTime<Utc>) -> Option<EntityRow> {
        let (id, created) = match self.identity {
            Identity::Existing { id, created } => (id, created),
            Identity::Fresh => (fresh_id?, now),
        };
        Some(EntityRow {
            id,
            created,
            updated: self.updated,
            record: self.record,
        })
    }
}

/// Why a record was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    DuplicateInBatch,
    MissingOwner,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDecision {
    Accept(Accepted),
    Drop(DropReason),
}

/// Decides what happens to one incoming record
///
/// `now` is the reload's start time, so every row touched by one reload
/// carries the same timestamp.
pub fn evaluate(record: Record, context: &MergeContext<'_>, now: DateTime<Utc>) -> MergeDecision {
    let (identity, updated, change) = match context.live {
        Some(live) => {
            let identity = Identity::Existing {
                id: live.id,
                created: live.created,
            };
            if record.content_differs(&live.record) {
                (identity, Some(now), Change::Updated)
            } else {
                (identity, live.updated, Change::Unchanged)
            }
        }
        None => (Identity::Fresh, None, Change::Inserted),
    };

    if context.already_staged {
        return MergeDecision::Drop(DropReason::DuplicateInBatch);
    }

    if record.kind().is_dependent() && !context.owner_present {
        return MergeDecision::Drop(DropReason::MissingOwner);
    }

    MergeDecision::Accept(Accepted {
        identity,
        updated,
        change,
        record,
    })
}

/// Decision for staging without the merge policy: every record is new and
/// only duplicate suppression applies
pub fn evaluate_plain(record: Record, already_staged: bool) -> MergeDecision {
    if already_staged {
        return MergeDecision::Drop(DropReason::DuplicateInBatch);
    }
    MergeDecision::Accept(Accepted {
        identity: Identity::Fresh,
        updated: None,
        change: Change::Inserted,
        record,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExternalId, PatientRecord, PaymentRecord};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn patient(external_id: &str, first_name: &str) -> Record {
        Record::Patient(PatientRecord {
            external_id: ExternalId::new(external_id).unwrap(),
            first_name: first_name.to_string(),
            last_name: "Deckard".to_string(),
            middle_name: None,
            date_of_birth: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
        })
    }

    fn payment(external_id: &str, amount: &str) -> Record {
        Record::Payment(PaymentRecord {
            external_id: ExternalId::new(external_id).unwrap(),
            patient_id: ExternalId::new("usr1").unwrap(),
            amount: Decimal::from_str(amount).unwrap(),
        })
    }

    fn stored(record: Record, updated: Option<DateTime<Utc>>) -> EntityRow {
        EntityRow {
            id: EntityId::new(1),
            created: t0(),
            updated,
            record,
        }
    }

    fn accepted(decision: MergeDecision) -> Accepted {
        match decision {
            MergeDecision::Accept(accepted) => accepted,
            MergeDecision::Drop(reason) => panic!("expected accept, got drop: {reason:?}"),
        }
    }

    #[test]
    fn test_unchanged_record_keeps_identity_and_updated() {
        let live = stored(patient("usr1", "Rick"), None);
        let context = MergeContext {
            live: Some(&live),
            ..Default::default()
        };

        let result = accepted(evaluate(patient("usr1", "Rick"), &context, now()));
        assert_eq!(
            result.identity,
            Identity::Existing {
                id: EntityId::new(1),
                created: t0()
            }
        );
        assert_eq!(result.updated, None);
        assert_eq!(result.change, Change::Unchanged);
    }

    #[test]
    fn test_unchanged_record_keeps_earlier_updated() {
        let earlier = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let live = stored(patient("usr1", "Rick"), Some(earlier));
        let context = MergeContext {
            live: Some(&live),
            ..Default::default()
        };

        let result = accepted(evaluate(patient("usr1", "Rick"), &context, now()));
        assert_eq!(result.updated, Some(earlier));
    }

    #[test]
    fn test_changed_record_sets_updated() {
        let live = stored(patient("usr1", "Rick"), None);
        let context = MergeContext {
            live: Some(&live),
            ..Default::default()
        };

        let result = accepted(evaluate(patient("usr1", "Richard"), &context, now()));
        assert_eq!(result.updated, Some(now()));
        assert_eq!(result.change, Change::Updated);
        assert!(matches!(result.identity, Identity::Existing { .. }));
    }

    #[test]
    fn test_new_record_is_fresh() {
        let result = accepted(evaluate(
            patient("usr2", "Ann"),
            &MergeContext::default(),
            now(),
        ));
        assert_eq!(result.identity, Identity::Fresh);
        assert_eq!(result.updated, None);
        assert_eq!(result.change, Change::Inserted);
    }

    #[test]
    fn test_already_staged_is_dropped() {
        let context = MergeContext {
            already_staged: true,
            ..Default::default()
        };
        assert_eq!(
            evaluate(patient("usr1", "Rick"), &context, now()),
            MergeDecision::Drop(DropReason::DuplicateInBatch)
        );
    }

    #[test]
    fn test_payment_without_owner_is_dropped() {
        let context = MergeContext::default();
        assert_eq!(
            evaluate(payment("pay1", "10.00"), &context, now()),
            MergeDecision::Drop(DropReason::MissingOwner)
        );

        let context = MergeContext {
            owner_present: true,
            ..Default::default()
        };
        assert!(matches!(
            evaluate(payment("pay1", "10.00"), &context, now()),
            MergeDecision::Accept(_)
        ));
    }

    #[test]
    fn test_duplicate_wins_over_missing_owner() {
        let context = MergeContext {
            already_staged: true,
            owner_present: false,
            ..Default::default()
        };
        assert_eq!(
            evaluate(payment("pay1", "10.00"), &context, now()),
            MergeDecision::Drop(DropReason::DuplicateInBatch)
        );
    }

    #[test]
    fn test_payment_amount_change_detected() {
        let live = stored(payment("pay1", "10.00"), None);
        let context = MergeContext {
            live: Some(&live),
            already_staged: false,
            owner_present: true,
        };
        let same = accepted(evaluate(payment("pay1", "10.0"), &context, now()));
        assert_eq!(same.change, Change::Unchanged);

        let changed = accepted(evaluate(payment("pay1", "10.01"), &context, now()));
        assert_eq!(changed.change, Change::Updated);
    }

    #[test]
    fn test_into_row() {
        let fresh = accepted(evaluate(patient("usr2", "Ann"), &MergeContext::default(), now()));
        assert!(fresh.clone().into_row(None, now()).is_none());

        let row = fresh.into_row(Some(EntityId::new(7)), now()).unwrap();
        assert_eq!(row.id, EntityId::new(7));
        assert_eq!(row.created, now());
        assert_eq!(row.updated, None);
    }

    #[test]
    fn test_plain_staging() {
        assert_eq!(
            evaluate_plain(patient("usr1", "Rick"), true),
            MergeDecision::Drop(DropReason::DuplicateInBatch)
        );
        let result = accepted(evaluate_plain(patient("usr1", "Rick"), false));
        assert_eq!(result.identity, Identity::Fresh);
    }
}
