//! Domain identifier types with validation
//!
//! This module provides newtype wrappers for the two identities every stored
//! entity has: the caller-supplied [`ExternalId`] used to reconcile records
//! across reloads, and the internally assigned surrogate [`EntityId`]. It also
//! names the entity kinds and the physical tables a reload touches.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External identifier newtype wrapper
///
/// The stable identifier supplied by the upstream feed. It is unique per
/// entity kind in the live dataset and is the key the merge policy matches on.
///
/// # Examples
///
/// ```
/// use shadowswap::domain::ids::ExternalId;
/// use std::str::FromStr;
///
/// let id = ExternalId::from_str("usr1").unwrap();
/// assert_eq!(id.as_str(), "usr1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalId(String);

impl ExternalId {
    /// Creates a new ExternalId from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(ExternalId)` if the ID is non-blank, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("External ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the external ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExternalId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ExternalId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExternalId> for String {
    fn from(id: ExternalId) -> Self {
        id.0
    }
}

impl AsRef<str> for ExternalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Surrogate identifier assigned once per entity and never reassigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kinds of entity a reload can target
///
/// `Payment` is the dependent kind: every payment references a patient by
/// external id and feeds the per-patient stats table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Patient,
    Payment,
}

impl EntityKind {
    /// The table holding rows of this kind
    pub fn table(self) -> Table {
        match self {
            EntityKind::Patient => Table::Patients,
            EntityKind::Payment => Table::Payments,
        }
    }

    /// Whether this kind references another entity kind
    pub fn is_dependent(self) -> bool {
        matches!(self, EntityKind::Payment)
    }

    /// Plural name used in logs and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Patient => "patients",
            EntityKind::Payment => "payments",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "patient" | "patients" => Ok(EntityKind::Patient),
            "payment" | "payments" => Ok(EntityKind::Payment),
            other => Err(format!(
                "Unknown entity kind '{other}'. Must be 'patients' or 'payments'"
            )),
        }
    }
}

/// Physical tables managed by a reload
///
/// Each table exists under four names. Readers address the live (parent)
/// name; the rows currently served sit in the `_sub` child; a reload builds
/// into `_new`; the swap briefly parks the retired child under `_old`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Patients,
    Payments,
    PatientStats,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Patients, Table::Payments, Table::PatientStats];

    /// Name readers query
    pub fn live_name(self) -> &'static str {
        match self {
            Table::Patients => "patients",
            Table::Payments => "payments",
            Table::PatientStats => "patients_stats",
        }
    }

    /// Name of the table a reload builds into
    pub fn staging_name(self) -> String {
        format!("{}_new", self.live_name())
    }

    /// Name of the child table currently serving reads
    pub fn serving_name(self) -> String {
        format!("{}_sub", self.live_name())
    }

    /// Name the serving child takes while it is being retired
    pub fn retired_name(self) -> String {
        format!("{}_old", self.live_name())
    }

    /// The entity kind stored in this table, if it stores entities at all
    pub fn entity_kind(self) -> Option<EntityKind> {
        match self {
            Table::Patients => Some(EntityKind::Patient),
            Table::Payments => Some(EntityKind::Payment),
            Table::PatientStats => None,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.live_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_id_valid() {
        let id = ExternalId::new("usr1").unwrap();
        assert_eq!(id.as_str(), "usr1");
        assert_eq!(id.to_string(), "usr1");
    }

    #[test]
    fn test_external_id_blank() {
        assert!(ExternalId::new("").is_err());
        assert!(ExternalId::new("   ").is_err());
    }

    #[test]
    fn test_external_id_serde() {
        let id: ExternalId = serde_json::from_str("\"pay7\"").unwrap();
        assert_eq!(id.as_str(), "pay7");
        assert!(serde_json::from_str::<ExternalId>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"pay7\"");
    }

    #[test]
    fn test_entity_kind_from_str() {
        assert_eq!("patients".parse::<EntityKind>().unwrap(), EntityKind::Patient);
        assert_eq!("Payment".parse::<EntityKind>().unwrap(), EntityKind::Payment);
        assert!("invoices".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_entity_kind_tables() {
        assert_eq!(EntityKind::Patient.table(), Table::Patients);
        assert_eq!(EntityKind::Payment.table(), Table::Payments);
        assert!(EntityKind::Payment.is_dependent());
        assert!(!EntityKind::Patient.is_dependent());
    }

    #[test]
    fn test_table_names() {
        assert_eq!(Table::PatientStats.live_name(), "patients_stats");
        assert_eq!(Table::PatientStats.staging_name(), "patients_stats_new");
        assert_eq!(Table::Payments.serving_name(), "payments_sub");
        assert_eq!(Table::Patients.retired_name(), "patients_old");
        assert_eq!(Table::PatientStats.entity_kind(), None);
    }
}
