//! Entity records and stored rows
//!
//! Incoming feeds describe entities as JSON objects with camelCase keys. This
//! module turns those objects into typed [`Record`]s, rejecting anything that
//! could not be stored, and defines the shape of a stored [`EntityRow`] and of
//! the derived [`PatientStats`] summary.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use super::errors::IngestionError;
use super::ids::{EntityId, EntityKind, ExternalId};

/// Fractional digits kept for amounts
pub const AMOUNT_SCALE: u32 = 2;

/// Amounts are stored as NUMERIC(10,2): eight integral digits
const AMOUNT_INTEGRAL_DIGITS: u32 = 8;

/// Mutable content of a patient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub external_id: ExternalId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub date_of_birth: NaiveDate,
}

/// Mutable content of a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub external_id: ExternalId,
    /// External id of the owning patient
    pub patient_id: ExternalId,
    pub amount: Decimal,
}

/// A parsed incoming record of either kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Patient(PatientRecord),
    Payment(PaymentRecord),
}

impl Record {
    /// Parses a raw feed object into a record of the given kind
    ///
    /// # Errors
    ///
    /// Returns an [`IngestionError`] carrying the raw object when a required
    /// field is missing, blank, or cannot be converted to its column type.
    pub fn from_json(kind: EntityKind, raw: &Value) -> Result<Self, IngestionError> {
        let parsed = match raw {
            Value::Object(_) => match kind {
                EntityKind::Patient => parse_patient(raw).map(Record::Patient),
                EntityKind::Payment => parse_payment(raw).map(Record::Payment),
            },
            other => Err(IngestionError::new(format!(
                "Expected a JSON object, got {}",
                json_type_name(other)
            ))),
        };
        parsed.map_err(|e| e.with_record(raw.clone()))
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Patient(_) => EntityKind::Patient,
            Record::Payment(_) => EntityKind::Payment,
        }
    }

    pub fn external_id(&self) -> &ExternalId {
        match self {
            Record::Patient(p) => &p.external_id,
            Record::Payment(p) => &p.external_id,
        }
    }

    /// The owning patient for dependent records
    pub fn owner(&self) -> Option<&ExternalId> {
        match self {
            Record::Patient(_) => None,
            Record::Payment(p) => Some(&p.patient_id),
        }
    }

    /// Whether any mutable field differs from a previously stored version
    pub fn content_differs(&self, stored: &Record) -> bool {
        match (self, stored) {
            (Record::Patient(new), Record::Patient(old)) => {
                new.first_name != old.first_name
                    || new.last_name != old.last_name
                    || new.middle_name != old.middle_name
                    || new.date_of_birth != old.date_of_birth
            }
            (Record::Payment(new), Record::Payment(old)) => {
                new.amount != old.amount || new.patient_id != old.patient_id
            }
            _ => true,
        }
    }
}

/// A stored entity row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRow {
    pub id: EntityId,
    pub created: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
    pub record: Record,
}

impl EntityRow {
    pub fn external_id(&self) -> &ExternalId {
        self.record.external_id()
    }
}

/// Per-patient payment total, rebuilt from scratch on every payment reload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientStats {
    pub patient_id: ExternalId,
    pub total_amount: Decimal,
}

/// Rounds an amount to storage scale and checks it fits the column
///
/// Rounding follows NUMERIC semantics: half away from zero.
pub fn normalize_amount(amount: Decimal) -> Result<Decimal, String> {
    let rounded = amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    let limit = Decimal::from(10_i64.pow(AMOUNT_INTEGRAL_DIGITS));
    if rounded.abs() >= limit {
        return Err(format!(
            "amount {amount} exceeds the storable range of +/-{limit}"
        ));
    }
    Ok(rounded)
}

fn parse_patient(raw: &Value) -> Result<PatientRecord, IngestionError> {
    let date_text = required_str(raw, "dateOfBirth")?;
    let date_of_birth = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d").map_err(|e| {
        IngestionError::new(format!("Invalid 'dateOfBirth' value '{date_text}': {e}"))
    })?;

    Ok(PatientRecord {
        external_id: required_id(raw, "externalId")?,
        first_name: required_str(raw, "firstName")?,
        last_name: required_str(raw, "lastName")?,
        middle_name: optional_str(raw, "middleName")?,
        date_of_birth,
    })
}

fn parse_payment(raw: &Value) -> Result<PaymentRecord, IngestionError> {
    let amount = match raw.get("amount") {
        None | Some(Value::Null) => {
            return Err(IngestionError::new("Missing required field 'amount'"))
        }
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        Some(Value::String(s)) => parse_decimal(s.trim()),
        Some(other) => Err(format!(
            "expected a number, got {}",
            json_type_name(other)
        )),
    }
    .and_then(normalize_amount)
    .map_err(|e| IngestionError::new(format!("Invalid 'amount' value: {e}")))?;

    Ok(PaymentRecord {
        external_id: required_id(raw, "externalId")?,
        patient_id: required_id(raw, "patientId")?,
        amount,
    })
}

fn parse_decimal(text: &str) -> Result<Decimal, String> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|_| format!("'{text}' is not a decimal number"))
}

/// Reads a text field; integers are accepted and rendered as text
fn required_str(raw: &Value, field: &str) -> Result<String, IngestionError> {
    match raw.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Some(Value::String(_)) => Err(IngestionError::new(format!(
            "Required field '{field}' is empty"
        ))),
        None | Some(Value::Null) => Err(IngestionError::new(format!(
            "Missing required field '{field}'"
        ))),
        Some(other) => Err(IngestionError::new(format!(
            "Field '{field}' must be a string, got {}",
            json_type_name(other)
        ))),
    }
}

fn required_id(raw: &Value, field: &str) -> Result<ExternalId, IngestionError> {
    let text = required_str(raw, field)?;
    ExternalId::new(text).map_err(|e| IngestionError::new(format!("Invalid '{field}': {e}")))
}

fn optional_str(raw: &Value, field: &str) -> Result<Option<String>, IngestionError> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(IngestionError::new(format!(
            "Field '{field}' must be a string, got {}",
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
