//! CSV feeds
//!
//! Headerless rows with a fixed column order:
//!
//! - patients: `external_id, first_name, last_name, date_of_birth[, middle_name]`
//! - payments: `external_id, patient_id, amount`
//!
//! Each row is turned into the same camelCase object a JSON feed carries, so
//! both formats go through one parser.

use crate::domain::{EntityKind, IngestionError, ReloadError, Result};
use serde_json::{Map, Value};
use std::io::Read;

const PATIENT_COLUMNS: &[&str] = &["externalId", "firstName", "lastName", "dateOfBirth"];
const PATIENT_OPTIONAL_COLUMNS: &[&str] = &["middleName"];
const PAYMENT_COLUMNS: &[&str] = &["externalId", "patientId", "amount"];

/// Column keys for `kind`: required first, then optional
pub fn columns(kind: EntityKind) -> (&'static [&'static str], &'static [&'static str]) {
    match kind {
        EntityKind::Patient => (PATIENT_COLUMNS, PATIENT_OPTIONAL_COLUMNS),
        EntityKind::Payment => (PAYMENT_COLUMNS, &[]),
    }
}

/// Read CSV rows of `kind` lazily
pub fn read_records<R>(reader: R, kind: EntityKind) -> impl Iterator<Item = Result<Value>> + Send
where
    R: Read + Send,
{
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
        .into_records()
        .map(move |row| {
            let row = row.map_err(ReloadError::from)?;
            row_to_object(kind, &row)
        })
}

/// Map one CSV row onto a feed object
///
/// Empty optional cells are left out.
pub fn row_to_object(kind: EntityKind, row: &csv::StringRecord) -> Result<Value> {
    let (required, optional) = columns(kind);
    let max = required.len() + optional.len();

    if row.len() < required.len() || row.len() > max {
        let fields: Vec<Value> = row.iter().map(|f| Value::String(f.to_string())).collect();
        let expected = if optional.is_empty() {
            required.len().to_string()
        } else {
            format!("{} to {}", required.len(), max)
        };
        let mut err = IngestionError::new(format!(
            "Expected {expected} columns for {kind}, got {}",
            row.len()
        ))
        .with_record(Value::Array(fields));
        if let Some(position) = row.position() {
            err = err.at_position(position.record());
        }
        return Err(ReloadError::Ingestion(err));
    }

    let mut object = Map::with_capacity(row.len());
    for (key, field) in required.iter().chain(optional.iter()).zip(row.iter()) {
        if field.is_empty() && optional.contains(key) {
            continue;
        }
        object.insert((*key).to_string(), Value::String(field.to_string()));
    }
    Ok(Value::Object(object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read(kind: EntityKind, input: &str) -> Vec<Result<Value>> {
        read_records(input.as_bytes(), kind).collect()
    }

    #[test]
    fn test_patient_rows() {
        let rows = read(
            EntityKind::Patient,
            "usr1,Rick,Deckard,2000-01-01\nusr2, Ann ,Lee,1990-05-05,Q\n",
        );
        assert_eq!(
            rows[0].as_ref().unwrap(),
            &json!({"externalId": "usr1", "firstName": "Rick", "lastName": "Deckard", "dateOfBirth": "2000-01-01"})
        );
        assert_eq!(rows[1].as_ref().unwrap()["firstName"], "Ann");
        assert_eq!(rows[1].as_ref().unwrap()["middleName"], "Q");
    }

    #[test]
    fn test_empty_middle_name_is_omitted() {
        let rows = read(EntityKind::Patient, "usr1,Rick,Deckard,2000-01-01,\n");
        assert!(rows[0].as_ref().unwrap().get("middleName").is_none());
    }

    #[test]
    fn test_payment_rows() {
        let rows = read(EntityKind::Payment, "pay1,usr1,10.50\n");
        assert_eq!(
            rows[0].as_ref().unwrap(),
            &json!({"externalId": "pay1", "patientId": "usr1", "amount": "10.50"})
        );
    }

    #[test]
    fn test_wrong_column_count() {
        let rows = read(EntityKind::Payment, "pay1,usr1,10.50\npay2,usr1\n");
        assert!(rows[0].is_ok());
        match &rows[1] {
            Err(ReloadError::Ingestion(e)) => {
                assert_eq!(e.position, Some(1));
                assert_eq!(e.offending_record, Some(json!(["pay2", "usr1"])));
            }
            other => panic!("expected ingestion error, got {other:?}"),
        }
    }

    #[test]
    fn test_quoted_fields() {
        let rows = read(EntityKind::Patient, "usr1,\"Rick, Jr\",Deckard,2000-01-01\n");
        assert_eq!(rows[0].as_ref().unwrap()["firstName"], "Rick, Jr");
    }
}
