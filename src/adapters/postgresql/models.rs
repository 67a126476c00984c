//! PostgreSQL row models
//!
//! Conversions between driver rows and domain rows, plus the column-major
//! layout used to stage a whole chunk with one `UNNEST` insert.

use crate::domain::{
    EntityId, EntityKind, EntityRow, ExternalId, PatientRecord, PatientStats, PaymentRecord,
    Record, ReloadError, Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;

/// Reads an entity row selected with [`super::sql::columns`]
pub fn entity_row_from_pg(kind: EntityKind, row: &Row) -> Result<EntityRow> {
    let record = match kind {
        EntityKind::Patient => Record::Patient(PatientRecord {
            external_id: external_id(row, "external_id")?,
            first_name: column(row, "first_name")?,
            last_name: column(row, "last_name")?,
            middle_name: column(row, "middle_name")?,
            date_of_birth: column(row, "date_of_birth")?,
        }),
        EntityKind::Payment => Record::Payment(PaymentRecord {
            external_id: external_id(row, "external_id")?,
            patient_id: external_id(row, "patient_id")?,
            amount: column(row, "amount")?,
        }),
    };

    Ok(EntityRow {
        id: EntityId::new(column(row, "id")?),
        created: column(row, "created")?,
        updated: column(row, "updated")?,
        record,
    })
}

pub fn stats_from_pg(row: &Row) -> Result<PatientStats> {
    Ok(PatientStats {
        patient_id: external_id(row, "patient_id")?,
        total_amount: column(row, "total_amount")?,
    })
}

pub fn external_id(row: &Row, name: &str) -> Result<ExternalId> {
    let text: String = column(row, name)?;
    ExternalId::new(text).map_err(|e| ReloadError::Database(format!("Column '{name}': {e}")))
}

fn column<'a, T>(row: &'a Row, name: &str) -> Result<T>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get(name)
        .map_err(|e| ReloadError::Database(format!("Failed to read column '{name}': {e}")))
}

/// A chunk of staged rows laid out one vector per column
#[derive(Debug, Default)]
pub struct StagedColumns {
    ids: Vec<i64>,
    created: Vec<DateTime<Utc>>,
    updated: Vec<Option<DateTime<Utc>>>,
    external_ids: Vec<String>,
    detail: DetailColumns,
}

#[derive(Debug)]
enum DetailColumns {
    Patients {
        first_names: Vec<String>,
        last_names: Vec<String>,
        middle_names: Vec<Option<String>>,
        dates_of_birth: Vec<NaiveDate>,
    },
    Payments {
        patient_ids: Vec<String>,
        amounts: Vec<Decimal>,
    },
}

impl Default for DetailColumns {
    fn default() -> Self {
        DetailColumns::Patients {
            first_names: Vec::new(),
            last_names: Vec::new(),
            middle_names: Vec::new(),
            dates_of_birth: Vec::new(),
        }
    }
}

impl StagedColumns {
    /// Transposes rows of one kind into column vectors
    ///
    /// # Errors
    ///
    /// Returns `ReloadError::Other` if a row of another kind is mixed in.
    pub fn from_rows(kind: EntityKind, rows: &[EntityRow]) -> Result<Self> {
        let mut columns = StagedColumns {
            detail: match kind {
                EntityKind::Patient => DetailColumns::default(),
                EntityKind::Payment => DetailColumns::Payments {
                    patient_ids: Vec::with_capacity(rows.len()),
                    amounts: Vec::with_capacity(rows.len()),
                },
            },
            ..Default::default()
        };

        for row in rows {
            match (&mut columns.detail, &row.record) {
                (
                    DetailColumns::Patients {
                        first_names,
                        last_names,
                        middle_names,
                        dates_of_birth,
                    },
                    Record::Patient(p),
                ) => {
                    first_names.push(p.first_name.clone());
                    last_names.push(p.last_name.clone());
                    middle_names.push(p.middle_name.clone());
                    dates_of_birth.push(p.date_of_birth);
                }
                (
                    DetailColumns::Payments {
                        patient_ids,
                        amounts,
                    },
                    Record::Payment(p),
                ) => {
                    patient_ids.push(p.patient_id.to_string());
                    amounts.push(p.amount);
                }
                _ => return Err(mixed_kind(kind)),
            }
            columns.ids.push(row.id.get());
            columns.created.push(row.created);
            columns.updated.push(row.updated);
            columns.external_ids.push(row.external_id().to_string());
        }

        Ok(columns)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Statement parameters in [`super::sql::insert_staged`] order
    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        let mut params: Vec<&(dyn ToSql + Sync)> =
            vec![&self.ids, &self.created, &self.updated, &self.external_ids];
        match &self.detail {
            DetailColumns::Patients {
                first_names,
                last_names,
                middle_names,
                dates_of_birth,
            } => {
                params.push(first_names);
                params.push(last_names);
                params.push(middle_names);
                params.push(dates_of_birth);
            }
            DetailColumns::Payments {
                patient_ids,
                amounts,
            } => {
                params.push(patient_ids);
                params.push(amounts);
            }
        }
        params
    }
}

fn mixed_kind(kind: EntityKind) -> ReloadError {
    ReloadError::Other(format!("cannot stage a non-{kind} row into {}", kind.table().staging_name()))
}
