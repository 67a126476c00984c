//! SQL statement builders
//!
//! Table names come from [`Table`], never from input, so they are formatted
//! straight into the statement text. Values always travel as parameters.

use crate::domain::{EntityKind, Table};

const PATIENT_COLUMNS: &str =
    "id, created, updated, external_id, first_name, last_name, middle_name, date_of_birth";
const PAYMENT_COLUMNS: &str = "id, created, updated, external_id, patient_id, amount";

/// Columns of an entity table in the order [`super::models`] reads them
pub fn columns(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Patient => PATIENT_COLUMNS,
        EntityKind::Payment => PAYMENT_COLUMNS,
    }
}

pub fn set_statement_timeout(seconds: u64) -> String {
    format!("SET LOCAL statement_timeout = {}", seconds * 1000)
}

pub fn drop_staging(table: Table) -> String {
    format!("DROP TABLE IF EXISTS {}", table.staging_name())
}

pub fn create_staging(table: Table) -> String {
    format!(
        "CREATE TABLE {} (LIKE {} INCLUDING ALL)",
        table.staging_name(),
        table.live_name()
    )
}

/// `$1`: relation name. Yields one boolean.
pub fn relation_exists() -> &'static str {
    "SELECT to_regclass($1::text) IS NOT NULL"
}

/// `$1`: `text[]` of external ids
pub fn lookup_live(kind: EntityKind) -> String {
    format!(
        "SELECT {} FROM {} WHERE external_id = ANY($1)",
        columns(kind),
        kind.table().live_name()
    )
}

/// `$1`: `text[]` of external ids
pub fn lookup_staged(kind: EntityKind) -> String {
    format!(
        "SELECT external_id FROM {} WHERE external_id = ANY($1)",
        kind.table().staging_name()
    )
}

/// `$1`: `text[]` of patient external ids
pub fn live_patient_ids() -> String {
    format!(
        "SELECT DISTINCT external_id FROM {} WHERE external_id = ANY($1)",
        Table::Patients.live_name()
    )
}

/// `$1`: number of ids to draw, as `bigint`
pub fn allocate_ids(kind: EntityKind) -> String {
    format!(
        "SELECT nextval(pg_get_serial_sequence('{}', 'id')) FROM generate_series(1, $1::bigint)",
        kind.table().live_name()
    )
}

/// One array parameter per column, in [`columns`] order
pub fn insert_staged(kind: EntityKind) -> String {
    let arrays = match kind {
        EntityKind::Patient => {
            "$1::bigint[], $2::timestamptz[], $3::timestamptz[], $4::text[], \
             $5::text[], $6::text[], $7::text[], $8::date[]"
        }
        EntityKind::Payment => {
            "$1::bigint[], $2::timestamptz[], $3::timestamptz[], $4::text[], \
             $5::text[], $6::numeric[]"
        }
    };
    format!(
        "INSERT INTO {} ({}) SELECT * FROM UNNEST({}) ON CONFLICT (external_id) DO NOTHING",
        kind.table().staging_name(),
        columns(kind),
        arrays
    )
}

pub fn aggregate_payment_totals() -> String {
    format!(
        "INSERT INTO {} (patient_id, total_amount) \
         SELECT patient_id, SUM(amount) FROM {} GROUP BY patient_id",
        Table::PatientStats.staging_name(),
        Table::Payments.staging_name()
    )
}

pub fn analyze_staging(table: Table) -> String {
    format!("ANALYZE {}", table.staging_name())
}

/// Detach the serving child, put the staging table in its place, drop the
/// retired child
pub fn swap(table: Table) -> Vec<String> {
    let live = table.live_name();
    let serving = table.serving_name();
    let retired = table.retired_name();
    let staging = table.staging_name();
    vec![
        format!("ALTER TABLE IF EXISTS {serving} NO INHERIT {live}"),
        format!("ALTER TABLE IF EXISTS {serving} RENAME TO {retired}"),
        format!("ALTER TABLE {staging} RENAME TO {serving}"),
        format!("ALTER TABLE {serving} INHERIT {live}"),
        format!("DROP TABLE IF EXISTS {retired}"),
    ]
}

/// Patients page. With the stats join, `$1`/`$2` are the inclusive
/// `numeric` bounds (NULL for open) and `$3`/`$4` limit and offset;
/// without it, `$1`/`$2` are limit and offset.
pub fn select_patients_page(join_stats: bool) -> String {
    let prefixed: Vec<String> = PATIENT_COLUMNS
        .split(", ")
        .map(|column| format!("p.{column}"))
        .collect();
    let (source, paging) = if join_stats {
        (patients_with_totals(), "LIMIT $3 OFFSET $4")
    } else {
        (format!("{} p", Table::Patients.live_name()), "LIMIT $1 OFFSET $2")
    };
    format!(
        "SELECT {} FROM {} ORDER BY p.id {}",
        prefixed.join(", "),
        source,
        paging
    )
}

/// Count behind [`select_patients_page`], binding only the bounds
pub fn count_patients(join_stats: bool) -> String {
    if join_stats {
        format!("SELECT count(*) FROM {}", patients_with_totals())
    } else {
        count_live(Table::Patients)
    }
}

fn patients_with_totals() -> String {
    format!(
        "{} p JOIN {} s ON s.patient_id = p.external_id \
         WHERE ($1::numeric IS NULL OR s.total_amount >= $1) \
         AND ($2::numeric IS NULL OR s.total_amount <= $2)",
        Table::Patients.live_name(),
        Table::PatientStats.live_name()
    )
}

const PAYMENT_FILTER: &str =
    "WHERE ($1::text IS NULL OR external_id = $1) AND ($2::text IS NULL OR patient_id = $2)";

/// Payments page. `$1` external id, `$2` patient id (NULL matches any),
/// `$3`/`$4` limit and offset.
pub fn select_payments_page() -> String {
    format!(
        "SELECT {} FROM {} {} ORDER BY id LIMIT $3 OFFSET $4",
        PAYMENT_COLUMNS,
        Table::Payments.live_name(),
        PAYMENT_FILTER
    )
}

pub fn count_payments() -> String {
    format!(
        "SELECT count(*) FROM {} {}",
        Table::Payments.live_name(),
        PAYMENT_FILTER
    )
}

/// `$1`/`$2`: limit and offset
pub fn select_stats_page() -> String {
    format!(
        "SELECT patient_id, total_amount FROM {} ORDER BY patient_id LIMIT $1 OFFSET $2",
        Table::PatientStats.live_name()
    )
}

pub fn count_live(table: Table) -> String {
    format!("SELECT count(*) FROM {}", table.live_name())
}
