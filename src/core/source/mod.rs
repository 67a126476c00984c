//! Record sources
//!
//! A record source is any iterator of `Result<serde_json::Value>`: one raw
//! feed object per item, in feed order. This module opens files in the feed
//! formats the import tooling accepts and generates synthetic seed feeds.
//!
//! - [`json`] - a JSON array document, or a stream of JSON values (NDJSON)
//! - [`delimited`] - headerless CSV with a fixed column order per entity kind
//! - [`seed`] - synthetic patient and payment feeds

pub mod delimited;
pub mod json;
pub mod seed;

use crate::domain::{EntityKind, ReloadError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;
use tokio::sync::mpsc;

/// Boxed record source, as produced by [`open_records`]
pub type RecordIter = Box<dyn Iterator<Item = Result<Value>> + Send>;

/// Feed file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// One JSON array of objects, read one element at a time
    Json,
    /// Whitespace-separated JSON objects, read one at a time
    Ndjson,
    /// Headerless CSV
    Csv,
}

impl RecordFormat {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "json" => Some(RecordFormat::Json),
            "ndjson" | "jsonl" => Some(RecordFormat::Ndjson),
            "csv" => Some(RecordFormat::Csv),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordFormat::Json => "json",
            RecordFormat::Ndjson => "ndjson",
            RecordFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(RecordFormat::Json),
            "ndjson" | "jsonl" => Ok(RecordFormat::Ndjson),
            "csv" => Ok(RecordFormat::Csv),
            other => Err(format!(
                "Invalid record format '{other}'. Must be 'json', 'ndjson' or 'csv'"
            )),
        }
    }
}

/// Open a feed file of `kind` records
///
/// Without an explicit `format`, the file extension decides.
///
/// # Errors
///
/// Returns `ReloadError::Io` if the file cannot be opened and
/// `ReloadError::Configuration` if the format cannot be inferred. Malformed
/// content surfaces lazily, as an error item at the position it occurs.
pub fn open_records(
    path: impl AsRef<Path>,
    kind: EntityKind,
    format: Option<RecordFormat>,
) -> Result<RecordIter> {
    let path = path.as_ref();
    let format = match format.or_else(|| RecordFormat::from_path(path)) {
        Some(format) => format,
        None => {
            return Err(ReloadError::Configuration(format!(
                "Cannot infer the record format of {}; pass --format",
                path.display()
            )))
        }
    };

    let file = File::open(path).map_err(|e| {
        ReloadError::Io(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let reader = BufReader::new(file);

    tracing::debug!(path = %path.display(), format = %format, entity = %kind, "Opening record source");

    Ok(match format {
        RecordFormat::Json => Box::new(json::stream_array(reader)),
        RecordFormat::Ndjson => Box::new(json::stream_values(reader)),
        RecordFormat::Csv => Box::new(delimited::read_records(reader, kind)),
    })
}

/// Drain `records` on the blocking thread pool into a bounded channel
///
/// Reading stops after the first error item, or once the receiver is
/// dropped. `capacity` bounds how far the reader runs ahead.
///
/// # Panics
///
/// Panics when called outside a Tokio runtime.
pub fn read_in_background(records: RecordIter, capacity: usize) -> mpsc::Receiver<Result<Value>> {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    tokio::task::spawn_blocking(move || {
        for item in records {
            let failed = item.is_err();
            if sender.blocking_send(item).is_err() {
                tracing::debug!("Record consumer went away; stopping the reader");
                return;
            }
            if failed {
                return;
            }
        }
    });
    receiver
}
