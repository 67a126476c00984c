//! Domain error types
//!
//! This module defines the error hierarchy for shadowswap.
//! All errors are domain-specific and don't expose third-party types.
//!
//! Integrity problems in the incoming feed (duplicate external ids, payments
//! whose owning patient does not exist) are not errors at all: the merge
//! policy drops those rows and counts them. Everything in this module aborts
//! the reload it occurs in.

use thiserror::Error;

/// Main shadowswap error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum ReloadError {
    /// Staging table creation failed (e.g. the live table does not exist)
    #[error("Schema error: {0}")]
    Schema(String),

    /// A record in the feed is missing a required field or is malformed
    #[error("Ingestion error: {0}")]
    Ingestion(#[from] IngestionError),

    /// The swap could not find the expected intermediate table state
    #[error("Swap conflict: {0}")]
    SwapConflict(String),

    /// A reload operation was called out of order
    #[error("Invalid reload sequence: cannot {operation} {entity} while {state}")]
    InvalidTransition {
        operation: String,
        entity: String,
        state: String,
    },

    /// The reload was cancelled before the swap began
    #[error("Reload cancelled: {0}")]
    Cancelled(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl ReloadError {
    /// Whether the error rejects the reload as a whole while leaving the
    /// live dataset untouched.
    ///
    /// A surrounding HTTP service maps these to `422 Unprocessable Entity`;
    /// everything else is an infrastructure failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ReloadError::Schema(_)
                | ReloadError::Ingestion(_)
                | ReloadError::SwapConflict(_)
                | ReloadError::InvalidTransition { .. }
                | ReloadError::Cancelled(_)
        )
    }
}

/// A record that could not be ingested
///
/// Carries the offending record (when one could be decoded at all) and its
/// zero-based position in the feed so operators can find it.
#[derive(Debug, Clone, Error)]
#[error("{reason}{}", position.map(|p| format!(" (record #{p})")).unwrap_or_default())]
pub struct IngestionError {
    /// What was wrong with the record
    pub reason: String,

    /// The record as received, if it could be decoded
    pub offending_record: Option<serde_json::Value>,

    /// Zero-based position of the record in the feed
    pub position: Option<u64>,
}

impl IngestionError {
    /// Creates a new ingestion error
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            offending_record: None,
            position: None,
        }
    }

    /// Attaches the offending record
    pub fn with_record(mut self, record: serde_json::Value) -> Self {
        self.offending_record = Some(record);
        self
    }

    /// Attaches the record position
    pub fn at_position(mut self, position: u64) -> Self {
        self.position = Some(position);
        self
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for ReloadError {
    fn from(err: std::io::Error) -> Self {
        ReloadError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ReloadError {
    fn from(err: serde_json::Error) -> Self {
        ReloadError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ReloadError {
    fn from(err: toml::de::Error) -> Self {
        ReloadError::Configuration(format!("TOML parse error: {err}"))
    }
}

// A CSV feed that cannot be read is a bad feed, not an infrastructure failure
impl From<csv::Error> for ReloadError {
    fn from(err: csv::Error) -> Self {
        let position = err.position().map(|p| p.record());
        let mut ingestion = IngestionError::new(format!("Malformed CSV: {err}"));
        ingestion.position = position;
        ReloadError::Ingestion(ingestion)
    }
}
