//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Configurable log levels
//! - Human-readable console output
//! - JSON-formatted local log files with rotation
//!
//! Every reload tags its events with a `reload_id` so the lines of one reload
//! can be pulled out of a busy log.
//!
//! # Example
//!
//! ```no_run
//! use shadowswap::logging::init_logging;
//! use shadowswap::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! // Use tracing macros for logging
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a reload
///
/// # Example
///
/// ```no_run
/// use shadowswap::log_reload_start;
/// use shadowswap::domain::EntityKind;
///
/// let reload_id = uuid::Uuid::new_v4();
/// log_reload_start!(reload_id, EntityKind::Patient, "memory");
/// ```
#[macro_export]
macro_rules! log_reload_start {
    ($reload_id:expr, $entity:expr, $backend:expr) => {
        tracing::info!(
            reload_id = %$reload_id,
            entity = %$entity,
            backend = $backend,
            "Starting reload"
        );
    };
}

/// Log the completion of a reload from its summary
#[macro_export]
macro_rules! log_reload_complete {
    ($summary:expr) => {
        $summary.log_summary();
    };
}

/// Log one staged chunk
///
/// # Example
///
/// ```no_run
/// use shadowswap::log_chunk_processing;
/// use shadowswap::domain::EntityKind;
///
/// let reload_id = uuid::Uuid::new_v4();
/// log_chunk_processing!(reload_id, EntityKind::Payment, 3, 1000, 998);
/// ```
#[macro_export]
macro_rules! log_chunk_processing {
    ($reload_id:expr, $entity:expr, $chunk:expr, $rows:expr, $written:expr) => {
        tracing::debug!(
            reload_id = %$reload_id,
            entity = %$entity,
            chunk = $chunk,
            rows = $rows,
            written = $written,
            "Chunk staged"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::EntityKind;
    use uuid::Uuid;

    #[test]
    fn test_macros_expand() {
        // No subscriber is installed; this only checks the macros expand
        let reload_id = Uuid::nil();
        crate::log_reload_start!(reload_id, EntityKind::Patient, "memory");
        crate::log_chunk_processing!(reload_id, EntityKind::Payment, 1u64, 10usize, 9u64);
    }
}
