//! Core reload engine for shadowswap.
//!
//! This module contains the reload pipeline and the operations callers issue
//! against an open reload transaction.
//!
//! # Modules
//!
//! - [`merge`] - Per-row upsert policy (identity, change detection, drops)
//! - [`staging`] - Shadow table manager
//! - [`loader`] - Chunked bulk loader applying the merge policy
//! - [`stats`] - Per-patient payment aggregation
//! - [`swap`] - Atomic promotion of staging tables
//! - [`reload`] - Transaction handle, state machine and coordinator
//! - [`source`] - Record sources (JSON, NDJSON, CSV) and seed data
//!
//! # Reload Workflow
//!
//! Every reload of one entity kind runs in one transaction:
//!
//! 1. **Create staging**: an empty table shaped like the live one
//! 2. **Bulk load**: stream records through the merge policy into staging
//! 3. **Recompute stats** (payments only): per-patient totals
//! 4. **Swap**: promote staging into the live position
//! 5. **Commit**: readers switch to the new data in one step
//!
//! # Example
//!
//! ```rust,no_run
//! use shadowswap::adapters::memory::MemoryStore;
//! use shadowswap::core::reload::ReloadTransaction;
//! use shadowswap::core::{bulk_load, create_staging, swap};
//! use shadowswap::domain::{EntityKind, Table};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryStore::new();
//! let mut tx = ReloadTransaction::begin(&store).await?;
//!
//! create_staging(&mut tx, Table::Patients, true).await?;
//! let records = vec![Ok(serde_json::json!({
//!     "externalId": "usr1",
//!     "firstName": "Rick",
//!     "lastName": "Deckard",
//!     "dateOfBirth": "2000-01-01"
//! }))];
//! let report = bulk_load(&mut tx, EntityKind::Patient, records).await?;
//! swap(&mut tx, EntityKind::Patient).await?;
//! tx.commit().await?;
//!
//! println!("Staged: {}", report.staged);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod merge;
pub mod reload;
pub mod source;
pub mod staging;
pub mod stats;
pub mod swap;

pub use loader::{bulk_load, BulkLoader, LoadReport};
pub use staging::{create_staging, discard_staging};
pub use stats::recompute_stats;
pub use swap::swap;
