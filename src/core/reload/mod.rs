//! Reload transactions and orchestration
//!
//! - [`transaction`] - the transaction handle every reload operation runs on
//! - [`state`] - the per-entity reload state machine
//! - [`coordinator`] - runs the full operation sequence for one entity kind
//! - [`summary`] - reload outcome reporting

pub mod coordinator;
pub mod state;
pub mod summary;
pub mod transaction;

pub use coordinator::ReloadCoordinator;
pub use state::{ReloadOperation, ReloadState};
pub use summary::ReloadSummary;
pub use transaction::ReloadTransaction;
