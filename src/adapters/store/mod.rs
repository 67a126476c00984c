//! Storage abstraction layer
//!
//! This module provides a trait-based abstraction over the storage engines a
//! reload can run against (PostgreSQL, in-memory).

pub mod factory;
pub mod traits;

pub use factory::create_reload_store;
pub use traits::{ReloadStore, StoreTransaction};
