//! Storage integrations for shadowswap.
//!
//! This module provides the storage engines a reload can run against:
//!
//! - [`store`] - Storage abstraction layer (trait-based) and backend factory
//! - [`postgresql`] - PostgreSQL implementation swapping tables through inheritance
//! - [`memory`] - In-process implementation swapping snapshot pointers
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies.
//! The core reload engine only speaks to [`store::ReloadStore`] and
//! [`store::StoreTransaction`], so every pipeline test runs unchanged against
//! the memory backend.
//!
//! ```rust,no_run
//! use shadowswap::adapters::store::{create_reload_store, ReloadStore};
//! use shadowswap::config::load_config;
//! use shadowswap::domain::Table;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("shadowswap.toml")?;
//! let store = create_reload_store(&config).await?;
//! store.test_connection().await?;
//!
//! println!("{} live patients", store.live_count(Table::Patients).await?);
//! # Ok(())
//! # }
//! ```

pub mod memory;
pub mod postgresql;
pub mod store;
