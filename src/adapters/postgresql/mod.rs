//! PostgreSQL storage backend
//!
//! This module provides the PostgreSQL implementation of the reload storage
//! traits, swapping tables through inheritance.

pub mod adapter;
pub mod client;
pub mod models;
pub mod sql;

pub use adapter::PostgreSQLStore;
pub use client::PostgreSQLClient;
