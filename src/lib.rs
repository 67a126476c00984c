// Shadowswap - zero-downtime batch reloads through shadow tables
// Copyright (c) 2025 Shadowswap Contributors
// Licensed under the MIT License

//! # Shadowswap - zero-downtime patient and payment reloads
//!
//! Shadowswap replaces the patient and payment datasets of a relational store
//! with a new batch from an upstream feed while readers keep querying the
//! current data. Every reload builds a shadow copy of the table, merges the
//! feed into it and swaps it into place in one transaction.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Staging** a structurally identical shadow table per reload
//! - **Merging** feed records on their external id, preserving surrogate ids
//!   and creation times and touching `updated` only on real changes
//! - **Filtering** in-batch duplicates and payments for unknown patients
//! - **Aggregating** per-patient payment totals
//! - **Swapping** the shadow table into the live position atomically
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Reload engine (merge policy, loader, stats, swap, sources)
//! - [`adapters`] - Storage backends (PostgreSQL, in-memory)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shadowswap::config::ShadowswapConfig;
//! use shadowswap::core::reload::ReloadCoordinator;
//! use shadowswap::core::source::open_records;
//! use shadowswap::domain::EntityKind;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ShadowswapConfig::from_file("shadowswap.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let coordinator = ReloadCoordinator::from_config(&config, shutdown_rx).await?;
//!     let records = open_records("patients.json", EntityKind::Patient, None)?;
//!     let summary = coordinator.reload(EntityKind::Patient, records).await?;
//!
//!     println!("Staged {} patients", summary.report.staged);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`domain::ReloadError`]. A reload either
//! succeeds with the live data fully replaced or fails with the live data
//! untouched; [`domain::ReloadError::is_rejection`] tells a bad feed apart
//! from an infrastructure failure.
//!
//! ## Logging
//!
//! Shadowswap uses structured logging with the `tracing` crate. Every event
//! of a reload carries its `reload_id`.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
