//! In-memory storage backend
//!
//! A double-buffered stand-in for the relational engine: the same reload
//! semantics with an atomic pointer swap in place of table renames.

pub mod store;

pub use store::MemoryStore;
