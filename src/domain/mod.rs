//! Domain models and types for shadowswap.
//!
//! This module contains the entity model every other layer speaks: typed
//! identifiers, parsed feed records, stored rows, and the error taxonomy.
//!
//! # Type Safety
//!
//! External ids and surrogate ids are distinct newtypes so the merge policy
//! cannot confuse the key it matches on with the key it preserves:
//!
//! ```rust
//! use shadowswap::domain::{EntityId, ExternalId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let external = ExternalId::new("usr1")?;
//! let surrogate = EntityId::new(1);
//!
//! // This won't compile - the types don't mix
//! // let wrong: ExternalId = surrogate;
//! # let _ = (external, surrogate);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, ReloadError>`]:
//!
//! ```rust
//! use shadowswap::domain::Result;
//!
//! fn example() -> Result<()> {
//!     let config = shadowswap::config::ShadowswapConfig::from_file("shadowswap.toml")?;
//!     # let _ = config;
//!     Ok(())
//! }
//! ```

pub mod entity;
pub mod errors;
pub mod ids;
pub mod query;
pub mod result;

// Re-export commonly used types for convenience
pub use entity::{EntityRow, PatientRecord, PatientStats, PaymentRecord, Record};
pub use errors::{IngestionError, ReloadError};
pub use ids::{EntityId, EntityKind, ExternalId, Table};
pub use query::{Page, PageOf, PatientFilter, PaymentFilter, PER_PAGE};
pub use result::Result;
