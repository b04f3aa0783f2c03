//! vidcat-core: shared types, IDs, errors, records, stores, and configuration.
//!
//! This crate is the foundational dependency for the other vidcat crates,
//! providing the unified error type, record identifiers, the catalog record
//! model, the record-store seam, application configuration, and the clock
//! used for segment timing.

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod record;
pub mod store;

// Re-export the most commonly used items at the crate root.
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use ids::RecordId;
pub use record::{attributes, AttributeValue, Record};
pub use store::{JsonDirRecordStore, MemoryRecordStore, RecordStore};
