//! Domain registry
//!
//! Owns the tracked domain records. Pure in-memory structure with dedup and
//! merge semantics; persistence is delegated to a [`crate::storage::Storage`].

mod records;
mod types;

pub use records::Registry;
pub use types::{CertStatus, DomainRecord, RecordUpdate};
