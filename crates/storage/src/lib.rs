//! Durable record of which trial group each contact was assigned to.
//!
//! The store is append-only: rows are never updated or deleted, and a
//! contact ID appears in it at most once. The reconciler is the primary
//! guard against duplicates; every bundled store also rejects them as a
//! backstop.

pub mod conformance;
mod error;
mod jsonl;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use jsonl::JsonLinesStore;
pub use memory::MemoryStore;
pub use record::AssignmentRecord;
pub use traits::AssignmentStore;
