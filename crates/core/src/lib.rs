//! cohort-core: the pure half of the cohort pipeline.
//!
//! Turns a CRM contact export into a reproducible, disjoint assignment of
//! contacts to trial groups, and diffs that assignment against what has
//! already been recorded. Nothing in this crate performs I/O; the export
//! text, the run date, and the set of previously assigned IDs are all
//! passed in by the caller.
//!
//! # Public API
//!
//! - [`normalize_export()`] -- parse and filter an export into [`Contact`]s
//! - [`allocate()`] -- seeded shuffle + balanced split into an [`AssignmentBatch`]
//! - [`new_assignments()`] -- drop batch entries whose IDs are already recorded
//! - [`PipelineVariant`] -- labels, eligibility and channel routing for one pipeline

pub mod allocate;
pub mod error;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod variant;

/// Name used when the export leaves a first or last name blank.
pub const DEFAULT_NAME: &str = "Friend";

/// Seed used when a variant does not configure one.
pub const DEFAULT_SEED: u64 = 10;

// ── Convenience re-exports ───────────────────────────────────────────

pub use allocate::{allocate, split_sizes};
pub use error::{AllocationError, NormalizeError, VariantError};
pub use model::{Assignment, AssignmentBatch, Contact, ContactId, GroupLabel};
pub use normalize::{normalize, normalize_export, parse_export, ExportRow};
pub use reconcile::new_assignments;
pub use variant::{Channel, ChannelKind, Eligibility, GroupSpec, GroupLabels, PipelineVariant};
