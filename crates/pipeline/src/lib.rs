//! cohort-pipeline: the side-effecting half of the cohort pipeline.
//!
//! Control flow for one run:
//!
//! ```text
//! export poller → normalizer → allocator → reconciler → (persist) → dispatcher
//! ```
//!
//! Every external system is reached through a trait ([`ExportSource`],
//! [`CrmRecords`], [`VendorEnroller`], [`DigestMailer`],
//! [`cohort_storage::AssignmentStore`]) so the pipeline can be driven by
//! fakes in tests. Blocking HTTP implementations live in [`adapter`] behind
//! the `adapter` feature.

#[cfg(feature = "adapter")]
pub mod adapter;
pub mod crm;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod reconcile;

pub use crm::{exclude_coded, CrmCode, CrmRecords};
pub use dispatch::{
    render_digest_csv, DigestMailer, DigestMessage, DispatchFailure, DispatchReport, Dispatcher,
    GroupOutcome, VendorEnroller,
};
pub use error::{PipelineError, RemoteError};
pub use export::{fetch_export, poll_until_ready, ExportJob, ExportSource, ExportWindow, PollSettings};
pub use pipeline::{Collaborators, ExportInput, Pipeline, RunRequest, RunSettings, RunSummary};
pub use reconcile::{reconcile, Reconciliation};
