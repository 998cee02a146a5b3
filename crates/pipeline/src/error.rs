use std::time::Duration;

use cohort_core::{AllocationError, NormalizeError, VariantError};
use cohort_storage::StorageError;

/// Failure talking to one of the external systems: the CRM export API, the
/// texting vendor, the mail service, or the CRM record API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The remote answered with a status that does not mean success.
    #[error("remote rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The request never produced a response (DNS, TLS, socket, join error).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response arrived but its body was not what the protocol promises.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// A required collaborator or credential was not supplied for this run.
    #[error("{0} is not configured")]
    NotConfigured(String),
}

/// Everything that can stop a run before dispatch.
///
/// Dispatch failures are not here: they are collected per contact in a
/// [`crate::DispatchReport`] and never abort the run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid variant: {0}")]
    Variant(#[from] VariantError),

    #[error("configuration error: {0}")]
    Config(String),

    /// Submitting the export job or downloading its file failed.
    #[error("export failed: {0}")]
    Export(RemoteError),

    /// The export job never reported a file within the polling deadline.
    #[error("export job not ready after {}s ({attempts} status checks)", .waited.as_secs())]
    JobTimeout { waited: Duration, attempts: u32 },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Existing assignments could not be read; nothing was written.
    #[error("could not read existing assignments: {0}")]
    ReconciliationReadFailure(StorageError),

    /// New assignments could not be written; nothing was dispatched.
    #[error("could not record new assignments: {0}")]
    PersistFailure(StorageError),
}

impl PipelineError {
    /// True when the run simply had nothing to process today.
    pub fn is_no_data(&self) -> bool {
        matches!(self, PipelineError::Normalize(e) if e.is_no_data())
    }
}
