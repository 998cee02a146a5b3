//! Export Poller: submit a changed-contacts export job, wait for its file,
//! download it.
//!
//! The job is submitted exactly once. Status checks are spaced by
//! [`PollSettings::interval`]; a failed check counts as "not ready" and the
//! deadline is tested after every check.

use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::error::{PipelineError, RemoteError};

/// The changed-since range requested from the CRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportWindow {
    pub from: OffsetDateTime,
    pub to: OffsetDateTime,
}

impl ExportWindow {
    /// The `hours` leading up to `now`.
    pub fn ending_at(now: OffsetDateTime, hours: u32) -> Self {
        ExportWindow {
            from: now - time::Duration::hours(i64::from(hours)),
            to: now,
        }
    }
}

/// Handle for a submitted export job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportJob {
    pub id: String,
}

/// Poll spacing and the overall deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        PollSettings {
            interval: Duration::from_secs(20),
            timeout: Duration::from_secs(1000),
        }
    }
}

/// The CRM's asynchronous export API.
#[async_trait]
pub trait ExportSource: Send + Sync {
    /// Request an export of contacts changed within `window`.
    async fn submit_job(&self, window: &ExportWindow) -> Result<ExportJob, RemoteError>;

    /// `Some(locator)` once the file is ready, `None` while it is still being built.
    async fn check_job(&self, job: &ExportJob) -> Result<Option<String>, RemoteError>;

    /// Fetch the finished file as CSV text.
    async fn download(&self, locator: &str) -> Result<String, RemoteError>;
}

/// Wait until `job` reports a file, or fail with [`PipelineError::JobTimeout`].
pub async fn poll_until_ready(
    source: &dyn ExportSource,
    job: &ExportJob,
    settings: &PollSettings,
) -> Result<String, PipelineError> {
    let started = Instant::now();
    let mut attempts = 0u32;
    loop {
        tokio::time::sleep(settings.interval).await;
        attempts += 1;
        match source.check_job(job).await {
            Ok(Some(locator)) => {
                tracing::info!(job = %job.id, attempts, "export file ready");
                return Ok(locator);
            }
            Ok(None) => tracing::info!(
                job = %job.id,
                retry_in_secs = settings.interval.as_secs(),
                "export file not ready"
            ),
            Err(e) => tracing::warn!(
                job = %job.id,
                error = %e,
                "export status check failed; treating as not ready"
            ),
        }

        let waited = started.elapsed();
        if waited >= settings.timeout {
            tracing::error!(job = %job.id, attempts, waited_secs = waited.as_secs(), "gave up on export job");
            return Err(PipelineError::JobTimeout { waited, attempts });
        }
    }
}

/// Submit, poll, and download one export. Returns the raw CSV text.
pub async fn fetch_export(
    source: &dyn ExportSource,
    window: &ExportWindow,
    settings: &PollSettings,
) -> Result<String, PipelineError> {
    let job = source
        .submit_job(window)
        .await
        .map_err(PipelineError::Export)?;
    tracing::info!(job = %job.id, "export job submitted");

    let locator = poll_until_ready(source, &job, settings).await?;
    let text = source
        .download(&locator)
        .await
        .map_err(PipelineError::Export)?;
    tracing::debug!(bytes = text.len(), "export downloaded");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn window_spans_requested_hours() {
        let now = datetime!(2024-05-15 06:00 UTC);
        let window = ExportWindow::ending_at(now, 24);
        assert_eq!(window.from, datetime!(2024-05-14 06:00 UTC));
        assert_eq!(window.to, now);
    }

    #[test]
    fn default_poll_settings() {
        let settings = PollSettings::default();
        assert_eq!(settings.interval, Duration::from_secs(20));
        assert_eq!(settings.timeout, Duration::from_secs(1000));
    }
}
