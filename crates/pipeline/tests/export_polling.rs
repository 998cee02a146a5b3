//! Export Poller behaviour under a paused clock.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cohort_pipeline::{
    fetch_export, poll_until_ready, ExportJob, ExportSource, ExportWindow, PipelineError,
    PollSettings, RemoteError,
};
use time::macros::datetime;

/// Reports ready on check number `ready_on`; checks listed in `failing` error out.
struct ScriptedSource {
    ready_on: Option<u32>,
    failing: Vec<u32>,
    submit_fails: bool,
    submits: AtomicU32,
    checks: AtomicU32,
}

impl ScriptedSource {
    fn ready_on(n: u32) -> Self {
        ScriptedSource {
            ready_on: Some(n),
            failing: Vec::new(),
            submit_fails: false,
            submits: AtomicU32::new(0),
            checks: AtomicU32::new(0),
        }
    }

    fn never_ready() -> Self {
        ScriptedSource {
            ready_on: None,
            ..ScriptedSource::ready_on(0)
        }
    }
}

#[async_trait]
impl ExportSource for ScriptedSource {
    async fn submit_job(&self, _window: &ExportWindow) -> Result<ExportJob, RemoteError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if self.submit_fails {
            return Err(RemoteError::Rejected {
                status: 401,
                body: "bad credentials".to_string(),
            });
        }
        Ok(ExportJob {
            id: "1234".to_string(),
        })
    }

    async fn check_job(&self, job: &ExportJob) -> Result<Option<String>, RemoteError> {
        assert_eq!(job.id, "1234");
        let n = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing.contains(&n) {
            return Err(RemoteError::Transport("timed out".to_string()));
        }
        Ok(match self.ready_on {
            Some(ready) if n >= ready => Some("https://files.example/export.csv".to_string()),
            _ => None,
        })
    }

    async fn download(&self, locator: &str) -> Result<String, RemoteError> {
        assert_eq!(locator, "https://files.example/export.csv");
        Ok("VanID,DateCreated\n1,2024-05-14\n".to_string())
    }
}

fn settings(interval: u64, timeout: u64) -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(interval),
        timeout: Duration::from_secs(timeout),
    }
}

fn job() -> ExportJob {
    ExportJob {
        id: "1234".to_string(),
    }
}

fn window() -> ExportWindow {
    ExportWindow::ending_at(datetime!(2024-05-15 06:00 UTC), 24)
}

#[tokio::test(start_paused = true)]
async fn ready_after_third_check() {
    let source = ScriptedSource::ready_on(3);
    let started = tokio::time::Instant::now();

    let locator = poll_until_ready(&source, &job(), &settings(20, 1000))
        .await
        .unwrap();

    assert_eq!(locator, "https://files.example/export.csv");
    assert_eq!(source.checks.load(Ordering::SeqCst), 3);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61));
}

#[tokio::test(start_paused = true)]
async fn gives_up_once_deadline_reached() {
    let source = ScriptedSource::never_ready();

    let err = poll_until_ready(&source, &job(), &settings(20, 100))
        .await
        .unwrap_err();

    match err {
        PipelineError::JobTimeout { waited, attempts } => {
            assert_eq!(attempts, 5);
            assert!(waited >= Duration::from_secs(100));
            assert!(waited < Duration::from_secs(120));
        }
        other => panic!("expected JobTimeout, got {other:?}"),
    }
    assert_eq!(source.checks.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn failed_checks_count_as_not_ready() {
    let source = ScriptedSource {
        failing: vec![1, 2],
        ..ScriptedSource::ready_on(3)
    };

    let locator = poll_until_ready(&source, &job(), &settings(20, 1000)).await;
    assert!(locator.is_ok());
    assert_eq!(source.checks.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn file_ready_on_final_check_still_succeeds() {
    let source = ScriptedSource::ready_on(5);
    let locator = poll_until_ready(&source, &job(), &settings(20, 100)).await;
    assert!(locator.is_ok());
}

#[tokio::test(start_paused = true)]
async fn fetch_submits_once_and_downloads() {
    let source = ScriptedSource::ready_on(2);

    let text = fetch_export(&source, &window(), &settings(20, 1000))
        .await
        .unwrap();

    assert!(text.starts_with("VanID,DateCreated"));
    assert_eq!(source.submits.load(Ordering::SeqCst), 1);
    assert_eq!(source.checks.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn rejected_submission_is_not_polled() {
    let source = ScriptedSource {
        submit_fails: true,
        ..ScriptedSource::ready_on(1)
    };

    let err = fetch_export(&source, &window(), &settings(20, 1000))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Export(RemoteError::Rejected { status: 401, .. })
    ));
    assert_eq!(source.submits.load(Ordering::SeqCst), 1);
    assert_eq!(source.checks.load(Ordering::SeqCst), 0);
}
