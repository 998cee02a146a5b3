//! HTTP implementations of the pipeline's collaborator traits.
//!
//! All three use `ureq` (sync) wrapped in `tokio::task::spawn_blocking` so a
//! slow remote never stalls the async runtime. Agents are built with
//! `http_status_as_error(false)` so rejected requests keep their response
//! body for the failure report.

pub mod everyaction;
pub mod sendgrid;
pub mod strive;

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ureq::http::Response;
use ureq::{Agent, Body};

use crate::error::RemoteError;

pub use everyaction::EveryActionClient;
pub use sendgrid::SendGridMailer;
pub use strive::StriveEnroller;

/// Longest rejected-response body kept in a failure message.
const MAX_ERROR_BODY: usize = 512;

pub(crate) fn agent() -> Agent {
    Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(120)))
        .build()
        .into()
}

/// Run blocking HTTP work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, RemoteError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, RemoteError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RemoteError::Transport(format!("task join error: {}", e)))?
}

pub(crate) fn transport(e: ureq::Error) -> RemoteError {
    match e {
        ureq::Error::StatusCode(status) => RemoteError::Rejected {
            status,
            body: String::new(),
        },
        other => RemoteError::Transport(other.to_string()),
    }
}

pub(crate) fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Pass `response` through if `accept` likes its status, otherwise turn it
/// into [`RemoteError::Rejected`] carrying the (truncated) body.
pub(crate) fn check_status(
    mut response: Response<Body>,
    accept: fn(u16) -> bool,
) -> Result<Response<Body>, RemoteError> {
    let status = response.status().as_u16();
    if accept(status) {
        return Ok(response);
    }
    let mut body = response.body_mut().read_to_string().unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(RemoteError::Rejected { status, body })
}

pub(crate) fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

pub(crate) fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_encodes_user_and_password() {
        // "app:key|1"
        assert_eq!(basic_auth("app", "key|1"), "Basic YXBwOmtleXwx");
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("https://x.org/v4/", "/people/1"), "https://x.org/v4/people/1");
        assert_eq!(join_url("https://x.org/v4", "people"), "https://x.org/v4/people");
    }

    #[test]
    fn status_code_errors_become_rejections() {
        assert_eq!(
            transport(ureq::Error::StatusCode(503)),
            RemoteError::Rejected {
                status: 503,
                body: String::new()
            }
        );
    }

    #[test]
    fn success_range() {
        assert!(is_success(200));
        assert!(is_success(204));
        assert!(!is_success(301));
        assert!(!is_success(404));
    }
}
