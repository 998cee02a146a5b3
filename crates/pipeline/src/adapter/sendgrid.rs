//! SendGrid mail API: one message per digest, roster attached as CSV.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use ureq::Agent;

use super::{agent, bearer, blocking, check_status, is_success, transport};
use crate::dispatch::{DigestMailer, DigestMessage};
use crate::error::RemoteError;

pub const DEFAULT_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Clone)]
pub struct SendGridMailer {
    agent: Agent,
    endpoint: String,
    authorization: String,
    from: String,
    html_body: String,
}

impl SendGridMailer {
    pub fn new(api_key: &str, from: &str, html_body: &str) -> Self {
        SendGridMailer {
            agent: agent(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            authorization: bearer(api_key),
            from: from.to_string(),
            html_body: html_body.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

/// Body for `POST /v3/mail/send`.
pub fn mail_payload(message: &DigestMessage, from: &str, html_body: &str) -> Value {
    let to: Vec<Value> = message
        .recipients
        .iter()
        .map(|email| json!({ "email": email }))
        .collect();
    json!({
        "personalizations": [{ "to": to }],
        "from": { "email": from },
        "subject": message.subject,
        "content": [{ "type": "text/html", "value": html_body }],
        "attachments": [{
            "content": STANDARD.encode(message.csv.as_bytes()),
            "filename": message.file_name,
            "type": "text/csv",
            "disposition": "attachment",
        }],
    })
}

#[async_trait]
impl DigestMailer for SendGridMailer {
    async fn send_digest(&self, message: &DigestMessage) -> Result<(), RemoteError> {
        if message.recipients.is_empty() {
            return Err(RemoteError::NotConfigured("digest recipients".to_string()));
        }
        let agent = self.agent.clone();
        let url = self.endpoint.clone();
        let auth = self.authorization.clone();
        let body = mail_payload(message, &self.from, &self.html_body);

        blocking(move || {
            let response = agent
                .post(&url)
                .header("Authorization", &auth)
                .send_json(&body)
                .map_err(transport)?;
            check_status(response, is_success)?;
            Ok(())
        })
        .await
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
