//! EveryAction (VAN) client: changed-entity exports and per-person codes.
//!
//! Auth is HTTP Basic with the application name as user and
//! `"{api_key}|{db_mode}"` as password.

use async_trait::async_trait;
use cohort_core::ContactId;
use serde_json::{json, Value};
use time::{OffsetDateTime, UtcOffset};
use ureq::Agent;

use super::{agent, basic_auth, blocking, check_status, is_success, join_url, transport};
use crate::crm::{CrmCode, CrmRecords};
use crate::error::RemoteError;
use crate::export::{ExportJob, ExportSource, ExportWindow};

pub const DEFAULT_BASE_URL: &str = "https://api.securevan.com/v4";

/// Fields requested when the caller does not override them.
pub const DEFAULT_REQUESTED_FIELDS: [&str; 6] = [
    "VanID",
    "FirstName",
    "LastName",
    "Phone",
    "PhoneOptInStatus",
    "DateCreated",
];

/// Export files can be large; the default ureq body limit is too small.
const MAX_EXPORT_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Clone)]
pub struct EveryActionClient {
    agent: Agent,
    base_url: String,
    authorization: String,
    requested_fields: Vec<String>,
}

impl EveryActionClient {
    pub fn new(base_url: &str, application_name: &str, api_key: &str, db_mode: u8) -> Self {
        EveryActionClient {
            agent: agent(),
            base_url: base_url.to_string(),
            authorization: basic_auth(application_name, &format!("{}|{}", api_key, db_mode)),
            requested_fields: DEFAULT_REQUESTED_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }

    pub fn with_requested_fields(mut self, fields: Vec<String>) -> Self {
        self.requested_fields = fields;
        self
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }
}

/// `YYYY-MM-DDTHH:MM:SSZ` in UTC.
pub fn format_export_timestamp(at: OffsetDateTime) -> String {
    let at = at.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// Body for `POST /changedEntityExportJobs`.
pub fn export_request_body(window: &ExportWindow, requested_fields: &[String]) -> Value {
    json!({
        "dateChangedFrom": format_export_timestamp(window.from),
        "dateChangedTo": format_export_timestamp(window.to),
        "resourceType": "Contacts",
        "requestedFields": requested_fields,
        "excludeChangesFromSelf": "true",
    })
}

/// `exportJobId` from a submission response. The API sends it as a number.
pub fn job_id_from_response(body: &Value) -> Option<String> {
    match body.get("exportJobId")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// `files[0].downloadUrl` from a status response, once the job has produced a file.
pub fn download_url_from_status(body: &Value) -> Option<String> {
    body.get("files")?
        .get(0)?
        .get("downloadUrl")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Codes from a `GET /people/{id}/codes` page.
pub fn codes_from_response(body: &Value) -> Result<Vec<CrmCode>, RemoteError> {
    let items = body
        .get("items")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    serde_json::from_value(items).map_err(|e| RemoteError::Decode(format!("codes list: {}", e)))
}

#[async_trait]
impl ExportSource for EveryActionClient {
    async fn submit_job(&self, window: &ExportWindow) -> Result<ExportJob, RemoteError> {
        let agent = self.agent.clone();
        let url = self.url("changedEntityExportJobs");
        let auth = self.authorization.clone();
        let body = export_request_body(window, &self.requested_fields);

        blocking(move || {
            let response = agent
                .post(&url)
                .header("Authorization", &auth)
                .send_json(&body)
                .map_err(transport)?;
            let value: Value = check_status(response, is_success)?
                .into_body()
                .read_json()
                .map_err(|e| RemoteError::Decode(format!("export job response: {}", e)))?;
            let id = job_id_from_response(&value)
                .ok_or_else(|| RemoteError::Decode("export job response has no exportJobId".to_string()))?;
            Ok(ExportJob { id })
        })
        .await
    }

    async fn check_job(&self, job: &ExportJob) -> Result<Option<String>, RemoteError> {
        let agent = self.agent.clone();
        let url = self.url(&format!("changedEntityExportJobs/{}", job.id));
        let auth = self.authorization.clone();

        blocking(move || {
            let response = agent
                .get(&url)
                .header("Authorization", &auth)
                .call()
                .map_err(transport)?;
            let value: Value = check_status(response, is_success)?
                .into_body()
                .read_json()
                .map_err(|e| RemoteError::Decode(format!("export status response: {}", e)))?;
            Ok(download_url_from_status(&value))
        })
        .await
    }

    async fn download(&self, locator: &str) -> Result<String, RemoteError> {
        let agent = self.agent.clone();
        let url = locator.to_string();

        blocking(move || {
            let response = agent.get(&url).call().map_err(transport)?;
            let mut response = check_status(response, is_success)?;
            response
                .body_mut()
                .with_config()
                .limit(MAX_EXPORT_BYTES)
                .read_to_string()
                .map_err(|e| RemoteError::Decode(format!("export file: {}", e)))
        })
        .await
    }
}

#[async_trait]
impl CrmRecords for EveryActionClient {
    async fn codes_for(&self, id: &ContactId) -> Result<Vec<CrmCode>, RemoteError> {
        let agent = self.agent.clone();
        let url = self.url(&format!("people/{}/codes", id));
        let auth = self.authorization.clone();

        blocking(move || {
            let response = agent
                .get(&url)
                .header("Authorization", &auth)
                .call()
                .map_err(transport)?;
            let value: Value = check_status(response, is_success)?
                .into_body()
                .read_json()
                .map_err(|e| RemoteError::Decode(format!("codes response: {}", e)))?;
            codes_from_response(&value)
        })
        .await
    }

    async fn apply_code(&self, id: &ContactId, code_id: u64) -> Result<(), RemoteError> {
        let agent = self.agent.clone();
        let url = self.url(&format!("people/{}/codes", id));
        let auth = self.authorization.clone();
        let body = json!([{ "codeId": code_id }]);

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
