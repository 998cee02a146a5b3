//! Run configuration for `cohort run`.
//!
//! One TOML file describes the export API, the assignment store, the
//! downstream channels, and the experiment variant. Secrets never live here;
//! see [`crate::context::Credentials`].
//!
//! # Example
//!
//! ```toml
//! [run]
//! seed = 10
//! timezone_offset_hours = -5
//!
//! [export]
//! application_name = "my-van-app"
//!
//! [store]
//! path = "assignments.jsonl"
//!
//! [vendor]
//! campaign_id = 1234
//!
//! [email]
//! from = "bot@example.org"
//!
//! [variant]
//! name = "welcome-flow"
//!
//! [variant.eligibility]
//! require_phone = true
//! require_opt_in = true
//!
//! [[variant.groups]]
//! label = "Strive"
//! channel = { kind = "vendor_enroll", group_tag = "Welcome Flow Experiment" }
//!
//! [[variant.groups]]
//! label = "Control"
//!
//! [[variant.groups]]
//! label = "Voicemail"
//! channel = { kind = "digest_email", recipients = ["ops@example.org"], subject = "Voicemail group" }
//! ```

use std::path::{Path, PathBuf};

use cohort_core::{Channel, ChannelKind, PipelineVariant};
use serde::{Deserialize, Serialize};

// ── Types ─────────────────────────────────────────────────────────────────────

/// Top-level run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortConfig {
    #[serde(default)]
    pub run: RunSection,
    #[serde(default)]
    pub export: ExportSection,
    pub store: StoreSection,
    /// Required when any group routes to `vendor_enroll`.
    pub vendor: Option<VendorSection>,
    /// Required when any group routes to `digest_email`.
    pub email: Option<EmailSection>,
    pub variant: PipelineVariant,
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Hours of CRM changes requested from the export API.
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    /// Offset from UTC used to decide what "today" is.
    #[serde(default)]
    pub timezone_offset_hours: i8,
}

impl Default for RunSection {
    fn default() -> Self {
        RunSection {
            seed: default_seed(),
            window_hours: default_window_hours(),
            timezone_offset_hours: 0,
        }
    }
}

/// `[export]` section. Also used for CRM code lookups and code application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSection {
    #[serde(default = "default_export_base_url")]
    pub base_url: String,
    pub application_name: Option<String>,
    #[serde(default = "default_db_mode")]
    pub db_mode: u8,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_requested_fields")]
    pub requested_fields: Vec<String>,
}

impl Default for ExportSection {
    fn default() -> Self {
        ExportSection {
            base_url: default_export_base_url(),
            application_name: None,
            db_mode: default_db_mode(),
            poll_interval_secs: default_poll_interval(),
            poll_timeout_secs: default_poll_timeout(),
            requested_fields: default_requested_fields(),
        }
    }
}

/// `[store]` section. A relative `path` is resolved against the config file's directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    pub path: PathBuf,
}

/// `[vendor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorSection {
    #[serde(default = "default_vendor_base_url")]
    pub base_url: String,
    pub campaign_id: u64,
}

/// `[email]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSection {
    pub from: String,
    #[serde(default = "default_html_body")]
    pub html_body: String,
}

fn default_seed() -> u64 {
    cohort_core::DEFAULT_SEED
}

fn default_window_hours() -> u32 {
    24
}

fn default_export_base_url() -> String {
    cohort_pipeline::adapter::everyaction::DEFAULT_BASE_URL.to_string()
}

fn default_db_mode() -> u8 {
    1
}

fn default_poll_interval() -> u64 {
    20
}

fn default_poll_timeout() -> u64 {
    1000
}

fn default_requested_fields() -> Vec<String> {
    cohort_pipeline::adapter::everyaction::DEFAULT_REQUESTED_FIELDS
        .iter()
        .map(|f| f.to_string())
        .collect()
}

fn default_vendor_base_url() -> String {
    cohort_pipeline::adapter::strive::DEFAULT_BASE_URL.to_string()
}

fn default_html_body() -> String {
    "Here is your CSV".to_string()
}

// ── Functions ─────────────────────────────────────────────────────────────────

/// Read and parse a config TOML file from `path`.
///
/// Returns a human-readable error string on failure.
pub fn read_config(path: &Path) -> Result<CohortConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;

    toml::from_str(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

/// Check everything that can be checked without touching the network.
///
/// Returns `Ok(())` if valid, or `Err(Vec<String>)` listing every problem found.
pub fn validate_config(config: &CohortConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    if let Err(e) = config.variant.labels() {
        errors.push(e.to_string());
    }

    let channels = config.variant.dispatch_channels();
    if channels.contains(&ChannelKind::VendorEnroll) && config.vendor.is_none() {
        errors.push("a group routes to vendor_enroll but there is no [vendor] section".to_string());
    }
    if channels.contains(&ChannelKind::DigestEmail) && config.email.is_none() {
        errors.push("a group routes to digest_email but there is no [email] section".to_string());
    }
    let needs_crm =
        channels.contains(&ChannelKind::TagApply) || config.variant.eligibility.exclude_code.is_some();
    if needs_crm && config.export.application_name.is_none() {
        errors.push(
            "tag_apply and exclude_code use the CRM API; set [export] application_name".to_string(),
        );
    }

    for group in &config.variant.groups {
        match &group.channel {
            Some(Channel::DigestEmail { recipients, .. }) if recipients.is_empty() => {
                errors.push(format!("digest group '{}' has no recipients", group.label));
            }
            Some(Channel::VendorEnroll { group_tag }) if group_tag.trim().is_empty() => {
                errors.push(format!("vendor group '{}' has a blank group_tag", group.label));
            }
            _ => {}
        }
    }

    if !(-23..=23).contains(&config.run.timezone_offset_hours) {
        errors.push(format!(
            "timezone_offset_hours must be between -23 and 23, got {}",
            config.run.timezone_offset_hours
        ));
    }
    if config.export.poll_interval_secs == 0 {
        errors.push("poll_interval_secs must be at least 1".to_string());
    }
    if config.export.requested_fields.is_empty() {
        errors.push("requested_fields must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// The store path, with a relative path taken relative to the config file.
pub fn resolve_store_path(config_path: &Path, config: &CohortConfig) -> PathBuf {
    if config.store.path.is_absolute() {
        return config.store.path.clone();
    }
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&config.store.path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[store]
path = "assignments.jsonl"

[[variant.groups]]
label = "A"

[[variant.groups]]
label = "B"
"#;

    fn parse(s: &str) -> CohortConfig {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn defaults_fill_unset_sections() {
        let config = parse(MINIMAL);
        assert_eq!(config.run.seed, 10);
        assert_eq!(config.run.window_hours, 24);
        assert_eq!(config.run.timezone_offset_hours, 0);
        assert_eq!(config.export.db_mode, 1);
        assert_eq!(config.export.poll_interval_secs, 20);
        assert_eq!(config.export.poll_timeout_secs, 1000);
        assert_eq!(config.export.requested_fields.len(), 6);
        assert_eq!(config.variant.name, "default");
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn vendor_channel_needs_vendor_section() {
        let config = parse(
            r#"
[store]
path = "a.jsonl"

[[variant.groups]]
label = "Strive"
channel = { kind = "vendor_enroll", group_tag = "Welcome" }
"#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("[vendor]"));
    }

    #[test]
    fn digest_needs_email_and_recipients() {
        let config = parse(
            r#"
[store]
path = "a.jsonl"

[[variant.groups]]
label = "Voicemail"
channel = { kind = "digest_email", recipients = [], subject = "VM" }
"#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("[email]")));
        assert!(errors.iter().any(|e| e.contains("no recipients")));
    }

    #[test]
    fn duplicate_labels_reported() {
        let config = parse(
            r#"
[store]
path = "a.jsonl"

[[variant.groups]]
label = "A"

[[variant.groups]]
label = "A"
"#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].contains("'A'"));
    }

    #[test]
    fn exclusion_needs_crm_application() {
        let mut config = parse(MINIMAL);
        config.variant.eligibility.exclude_code = Some("Texted".to_string());
        assert!(validate_config(&config).is_err());
        config.export.application_name = Some("app".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn store_path_relative_to_config() {
        let config = parse(MINIMAL);
        assert_eq!(
            resolve_store_path(Path::new("/etc/cohort/run.toml"), &config),
            PathBuf::from("/etc/cohort/assignments.jsonl")
        );
        assert_eq!(
            resolve_store_path(Path::new("run.toml"), &config),
            PathBuf::from("assignments.jsonl")
        );
    }

    #[test]
    fn read_config_reports_path() {
        let err = read_config(Path::new("/nonexistent/cohort.toml")).unwrap_err();
        assert!(err.contains("/nonexistent/cohort.toml"));
    }
}
