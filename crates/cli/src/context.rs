//! Everything a run reads from its environment, gathered once.

use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

use crate::config::{resolve_store_path, CohortConfig};

pub const VAN_API_KEY_VAR: &str = "COHORT_VAN_API_KEY";
pub const STRIVE_API_KEY_VAR: &str = "COHORT_STRIVE_API_KEY";
pub const SENDGRID_API_KEY_VAR: &str = "COHORT_SENDGRID_API_KEY";

/// API keys. Read from the environment exactly once, in `main`.
///
/// A missing key is only an error when the component that needs it is built.
#[derive(Clone, Default)]
pub struct Credentials {
    van_api_key: Option<String>,
    strive_api_key: Option<String>,
    sendgrid_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("van_api_key", &self.van_api_key.as_ref().map(|_| "<set>"))
            .field("strive_api_key", &self.strive_api_key.as_ref().map(|_| "<set>"))
            .field("sendgrid_api_key", &self.sendgrid_api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Self {
        Credentials {
            van_api_key: env_secret(VAN_API_KEY_VAR),
            strive_api_key: env_secret(STRIVE_API_KEY_VAR),
            sendgrid_api_key: env_secret(SENDGRID_API_KEY_VAR),
        }
    }

    pub fn van_api_key(&self) -> Result<&str, String> {
        required(&self.van_api_key, VAN_API_KEY_VAR)
    }

    pub fn strive_api_key(&self) -> Result<&str, String> {
        required(&self.strive_api_key, STRIVE_API_KEY_VAR)
    }

    pub fn sendgrid_api_key(&self) -> Result<&str, String> {
        required(&self.sendgrid_api_key, SENDGRID_API_KEY_VAR)
    }
}

fn env_secret(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, var: &str) -> Result<&'a str, String> {
    value
        .as_deref()
        .ok_or_else(|| format!("environment variable {} is not set", var))
}

/// Config, credentials and clock for one invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub config: CohortConfig,
    pub credentials: Credentials,
    pub store_path: PathBuf,
    /// Export window end.
    pub now: OffsetDateTime,
    /// Run date in the configured timezone.
    pub today: Date,
}

impl RunContext {
    pub fn new(
        config_path: &Path,
        config: CohortConfig,
        credentials: Credentials,
        now: OffsetDateTime,
        today_override: Option<Date>,
    ) -> Result<Self, String> {
        let today = match today_override {
            Some(day) => day,
            None => local_today(now, config.run.timezone_offset_hours)?,
        };
        Ok(RunContext {
            store_path: resolve_store_path(config_path, &config),
            config,
            credentials,
            now,
            today,
        })
    }
}

/// The calendar date at `now` shifted by `offset_hours`.
pub fn local_today(now: OffsetDateTime, offset_hours: i8) -> Result<Date, String> {
    let offset = UtcOffset::from_hms(offset_hours, 0, 0)
        .map_err(|e| format!("invalid timezone offset {}: {}", offset_hours, e))?;
    Ok(now.to_offset(offset).date())
}

/// Parse a `YYYY-MM-DD` command-line date.
pub fn parse_date(raw: &str) -> Result<Date, String> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| format!("invalid date '{}' (expected YYYY-MM-DD): {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn today_follows_configured_offset() {
        let now = datetime!(2024-05-15 03:00 UTC);
        assert_eq!(local_today(now, 0).unwrap(), date!(2024 - 05 - 15));
        assert_eq!(local_today(now, -5).unwrap(), date!(2024 - 05 - 14));
        assert_eq!(local_today(now, 23).unwrap(), date!(2024 - 05 - 16));
    }

    #[test]
    fn parse_date_accepts_iso_only() {
        assert_eq!(parse_date("2024-05-15").unwrap(), date!(2024 - 05 - 15));
        assert!(parse_date("05/15/2024").is_err());
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let creds = Credentials::default();
        let err = creds.strive_api_key().unwrap_err();
        assert!(err.contains(STRIVE_API_KEY_VAR));
    }

    #[test]
    fn debug_hides_secrets() {
        let creds = Credentials {
            van_api_key: Some("super-secret".to_string()),
            ..Credentials::default()
        };
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("<set>"));
    }
}
