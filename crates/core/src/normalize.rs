//! Contact Normalizer: export CSV → eligible, defaulted [`Contact`]s.
//!
//! The CRM reports `DateCreated` as a calendar date, so the "created
//! yesterday" window is compared at day resolution. The window is a single
//! day: a run that is skipped will not pick up the contacts it missed.

use std::collections::HashSet;

use serde::Deserialize;
use time::macros::format_description;
use time::Date;

use crate::error::NormalizeError;
use crate::model::{Contact, ContactId};
use crate::variant::Eligibility;
use crate::DEFAULT_NAME;

/// One raw row of the contacts export. Unknown columns are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExportRow {
    #[serde(rename = "VanID")]
    pub van_id: String,
    #[serde(rename = "FirstName", default)]
    pub first_name: Option<String>,
    #[serde(rename = "LastName", default)]
    pub last_name: Option<String>,
    #[serde(rename = "Phone", default)]
    pub phone: Option<String>,
    #[serde(rename = "PhoneOptInStatus", default)]
    pub phone_opt_in_status: Option<String>,
    #[serde(rename = "DateCreated")]
    pub date_created: String,
}

impl ExportRow {
    fn has_phone(&self) -> bool {
        present(&self.phone).is_some()
    }

    /// Opted in means the status parses to exactly 1 (the export writes `1` or `1.0`).
    fn is_opted_in(&self) -> bool {
        present(&self.phone_opt_in_status)
            .and_then(|s| s.parse::<f64>().ok())
            .is_some_and(|v| v == 1.0)
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a `DateCreated` cell. A trailing time component is tolerated and dropped.
pub fn parse_created_date(raw: &str) -> Result<Date, time::error::Parse> {
    let day = raw
        .trim()
        .split(['T', ' '])
        .next()
        .unwrap_or_default();
    Date::parse(day, format_description!("[year]-[month]-[day]"))
}

/// Read every row of an export. Fails on the first unreadable row.
pub fn parse_export(csv_text: &str) -> Result<Vec<ExportRow>, NormalizeError> {
    let text = csv_text.strip_prefix('\u{feff}').unwrap_or(csv_text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<ExportRow>().enumerate() {
        let row = result.map_err(|e| NormalizeError::MalformedExport {
            line: e
                .position()
                .map(|p| p.line())
                .unwrap_or(index as u64 + 2),
            message: e.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Filter raw rows down to yesterday's eligible contacts.
///
/// `today` is the run date; only rows created on the day before it survive.
/// Duplicate IDs keep their first occurrence.
pub fn normalize(
    rows: Vec<ExportRow>,
    today: Date,
    eligibility: &Eligibility,
) -> Result<Vec<Contact>, NormalizeError> {
    if rows.is_empty() {
        return Err(NormalizeError::EmptyExport);
    }
    tracing::info!(
        rows = rows.len(),
        "found modified contacts, checking creation date"
    );

    let target = today
        .previous_day()
        .ok_or(NormalizeError::NoRecentContacts { date: today })?;

    let mut recent = Vec::new();
    for (index, row) in rows.into_iter().enumerate() {
        if row.date_created.trim().is_empty() {
            tracing::debug!(line = index + 2, "skipping row without a creation date");
            continue;
        }
        let created_on =
            parse_created_date(&row.date_created).map_err(|e| NormalizeError::MalformedExport {
                line: index as u64 + 2,
                message: format!("DateCreated '{}': {}", row.date_created, e),
            })?;
        if created_on == target {
            recent.push((row, created_on));
        }
    }
    if recent.is_empty() {
        return Err(NormalizeError::NoRecentContacts { date: target });
    }
    tracing::info!(contacts = recent.len(), %target, "found newly created contacts");

    if eligibility.require_phone {
        recent.retain(|(row, _)| row.has_phone());
        tracing::debug!(remaining = recent.len(), "dropped contacts without a phone");
    }
    if eligibility.require_opt_in {
        recent.retain(|(row, _)| row.is_opted_in());
        tracing::debug!(remaining = recent.len(), "dropped contacts not opted in");
    }
    if recent.is_empty() {
        return Err(NormalizeError::NoEligibleContacts);
    }

    let mut seen = HashSet::new();
    let mut contacts = Vec::with_capacity(recent.len());
    for (row, created_on) in recent {
        let id = row.van_id.trim().to_string();
        if id.is_empty() {
            tracing::warn!(created_on = %created_on, "dropping export row without a VanID");
            continue;
        }
        if !seen.insert(id.clone()) {
            tracing::debug!(contact_id = %id, "skipping repeated export row");
            continue;
        }
        contacts.push(Contact {
            id: ContactId::new(id),
            first_name: present(&row.first_name).unwrap_or(DEFAULT_NAME).to_string(),
            last_name: present(&row.last_name).unwrap_or(DEFAULT_NAME).to_string(),
            phone: present(&row.phone).map(str::to_string),
            created_on,
        });
    }

    if contacts.is_empty() {
        return Err(NormalizeError::NoEligibleContacts);
    }
    tracing::info!(contacts = contacts.len(), "eligible contacts ready for allocation");
    Ok(contacts)
}

/// [`parse_export`] followed by [`normalize`].
pub fn normalize_export(
    csv_text: &str,
    today: Date,
    eligibility: &Eligibility,
) -> Result<Vec<Contact>, NormalizeError> {
    normalize(parse_export(csv_text)?, today, eligibility)
}
