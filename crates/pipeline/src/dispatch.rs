//! Channel Dispatcher: push newly assigned contacts to each group's channel.
//!
//! Contacts are handled one at a time and independently. A failure for one
//! contact (or for a whole digest) is recorded in the [`DispatchReport`] and
//! the dispatcher moves on. Nothing here is retried: re-sending to the
//! texting vendor or re-mailing a digest is not safe to repeat blindly.

use std::collections::HashMap;

use async_trait::async_trait;
use cohort_core::{AssignmentBatch, Channel, ChannelKind, Contact, ContactId, GroupLabel, PipelineVariant};
use serde::Serialize;

use crate::crm::CrmRecords;
use crate::error::RemoteError;

// ── Channel traits ───────────────────────────────────────────────────────────

/// Creates and opts in a member on the texting vendor.
#[async_trait]
pub trait VendorEnroller: Send + Sync {
    async fn enroll(&self, contact: &Contact, group_tag: &str) -> Result<(), RemoteError>;
}

/// One group's roster, ready to mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub file_name: String,
    /// CSV with header `VanID,FirstName,LastName,Phone`.
    pub csv: String,
}

/// Sends a digest email with the roster attached.
#[async_trait]
pub trait DigestMailer: Send + Sync {
    async fn send_digest(&self, message: &DigestMessage) -> Result<(), RemoteError>;
}

// ── Report ───────────────────────────────────────────────────────────────────

/// One failed side effect. `contact_id` is `None` for group-level failures
/// such as a digest that could not be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    pub contact_id: Option<String>,
    pub message: String,
}

/// What happened for one routed group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupOutcome {
    pub label: String,
    pub channel: ChannelKind,
    pub members: usize,
    pub delivered: usize,
    pub failures: Vec<DispatchFailure>,
}

impl GroupOutcome {
    fn new(label: &GroupLabel, channel: ChannelKind, members: usize) -> Self {
        GroupOutcome {
            label: label.to_string(),
            channel,
            members,
            delivered: 0,
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, contact_id: Option<&ContactId>, error: impl std::fmt::Display) {
        self.failures.push(DispatchFailure {
            contact_id: contact_id.map(ToString::to_string),
            message: error.to_string(),
        });
    }
}

/// Per-group results of one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub groups: Vec<GroupOutcome>,
}

impl DispatchReport {
    pub fn failure_count(&self) -> usize {
        self.groups.iter().map(|g| g.failures.len()).sum()
    }

    pub fn delivered_count(&self) -> usize {
        self.groups.iter().map(|g| g.delivered).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failure_count() == 0
    }
}

// ── Digest rendering ─────────────────────────────────────────────────────────

/// Render a group roster as CSV. Missing phones become empty cells.
pub fn render_digest_csv(contacts: &[&Contact]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["VanID", "FirstName", "LastName", "Phone"])?;
    for c in contacts {
        writer.write_record([
            c.id.as_str(),
            c.first_name.as_str(),
            c.last_name.as_str(),
            c.phone.as_deref().unwrap_or(""),
        ])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ── Dispatcher ───────────────────────────────────────────────────────────────

/// Routes groups to their configured channels.
///
/// Any channel may be absent. A group routed to an absent channel fails as a
/// whole with [`RemoteError::NotConfigured`].
#[derive(Default, Clone, Copy)]
pub struct Dispatcher<'a> {
    pub vendor: Option<&'a dyn VendorEnroller>,
    pub crm: Option<&'a dyn CrmRecords>,
    pub mailer: Option<&'a dyn DigestMailer>,
}

impl<'a> Dispatcher<'a> {
    /// Dispatch every routed group in `batch`. Contacts are looked up by ID in
    /// `contacts`; a batch entry with no matching contact is a failure.
    pub async fn dispatch(
        &self,
        variant: &PipelineVariant,
        batch: &AssignmentBatch,
        contacts: &[Contact],
    ) -> DispatchReport {
        let by_id: HashMap<&ContactId, &Contact> = contacts.iter().map(|c| (&c.id, c)).collect();
        let mut report = DispatchReport::default();

        for (label, channel) in variant.routed_groups() {
            let ids = batch.ids_for(&label);
            let mut outcome = GroupOutcome::new(&label, channel.kind(), ids.len());

            let mut members = Vec::with_capacity(ids.len());
            for id in ids {
                match by_id.get(id) {
                    Some(contact) => members.push(*contact),
                    None => outcome.fail(Some(id), "no contact record for assigned ID"),
                }
            }

            match channel {
                Channel::VendorEnroll { group_tag } => {
                    self.enroll_group(&members, group_tag, &mut outcome).await
                }
                Channel::TagApply { code_id } => {
                    self.tag_group(&members, *code_id, &mut outcome).await
                }
                Channel::DigestEmail {
                    recipients,
                    subject,
                    file_name,
                } => {
                    let message = DigestTemplate {
                        recipients,
                        subject,
                        file_name,
                    };
                    self.mail_group(&members, message, &mut outcome).await
                }
            }

            tracing::info!(
                group = %outcome.label,
                channel = %outcome.channel,
                members = outcome.members,
                delivered = outcome.delivered,
                failed = outcome.failures.len(),
                "dispatched group"
            );
            report.groups.push(outcome);
        }
        report
    }

    async fn enroll_group(&self, members: &[&Contact], group_tag: &str, outcome: &mut GroupOutcome) {
        let Some(vendor) = self.vendor else {
            outcome.fail(None, RemoteError::NotConfigured("texting vendor".to_string()));
            return;
        };
        for contact in members {
            if contact.phone.is_none() {
                outcome.fail(Some(&contact.id), "contact has no phone number");
                continue;
            }
            match vendor.enroll(contact, group_tag).await {
                Ok(()) => {
                    tracing::info!(contact_id = %contact.id, group_tag, "enrolled contact on texting vendor");
                    outcome.delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(contact_id = %contact.id, error = %e, "vendor enrollment failed");
                    outcome.fail(Some(&contact.id), e);
                }
            }
        }
    }

    async fn tag_group(&self, members: &[&Contact], code_id: u64, outcome: &mut GroupOutcome) {
        let Some(crm) = self.crm else {
            outcome.fail(None, RemoteError::NotConfigured("CRM record API".to_string()));
            return;
        };
        for contact in members {
            match crm.apply_code(&contact.id, code_id).await {
                Ok(()) => {
                    tracing::info!(contact_id = %contact.id, code_id, "applied code to contact");
                    outcome.delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(contact_id = %contact.id, code_id, error = %e, "applying code failed");
                    outcome.fail(Some(&contact.id), e);
                }
            }
        }
    }

    async fn mail_group(
        &self,
        members: &[&Contact],
        template: DigestTemplate<'_>,
        outcome: &mut GroupOutcome,
    ) {
        if members.is_empty() {
            tracing::info!(group = %outcome.label, "no new members; digest not sent");
            return;
        }
        let Some(mailer) = self.mailer else {
            outcome.fail(None, RemoteError::NotConfigured("mail service".to_string()));
            return;
        };
        let csv = match render_digest_csv(members) {
            Ok(csv) => csv,
            Err(e) => {
                outcome.fail(None, format!("could not render digest: {e}"));
                return;
            }
        };
        let message = DigestMessage {
            recipients: template.recipients.to_vec(),
            subject: template.subject.to_string(),
            file_name: template.file_name.to_string(),
            csv,
        };
        match mailer.send_digest(&message).await {
            Ok(()) => outcome.delivered = members.len(),
            Err(e) => {
                tracing::warn!(group = %outcome.label, error = %e, "digest email failed");
                outcome.fail(None, e);
            }
        }
    }
}

struct DigestTemplate<'v> {
    recipients: &'v [String],
    subject: &'v str,
    file_name: &'v str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn contact(id: &str, phone: Option<&str>) -> Contact {
        Contact {
            id: ContactId::from(id),
            first_name: "Ana".to_string(),
            last_name: "Friend".to_string(),
            phone: phone.map(str::to_string),
            created_on: date!(2024 - 05 - 14),
        }
    }

    #[test]
    fn digest_csv_has_fixed_header() {
        let a = contact("101", Some("5551110001"));
        let b = contact("102", None);
        let csv = render_digest_csv(&[&a, &b]).unwrap();
        assert_eq!(
            csv,
            "VanID,FirstName,LastName,Phone\n101,Ana,Friend,5551110001\n102,Ana,Friend,\n"
        );
    }

    #[test]
    fn digest_csv_quotes_commas() {
        let mut c = contact("7", None);
        c.last_name = "Smith, Jr.".to_string();
        let csv = render_digest_csv(&[&c]).unwrap();
        assert!(csv.contains("\"Smith, Jr.\""));
    }

    #[test]
    fn report_counts() {
        let report = DispatchReport {
            groups: vec![GroupOutcome {
                label: "Strive".to_string(),
                channel: ChannelKind::VendorEnroll,
                members: 3,
                delivered: 2,
                failures: vec![DispatchFailure {
                    contact_id: Some("9".to_string()),
                    message: "boom".to_string(),
                }],
            }],
        };
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.delivered_count(), 2);
        assert!(!report.is_clean());
    }
}
