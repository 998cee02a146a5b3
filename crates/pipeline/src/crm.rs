//! CRM record access: code lookups for eligibility, code application for dispatch.

use std::collections::HashSet;

use async_trait::async_trait;
use cohort_core::{Contact, ContactId, NormalizeError};
use serde::Deserialize;

use crate::error::{PipelineError, RemoteError};

/// A code (tag) attached to a CRM record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CrmCode {
    #[serde(rename = "codeId")]
    pub id: u64,
    pub name: String,
}

impl CrmCode {
    /// A configured exclusion matches by numeric ID or, case-insensitively, by name.
    pub fn matches(&self, wanted: &str) -> bool {
        let wanted = wanted.trim();
        self.id.to_string() == wanted || self.name.eq_ignore_ascii_case(wanted)
    }
}

/// Per-contact reads and writes against the CRM.
#[async_trait]
pub trait CrmRecords: Send + Sync {
    /// Codes currently applied to one contact.
    async fn codes_for(&self, id: &ContactId) -> Result<Vec<CrmCode>, RemoteError>;

    /// Codes for many contacts. Implementations with a bulk endpoint should
    /// override this; the default issues one lookup per contact.
    async fn codes_for_many(
        &self,
        ids: &[ContactId],
    ) -> Vec<(ContactId, Result<Vec<CrmCode>, RemoteError>)> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push((id.clone(), self.codes_for(id).await));
        }
        out
    }

    /// Apply a code to one contact's record.
    async fn apply_code(&self, id: &ContactId, code_id: u64) -> Result<(), RemoteError>;
}

/// Drop contacts whose record carries `code`.
///
/// A contact whose lookup fails is dropped as well: it cannot be shown to be
/// eligible. Fails with `NoEligibleContacts` when nobody is left.
pub async fn exclude_coded(
    contacts: Vec<Contact>,
    crm: &dyn CrmRecords,
    code: &str,
) -> Result<Vec<Contact>, PipelineError> {
    let ids: Vec<ContactId> = contacts.iter().map(|c| c.id.clone()).collect();
    let mut excluded = HashSet::new();
    for (id, lookup) in crm.codes_for_many(&ids).await {
        match lookup {
            Ok(codes) if codes.iter().any(|c| c.matches(code)) => {
                tracing::debug!(contact_id = %id, code, "contact already coded");
                excluded.insert(id);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(contact_id = %id, error = %e, "code lookup failed; excluding contact");
                excluded.insert(id);
            }
        }
    }

    let before = contacts.len();
    let kept: Vec<Contact> = contacts
        .into_iter()
        .filter(|c| !excluded.contains(&c.id))
        .collect();
    tracing::info!(excluded = before - kept.len(), remaining = kept.len(), code, "applied code exclusion");

    if kept.is_empty() {
        return Err(NormalizeError::NoEligibleContacts.into());
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use time::macros::date;

    struct FakeCrm {
        codes: HashMap<String, Vec<CrmCode>>,
        broken: HashSet<String>,
    }

    #[async_trait]
    impl CrmRecords for FakeCrm {
        async fn codes_for(&self, id: &ContactId) -> Result<Vec<CrmCode>, RemoteError> {
            if self.broken.contains(id.as_str()) {
                return Err(RemoteError::Transport("connection reset".to_string()));
            }
            Ok(self.codes.get(id.as_str()).cloned().unwrap_or_default())
        }

        async fn apply_code(&self, _id: &ContactId, _code_id: u64) -> Result<(), RemoteError> {
            Ok(())
        }
    }

    fn contact(id: &str) -> Contact {
        Contact {
            id: ContactId::from(id),
            first_name: "Friend".to_string(),
            last_name: "Friend".to_string(),
            phone: None,
            created_on: date!(2024 - 05 - 14),
        }
    }

    fn code(id: u64, name: &str) -> CrmCode {
        CrmCode {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn code_matches_by_id_or_name() {
        let c = code(1234, "Welcome Flow");
        assert!(c.matches("1234"));
        assert!(c.matches("welcome flow"));
        assert!(!c.matches("Other"));
    }

    #[test]
    fn code_deserializes_from_crm_shape() {
        let c: CrmCode =
            serde_json::from_str(r#"{"codeId": 77, "name": "Texted", "codeType": "Tag"}"#)
                .unwrap();
        assert_eq!(c, code(77, "Texted"));
    }

    #[tokio::test]
    async fn coded_and_unknown_contacts_are_dropped() {
        let crm = FakeCrm {
            codes: [("1".to_string(), vec![code(9, "Texted")])].into(),
            broken: ["3".to_string()].into(),
        };
        let kept = exclude_coded(vec![contact("1"), contact("2"), contact("3")], &crm, "Texted")
            .await
            .unwrap();
        let ids: Vec<&str> = kept.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["2"]);
    }

    #[tokio::test]
    async fn excluding_everyone_is_no_data() {
        let crm = FakeCrm {
            codes: [("1".to_string(), vec![code(9, "Texted")])].into(),
            broken: HashSet::new(),
        };
        let err = exclude_coded(vec![contact("1")], &crm, "9").await.unwrap_err();
        assert!(err.is_no_data());
    }
}
