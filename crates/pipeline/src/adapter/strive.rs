//! Strive texting vendor: create an opted-in member inside a group.

use async_trait::async_trait;
use cohort_core::Contact;
use serde_json::{json, Value};
use ureq::Agent;

use super::{agent, bearer, blocking, check_status, join_url, transport};
use crate::dispatch::VendorEnroller;
use crate::error::RemoteError;

pub const DEFAULT_BASE_URL: &str = "https://api.strivedigital.org";

#[derive(Clone)]
pub struct StriveEnroller {
    agent: Agent,
    members_url: String,
    authorization: String,
    campaign_id: u64,
}

impl StriveEnroller {
    pub fn new(base_url: &str, api_key: &str, campaign_id: u64) -> Self {
        StriveEnroller {
            agent: agent(),
            members_url: join_url(base_url, "members"),
            authorization: bearer(api_key),
            campaign_id,
        }
    }
}

/// Body for `POST /members`.
pub fn member_payload(contact: &Contact, campaign_id: u64, group_tag: &str) -> Value {
    json!({
        "phone_number": contact.phone,
        "campaign_id": campaign_id,
        "first_name": contact.first_name,
        "last_name": contact.last_name,
        "opt_in": true,
        "groups": [{ "name": group_tag }],
    })
}

/// The vendor answers a created member with exactly 201.
fn created(status: u16) -> bool {
    status == 201
}

#[async_trait]
impl VendorEnroller for StriveEnroller {
    async fn enroll(&self, contact: &Contact, group_tag: &str) -> Result<(), RemoteError> {
        let agent = self.agent.clone();
        let url = self.members_url.clone();
        let auth = self.authorization.clone();
        let body = member_payload(contact, self.campaign_id, group_tag);

        blocking(move || {
            let response = agent
                .post(&url)
                .header("Authorization", &auth)
                .send_json(&body)
                .map_err(transport)?;
            check_status(response, created)?;
            Ok(())
        })
        .await
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
