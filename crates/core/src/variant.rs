//! Pipeline variant configuration.
//!
//! Different outreach experiments differ only in their group labels, their
//! eligibility filters, and which downstream channel each group is routed
//! to. All three live in one [`PipelineVariant`] so that a new experiment is
//! a config change rather than a new code path.
//!
//! ```toml
//! name = "welcome-flow"
//!
//! [eligibility]
//! require_phone = true
//! require_opt_in = true
//!
//! [[groups]]
//! label = "Strive"
//! channel = { kind = "vendor_enroll", group_tag = "Welcome Flow Experiment" }
//!
//! [[groups]]
//! label = "Control"
//!
//! [[groups]]
//! label = "Voicemail"
//! channel = { kind = "digest_email", recipients = ["ops@example.org"], subject = "Voicemail group" }
//! ```

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::VariantError;
use crate::model::GroupLabel;

/// Row-level filters applied after the creation-date window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    /// Drop contacts without a phone number.
    #[serde(default)]
    pub require_phone: bool,
    /// Keep only contacts whose phone opt-in status is 1.
    #[serde(default)]
    pub require_opt_in: bool,
    /// Drop contacts whose CRM record already carries this code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_code: Option<String>,
}

/// Downstream side effect for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Channel {
    /// Create/opt-in each member on the texting vendor, tagged with `group_tag`.
    VendorEnroll { group_tag: String },
    /// Apply a CRM code to each member's source record.
    TagApply { code_id: u64 },
    /// Mail the whole group as one CSV attachment.
    DigestEmail {
        recipients: Vec<String>,
        subject: String,
        #[serde(default = "default_digest_file_name")]
        file_name: String,
    },
}

fn default_digest_file_name() -> String {
    "group.csv".to_string()
}

/// Channel discriminant, for reporting and for deciding which adapters a run needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    VendorEnroll,
    TagApply,
    DigestEmail,
}

impl Channel {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Channel::VendorEnroll { .. } => ChannelKind::VendorEnroll,
            Channel::TagApply { .. } => ChannelKind::TagApply,
            Channel::DigestEmail { .. } => ChannelKind::DigestEmail,
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChannelKind::VendorEnroll => "vendor_enroll",
            ChannelKind::TagApply => "tag_apply",
            ChannelKind::DigestEmail => "digest_email",
        };
        f.write_str(name)
    }
}

/// One configured group: its label and, unless it is a control arm, its channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
}

/// An ordered, non-empty list of distinct labels.
///
/// Position matters: the allocator maps its first slice to the first label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLabels(Vec<GroupLabel>);

impl GroupLabels {
    pub fn new<I, S>(labels: I) -> Result<Self, VariantError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(VariantError::NoGroups);
        }
        let mut seen = HashSet::new();
        for (position, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(VariantError::BlankLabel { position });
            }
            if !seen.insert(label.as_str()) {
                return Err(VariantError::DuplicateLabel {
                    label: label.clone(),
                });
            }
        }
        Ok(GroupLabels(labels.into_iter().map(GroupLabel::new).collect()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GroupLabel> {
        self.0.iter()
    }
}

/// Everything that distinguishes one experiment pipeline from another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineVariant {
    #[serde(default = "default_variant_name")]
    pub name: String,
    #[serde(default)]
    pub eligibility: Eligibility,
    pub groups: Vec<GroupSpec>,
}

fn default_variant_name() -> String {
    "default".to_string()
}

impl PipelineVariant {
    /// The configured labels, validated and in configuration order.
    pub fn labels(&self) -> Result<GroupLabels, VariantError> {
        GroupLabels::new(self.groups.iter().map(|g| g.label.clone()))
    }

    /// Channels active in this variant.
    pub fn dispatch_channels(&self) -> BTreeSet<ChannelKind> {
        self.groups
            .iter()
            .filter_map(|g| g.channel.as_ref().map(Channel::kind))
            .collect()
    }

    /// Groups that have a channel, paired with their label.
    pub fn routed_groups(&self) -> impl Iterator<Item = (GroupLabel, &Channel)> {
        self.groups
            .iter()
            .filter_map(|g| g.channel.as_ref().map(|c| (GroupLabel::new(&g.label), c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELCOME_FLOW: &str = r#"
name = "welcome-flow"

[eligibility]
require_phone = true
require_opt_in = true

[[groups]]
label = "Strive"
channel = { kind = "vendor_enroll", group_tag = "Welcome Flow Experiment" }

[[groups]]
label = "Control"

[[groups]]
label = "Voicemail"
channel = { kind = "digest_email", recipients = ["ops@example.org"], subject = "Voicemail group" }
"#;

    #[test]
    fn parses_welcome_flow_variant() {
        let variant: PipelineVariant = toml::from_str(WELCOME_FLOW).unwrap();
        assert_eq!(variant.name, "welcome-flow");
        assert!(variant.eligibility.require_phone);
        assert!(variant.eligibility.require_opt_in);
        assert_eq!(variant.eligibility.exclude_code, None);

        let groups = variant.labels().unwrap();
        let labels: Vec<&str> = groups.iter().map(GroupLabel::as_str).collect();
        assert_eq!(labels, vec!["Strive", "Control", "Voicemail"]);

        match &variant.groups[2].channel {
            Some(Channel::DigestEmail { file_name, .. }) => assert_eq!(file_name, "group.csv"),
            other => panic!("expected digest channel, got {other:?}"),
        }
    }

    #[test]
    fn dispatch_channels_skip_control_groups() {
        let variant: PipelineVariant = toml::from_str(WELCOME_FLOW).unwrap();
        let kinds: Vec<ChannelKind> = variant.dispatch_channels().into_iter().collect();
        assert_eq!(kinds, vec![ChannelKind::VendorEnroll, ChannelKind::DigestEmail]);
        assert_eq!(variant.routed_groups().count(), 2);
    }

    #[test]
    fn labels_must_be_distinct_and_present() {
        assert_eq!(
            GroupLabels::new(Vec::<String>::new()),
            Err(VariantError::NoGroups)
        );
        assert_eq!(
            GroupLabels::new(["A", "B", "A"]),
            Err(VariantError::DuplicateLabel {
                label: "A".to_string()
            })
        );
        assert_eq!(
            GroupLabels::new(["A", "  "]),
            Err(VariantError::BlankLabel { position: 1 })
        );
    }

    #[test]
    fn tag_apply_channel_round_trips_through_toml() {
        let variant: PipelineVariant = toml::from_str(
            r#"
[[groups]]
label = "Tuesday Welcome Call"
channel = { kind = "tag_apply", code_id = 1234 }
"#,
        )
        .unwrap();
        assert_eq!(variant.name, "default");
        assert_eq!(
            variant.groups[0].channel,
            Some(Channel::TagApply { code_id: 1234 })
        );
    }
}
