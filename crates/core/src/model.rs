//! Domain records: contacts, group labels, and assignments.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::Date;

/// Opaque CRM identifier for a contact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(String);

impl ContactId {
    pub fn new(id: impl Into<String>) -> Self {
        ContactId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContactId {
    fn from(s: &str) -> Self {
        ContactId(s.to_string())
    }
}

impl From<String> for ContactId {
    fn from(s: String) -> Self {
        ContactId(s)
    }
}

/// Experiment-arm identifier. Used verbatim for persistence and dispatch routing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupLabel(String);

impl GroupLabel {
    pub fn new(label: impl Into<String>) -> Self {
        GroupLabel(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupLabel {
    fn from(s: &str) -> Self {
        GroupLabel(s.to_string())
    }
}

/// A normalized contact snapshot. Names are already defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: ContactId,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub created_on: Date,
}

/// One persisted (contact, group, date) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub contact_id: ContactId,
    pub label: GroupLabel,
    pub assigned_on: Date,
}

/// The in-memory (ID, label) long table produced by one allocation.
///
/// Entries keep the order the allocator emitted them in: all members of the
/// first group, then the second, and so on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentBatch {
    entries: Vec<(ContactId, GroupLabel)>,
}

impl AssignmentBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, id: ContactId, label: GroupLabel) {
        self.entries.push((id, label));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContactId, &GroupLabel)> {
        self.entries.iter().map(|(id, label)| (id, label))
    }

    /// All IDs assigned to `label`, in batch order.
    pub fn ids_for(&self, label: &GroupLabel) -> Vec<&ContactId> {
        self.entries
            .iter()
            .filter(|(_, l)| l == label)
            .map(|(id, _)| id)
            .collect()
    }

    /// Member count per label. Labels with no members are absent.
    pub fn group_sizes(&self) -> BTreeMap<&GroupLabel, usize> {
        let mut sizes = BTreeMap::new();
        for (_, label) in &self.entries {
            *sizes.entry(label).or_insert(0) += 1;
        }
        sizes
    }
}

impl FromIterator<(ContactId, GroupLabel)> for AssignmentBatch {
    fn from_iter<I: IntoIterator<Item = (ContactId, GroupLabel)>>(iter: I) -> Self {
        AssignmentBatch {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> AssignmentBatch {
        [("a", "X"), ("b", "Y"), ("c", "X")]
            .into_iter()
            .map(|(id, label)| (ContactId::from(id), GroupLabel::from(label)))
            .collect()
    }

    #[test]
    fn ids_for_filters_by_label() {
        let b = batch();
        let xs: Vec<&str> = b
            .ids_for(&GroupLabel::from("X"))
            .into_iter()
            .map(ContactId::as_str)
            .collect();
        assert_eq!(xs, vec!["a", "c"]);
        assert!(b.ids_for(&GroupLabel::from("Z")).is_empty());
    }

    #[test]
    fn group_sizes_count_members() {
        let b = batch();
        let sizes = b.group_sizes();
        assert_eq!(sizes[&GroupLabel::from("X")], 2);
        assert_eq!(sizes[&GroupLabel::from("Y")], 1);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = ContactId::from("10042");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"10042\"");
    }
}
