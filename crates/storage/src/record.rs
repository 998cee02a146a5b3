use serde::{Deserialize, Serialize};

/// One persisted assignment row, in warehouse column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub contact_id: String,
    pub group_label: String,
    /// Calendar date of the run that made the assignment, `YYYY-MM-DD`.
    pub assigned_on: String,
}

impl AssignmentRecord {
    pub fn new(
        contact_id: impl Into<String>,
        group_label: impl Into<String>,
        assigned_on: impl Into<String>,
    ) -> Self {
        AssignmentRecord {
            contact_id: contact_id.into(),
            group_label: group_label.into(),
            assigned_on: assigned_on.into(),
        }
    }
}
