use time::Date;

/// A pipeline variant that cannot be used to partition contacts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariantError {
    /// At least one group label is required.
    #[error("a variant needs at least one group label")]
    NoGroups,

    /// Labels route dispatch and persistence, so they must be distinct.
    #[error("group label '{label}' is configured more than once")]
    DuplicateLabel { label: String },

    /// Blank labels cannot be persisted.
    #[error("group label at position {position} is blank")]
    BlankLabel { position: usize },
}

/// The allocator was handed input it cannot partition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    /// Every contact must land in exactly one group.
    #[error("contact '{contact_id}' appears more than once in the allocation input")]
    DuplicateContact { contact_id: String },
}

/// Reasons an export yields nothing to allocate, or cannot be read at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// The export contained a header (or nothing) but no rows.
    #[error("export contained no contacts")]
    EmptyExport,

    /// Rows existed but none were created on the target day.
    #[error("no contacts were created on {date}")]
    NoRecentContacts { date: Date },

    /// Recent contacts existed but the eligibility filters removed all of them.
    #[error("no contacts passed the eligibility filters")]
    NoEligibleContacts,

    /// A row could not be read. `line` is 1-based and counts the header.
    #[error("malformed export at line {line}: {message}")]
    MalformedExport { line: u64, message: String },
}

impl NormalizeError {
    /// True for the "nothing to do today" outcomes, as opposed to a broken export.
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            NormalizeError::EmptyExport
                | NormalizeError::NoRecentContacts { .. }
                | NormalizeError::NoEligibleContacts
        )
    }
}
