/// All errors that can be returned by an AssignmentStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The contact already has a recorded assignment, or the same append
    /// carried it twice. Nothing from the offending append was written.
    #[error("contact {contact_id} already has a recorded assignment")]
    DuplicateContact { contact_id: String },

    /// A persisted row could not be decoded.
    #[error("corrupt assignment record at line {line}: {message}")]
    Corrupt { line: usize, message: String },

    /// A backend-specific storage error (connection, I/O, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}
