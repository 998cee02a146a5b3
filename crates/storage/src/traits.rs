use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::AssignmentRecord;

/// The storage trait for the assignment table.
///
/// An `AssignmentStore` records which group each contact was permanently
/// assigned to. The table is append-only and keyed by contact ID.
///
/// ## Uniqueness
///
/// `append_assignments` must reject the whole append with
/// `StorageError::DuplicateContact` if any record's contact ID is already
/// stored or appears twice in the append. A rejected append writes nothing.
///
/// ## Concurrency
///
/// The pipeline reads the existing IDs, diffs, then appends. A single run is
/// assumed to be the only writer between those two calls; the uniqueness
/// check above is what catches a second writer that slipped in.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so they can be shared
/// across async task boundaries.
#[async_trait]
pub trait AssignmentStore: Send + Sync + 'static {
    /// Every contact ID that already has an assignment.
    async fn existing_contact_ids(&self) -> Result<HashSet<String>, StorageError>;

    /// Append new rows. Returns the number of rows written.
    async fn append_assignments(&self, records: &[AssignmentRecord])
        -> Result<usize, StorageError>;

    /// All stored rows in insertion order, optionally restricted to one group.
    async fn list_assignments(
        &self,
        group_label: Option<&str>,
    ) -> Result<Vec<AssignmentRecord>, StorageError>;
}

/// Shared uniqueness check for appends against an existing ID set.
pub(crate) fn ensure_new(
    existing: &HashSet<String>,
    records: &[AssignmentRecord],
) -> Result<(), StorageError> {
    let mut incoming: HashSet<&str> = HashSet::with_capacity(records.len());
    for record in records {
        if existing.contains(&record.contact_id)
            || !incoming.insert(record.contact_id.as_str())
        {
            return Err(StorageError::DuplicateContact {
                contact_id: record.contact_id.clone(),
            });
        }
    }
    Ok(())
}
