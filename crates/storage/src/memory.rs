//! In-process store, used by tests and by dry runs.
//!
//! Clones share one table.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::AssignmentRecord;
use crate::traits::{ensure_new, AssignmentStore};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Vec<AssignmentRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with rows already present. Duplicate IDs in `rows` are not checked.
    pub fn with_records(rows: Vec<AssignmentRecord>) -> Self {
        MemoryStore {
            rows: Arc::new(Mutex::new(rows)),
        }
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, Vec<AssignmentRecord>> {
        // Recover data even if mutex was poisoned by a panic in another thread
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn existing_contact_ids(&self) -> Result<HashSet<String>, StorageError> {
        Ok(self.rows().iter().map(|r| r.contact_id.clone()).collect())
    }

    async fn append_assignments(
        &self,
        records: &[AssignmentRecord],
    ) -> Result<usize, StorageError> {
        let mut rows = self.rows();
        let existing: HashSet<String> = rows.iter().map(|r| r.contact_id.clone()).collect();
        ensure_new(&existing, records)?;
        rows.extend_from_slice(records);
        Ok(records.len())
    }

    async fn list_assignments(
        &self,
        group_label: Option<&str>,
    ) -> Result<Vec<AssignmentRecord>, StorageError> {
        Ok(self
            .rows()
            .iter()
            .filter(|r| group_label.map_or(true, |g| r.group_label == g))
            .cloned()
            .collect())
    }
}
