//! Assignment Reconciler: keep only never-before-assigned contacts, then
//! record them.
//!
//! The read must succeed before anything is written. A failed read never
//! falls back to "nothing is recorded", which would reassign everyone.

use std::collections::HashSet;

use cohort_core::{new_assignments, Assignment, AssignmentBatch, ContactId};
use cohort_storage::{AssignmentRecord, AssignmentStore};
use time::macros::format_description;
use time::Date;

use crate::error::PipelineError;

/// Outcome of reconciling one batch against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Assignments that were new. When persisted, these are exactly the rows written.
    pub fresh: Vec<Assignment>,
    /// Batch entries dropped because their contact was already recorded.
    pub already_recorded: usize,
    /// Whether `fresh` was written to the store.
    pub persisted: bool,
}

impl Reconciliation {
    /// The fresh assignments as a batch, for dispatch.
    pub fn fresh_batch(&self) -> AssignmentBatch {
        self.fresh
            .iter()
            .map(|a| (a.contact_id.clone(), a.label.clone()))
            .collect()
    }
}

fn to_record(assignment: &Assignment) -> AssignmentRecord {
    let day = assignment
        .assigned_on
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| assignment.assigned_on.to_string());
    AssignmentRecord::new(
        assignment.contact_id.as_str(),
        assignment.label.as_str(),
        day,
    )
}

/// Diff `batch` against the store and, when `persist` is set, append the new rows.
pub async fn reconcile(
    store: &dyn AssignmentStore,
    batch: &AssignmentBatch,
    today: Date,
    persist: bool,
) -> Result<Reconciliation, PipelineError> {
    let existing: HashSet<ContactId> = store
        .existing_contact_ids()
        .await
        .map_err(PipelineError::ReconciliationReadFailure)?
        .into_iter()
        .map(ContactId::from)
        .collect();

    let fresh = new_assignments(batch, &existing, today);
    let already_recorded = batch.len() - fresh.len();
    tracing::info!(
        new = fresh.len(),
        already_recorded,
        "reconciled batch against recorded assignments"
    );

    if !persist || fresh.is_empty() {
        return Ok(Reconciliation {
            fresh,
            already_recorded,
            persisted: false,
        });
    }

    let records: Vec<AssignmentRecord> = fresh.iter().map(to_record).collect();
    let written = store
        .append_assignments(&records)
        .await
        .map_err(PipelineError::PersistFailure)?;
    tracing::info!(rows = written, "recorded new assignments");

    Ok(Reconciliation {
        fresh,
        already_recorded,
        persisted: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::GroupLabel;
    use cohort_storage::MemoryStore;
    use time::macros::date;

    fn batch(entries: &[(&str, &str)]) -> AssignmentBatch {
        entries
            .iter()
            .map(|(id, label)| (ContactId::from(*id), GroupLabel::from(*label)))
            .collect()
    }

    #[tokio::test]
    async fn persists_only_new_rows_with_run_date() {
        let store = MemoryStore::with_records(vec![AssignmentRecord::new("1", "X", "2024-05-01")]);
        let outcome = reconcile(
            &store,
            &batch(&[("1", "Y"), ("2", "X")]),
            date!(2024 - 05 - 15),
            true,
        )
        .await
        .unwrap();

        assert_eq!(outcome.already_recorded, 1);
        assert!(outcome.persisted);
        let rows = store.list_assignments(None).await.unwrap();
        assert_eq!(
            rows,
            vec![
                AssignmentRecord::new("1", "X", "2024-05-01"),
                AssignmentRecord::new("2", "X", "2024-05-15"),
            ]
        );
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let store = MemoryStore::new();
        let outcome = reconcile(&store, &batch(&[("1", "X")]), date!(2024 - 05 - 15), false)
            .await
            .unwrap();
        assert_eq!(outcome.fresh.len(), 1);
        assert!(!outcome.persisted);
        assert!(store.list_assignments(None).await.unwrap().is_empty());
    }

    #[test]
    fn record_date_is_iso() {
        let a = Assignment {
            contact_id: ContactId::from("5"),
            label: GroupLabel::from("Control"),
            assigned_on: date!(2024 - 01 - 02),
        };
        assert_eq!(to_record(&a), AssignmentRecord::new("5", "Control", "2024-01-02"));
    }
}
