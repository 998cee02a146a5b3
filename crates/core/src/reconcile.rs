//! Pure half of the Assignment Reconciler.
//!
//! Given what is already recorded, decide which batch entries are new. The
//! read of the recorded IDs and the append of the result belong to the
//! caller; see `cohort_pipeline::reconcile`.

use std::collections::HashSet;

use time::Date;

use crate::model::{Assignment, AssignmentBatch, ContactId};

/// Batch entries whose contact ID is absent from `existing`, stamped with `assigned_on`.
///
/// A contact ID is emitted at most once even if the batch repeats it.
pub fn new_assignments(
    batch: &AssignmentBatch,
    existing: &HashSet<ContactId>,
    assigned_on: Date,
) -> Vec<Assignment> {
    let mut emitted: HashSet<&ContactId> = HashSet::new();
    batch
        .iter()
        .filter(|(id, _)| !existing.contains(*id) && emitted.insert(*id))
        .map(|(id, label)| Assignment {
            contact_id: id.clone(),
            label: label.clone(),
            assigned_on,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupLabel;
    use time::macros::date;

    fn batch(entries: &[(&str, &str)]) -> AssignmentBatch {
        entries
            .iter()
            .map(|(id, label)| (ContactId::from(*id), GroupLabel::from(*label)))
            .collect()
    }

    #[test]
    fn previously_recorded_ids_are_skipped() {
        let b = batch(&[("1", "X"), ("2", "Y"), ("3", "X")]);
        let existing: HashSet<ContactId> = ["2".into()].into_iter().collect();
        let fresh = new_assignments(&b, &existing, date!(2024 - 05 - 15));

        let got: Vec<(&str, &str)> = fresh
            .iter()
            .map(|a| (a.contact_id.as_str(), a.label.as_str()))
            .collect();
        assert_eq!(got, vec![("1", "X"), ("3", "X")]);
        assert!(fresh.iter().all(|a| a.assigned_on == date!(2024 - 05 - 15)));
    }

    #[test]
    fn everything_recorded_yields_nothing() {
        let b = batch(&[("1", "X"), ("2", "Y")]);
        let existing: HashSet<ContactId> = ["1".into(), "2".into()].into_iter().collect();
        assert!(new_assignments(&b, &existing, date!(2024 - 05 - 15)).is_empty());
    }

    #[test]
    fn repeated_batch_ids_emitted_once() {
        let b = batch(&[("1", "X"), ("1", "Y")]);
        let fresh = new_assignments(&b, &HashSet::new(), date!(2024 - 05 - 15));
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].label.as_str(), "X");
    }
}
