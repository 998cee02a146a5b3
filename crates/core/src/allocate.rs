//! Participant Allocator: seeded shuffle followed by a balanced split.
//!
//! The shuffle uses a seeded [`StdRng`], so a fixed seed and a fixed input
//! order always produce the same partition.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::AllocationError;
use crate::model::{AssignmentBatch, ContactId};
use crate::variant::GroupLabels;

/// Sizes for splitting `total` items into `parts` contiguous slices.
///
/// The first `total % parts` slices get one extra item, so sizes differ by
/// at most one. Returns an empty vector when `parts` is zero.
pub fn split_sizes(total: usize, parts: usize) -> Vec<usize> {
    if parts == 0 {
        return Vec::new();
    }
    let base = total / parts;
    let extra = total % parts;
    (0..parts)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

/// Partition `ids` across `labels`.
///
/// Every ID lands in exactly one group. Slice `i` of the shuffled sequence
/// goes to `labels[i]`. With fewer IDs than labels the trailing groups are
/// simply empty.
pub fn allocate(
    ids: &[ContactId],
    labels: &GroupLabels,
    seed: u64,
) -> Result<AssignmentBatch, AllocationError> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id) {
            return Err(AllocationError::DuplicateContact {
                contact_id: id.to_string(),
            });
        }
    }

    let mut shuffled = ids.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let mut batch = AssignmentBatch::new();
    let mut remaining = shuffled.into_iter();
    for (label, size) in labels.iter().zip(split_sizes(ids.len(), labels.len())) {
        for id in remaining.by_ref().take(size) {
            batch.push(id, label.clone());
        }
    }

    for (label, size) in batch.group_sizes() {
        tracing::info!(group = %label, size, "allocated group");
    }
    Ok(batch)
}
