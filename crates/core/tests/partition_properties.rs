//! Partition invariants checked over a grid of input sizes, group counts and seeds.

use std::collections::{HashMap, HashSet};

use cohort_core::{allocate, new_assignments, ContactId, GroupLabels};
use time::macros::date;

fn ids(n: usize) -> Vec<ContactId> {
    (0..n).map(|i| ContactId::new(format!("van-{i}"))).collect()
}

fn labels(n: usize) -> GroupLabels {
    GroupLabels::new((0..n).map(|i| format!("group-{i}"))).expect("labels")
}

#[test]
fn every_id_assigned_exactly_once() {
    for n_ids in [0, 1, 2, 5, 7, 10, 31, 100] {
        for n_groups in 1..=4 {
            for seed in [0, 10, 99] {
                let input = ids(n_ids);
                let batch = allocate(&input, &labels(n_groups), seed).expect("allocate");

                let mut counts: HashMap<&ContactId, usize> = HashMap::new();
                for (id, _) in batch.iter() {
                    *counts.entry(id).or_default() += 1;
                }
                assert_eq!(counts.len(), n_ids, "ids={n_ids} groups={n_groups}");
                assert!(counts.values().all(|&c| c == 1));
                let input_set: HashSet<&ContactId> = input.iter().collect();
                let output_set: HashSet<&ContactId> = counts.keys().copied().collect();
                assert_eq!(input_set, output_set);
            }
        }
    }
}

#[test]
fn group_sizes_differ_by_at_most_one() {
    for n_ids in [1, 4, 10, 11, 12, 50] {
        for n_groups in 1..=5 {
            let groups = labels(n_groups);
            let batch = allocate(&ids(n_ids), &groups, 7).expect("allocate");
            let sizes: Vec<usize> = groups.iter().map(|l| batch.ids_for(l).len()).collect();
            let max = sizes.iter().max().copied().unwrap_or(0);
            let min = sizes.iter().min().copied().unwrap_or(0);
            assert!(max - min <= 1, "ids={n_ids} groups={n_groups} sizes={sizes:?}");
            assert_eq!(sizes.iter().sum::<usize>(), n_ids);
        }
    }
}

#[test]
fn ten_ids_three_groups_sizes() {
    let groups = labels(3);
    let batch = allocate(&ids(10), &groups, 10).expect("allocate");
    let mut sizes: Vec<usize> = groups.iter().map(|l| batch.ids_for(l).len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![3, 3, 4]);
}

#[test]
fn repeated_runs_are_identical() {
    let input = ids(25);
    let groups = labels(3);
    let runs: Vec<_> = (0..5)
        .map(|_| allocate(&input, &groups, 10).expect("allocate"))
        .collect();
    assert!(runs.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn different_seeds_usually_differ() {
    let input = ids(40);
    let groups = labels(2);
    let a = allocate(&input, &groups, 1).expect("allocate");
    let b = allocate(&input, &groups, 2).expect("allocate");
    assert_ne!(a, b);
}

#[test]
fn reconciling_twice_inserts_nothing_the_second_time() {
    let input = ids(9);
    let batch = allocate(&input, &labels(3), 10).expect("allocate");
    let day = date!(2024 - 05 - 15);

    let mut recorded: HashSet<ContactId> = HashSet::new();
    let first = new_assignments(&batch, &recorded, day);
    assert_eq!(first.len(), 9);
    recorded.extend(first.into_iter().map(|a| a.contact_id));

    let again = allocate(&input, &labels(3), 10).expect("allocate");
    assert!(new_assignments(&again, &recorded, day).is_empty());
}
