use std::future::Future;
use std::sync::Arc;

use super::{row, TestResult};
use crate::{AssignmentStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "racing_appends_of_one_contact_exactly_one_wins",
            racing_appends_of_one_contact_exactly_one_wins(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "racing_appends_of_distinct_contacts_all_succeed",
            racing_appends_of_distinct_contacts_all_succeed(factory).await,
        ),
    ]
}

// ── Racing appends ───────────────────────────────────────────────────────────

/// N tasks each try to record the same contact under a different label.
/// Exactly one append succeeds; the rest must get DuplicateContact.
async fn racing_appends_of_one_contact_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            let label = format!("group-{i}");
            let result = s.append_assignments(&[row("contested", &label)]).await;
            result
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.map_err(|e| format!("join: {e}"))? {
            Ok(_) => wins += 1,
            Err(StorageError::DuplicateContact { .. }) => {}
            Err(e) => return Err(format!("unexpected error: {e}")),
        }
    }
    if wins != 1 {
        return Err(format!("expected exactly 1 winning append, got {wins}"));
    }

    let rows = store
        .list_assignments(None)
        .await
        .map_err(|e| e.to_string())?;
    if rows.len() != 1 {
        return Err(format!("expected 1 stored row, got {}", rows.len()));
    }
    Ok(())
}

async fn racing_appends_of_distinct_contacts_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            let contact = format!("contact-{i}");
            let result = s.append_assignments(&[row(&contact, "X")]).await;
            result
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("join: {e}"))?
            .map_err(|e| format!("append: {e}"))?;
    }

    let ids = store
        .existing_contact_ids()
        .await
        .map_err(|e| e.to_string())?;
    if ids.len() != N {
        return Err(format!("expected {N} ids, got {}", ids.len()));
    }
    Ok(())
}

// ── Two handles, one table ───────────────────────────────────────────────────

/// Rounds of racing in the shared-backing tests.
const ROUNDS: usize = 25;

pub(super) async fn run_shared_backing_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = (S, S)>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "append_through_one_handle_visible_to_other",
            append_through_one_handle_visible_to_other(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "racing_handles_record_each_contact_once",
            racing_handles_record_each_contact_once(factory).await,
        ),
    ]
}

async fn append_through_one_handle_visible_to_other<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = (S, S)>,
{
    let (first, second) = factory().await;
    first
        .append_assignments(&[row("1", "X")])
        .await
        .map_err(|e| e.to_string())?;
    match second.append_assignments(&[row("1", "Y")]).await {
        Err(StorageError::DuplicateContact { .. }) => {}
        Err(e) => return Err(format!("expected DuplicateContact, got {e}")),
        Ok(n) => return Err(format!("second handle re-recorded the contact ({n} rows)")),
    }
    let ids = second
        .existing_contact_ids()
        .await
        .map_err(|e| e.to_string())?;
    if !ids.contains("1") {
        return Err("second handle does not see the first handle's row".to_string());
    }
    Ok(())
}

/// Each round, every task tries to record the same contact, alternating
/// between the two handles. Exactly one append per round may succeed.
async fn racing_handles_record_each_contact_once<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = (S, S)>,
{
    let (first, second) = factory().await;
    let handles = [Arc::new(first), Arc::new(second)];

    for round in 0..ROUNDS {
        let contact = format!("contested-{round}");
        let mut tasks = Vec::new();
        for i in 0..N {
            let s = handles[i % 2].clone();
            let contact = contact.clone();
            tasks.push(tokio::spawn(async move {
                let label = format!("group-{i}");
                let result = s.append_assignments(&[row(&contact, &label)]).await;
                result
            }));
        }

        let mut wins = 0;
        for task in tasks {
            match task.await.map_err(|e| format!("join: {e}"))? {
                Ok(_) => wins += 1,
                Err(StorageError::DuplicateContact { .. }) => {}
                Err(e) => return Err(format!("round {round}: unexpected error: {e}")),
            }
        }
        if wins != 1 {
            return Err(format!("round {round}: expected 1 winning append, got {wins}"));
        }
    }

    let rows = handles[0]
        .list_assignments(None)
        .await
        .map_err(|e| e.to_string())?;
    if rows.len() != ROUNDS {
        return Err(format!("expected {ROUNDS} stored rows, got {}", rows.len()));
    }
    Ok(())
}
