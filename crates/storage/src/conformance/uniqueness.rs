use std::future::Future;

use super::{row, TestResult};
use crate::{AssignmentStore, StorageError};

pub(super) async fn run_uniqueness_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "uniqueness",
            "stored_id_rejected",
            stored_id_rejected(factory).await,
        ),
        TestResult::from_result(
            "uniqueness",
            "stored_id_rejected_under_other_label",
            stored_id_rejected_under_other_label(factory).await,
        ),
        TestResult::from_result(
            "uniqueness",
            "repeated_id_within_append_rejected",
            repeated_id_within_append_rejected(factory).await,
        ),
        TestResult::from_result(
            "uniqueness",
            "rejected_append_writes_nothing",
            rejected_append_writes_nothing(factory).await,
        ),
        TestResult::from_result(
            "uniqueness",
            "duplicate_error_names_contact",
            duplicate_error_names_contact(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn stored_id_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append_assignments(&[row("1", "X")])
        .await
        .map_err(|e| e.to_string())?;
    match s.append_assignments(&[row("1", "X")]).await {
        Err(StorageError::DuplicateContact { .. }) => Ok(()),
        Err(e) => Err(format!("expected DuplicateContact, got {e}")),
        Ok(n) => Err(format!("expected DuplicateContact, append wrote {n} rows")),
    }
}

/// The key is the contact alone: a different label does not make a new row legal.
async fn stored_id_rejected_under_other_label<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append_assignments(&[row("1", "Strive")])
        .await
        .map_err(|e| e.to_string())?;
    match s.append_assignments(&[row("1", "Control")]).await {
        Err(StorageError::DuplicateContact { .. }) => Ok(()),
        Err(e) => Err(format!("expected DuplicateContact, got {e}")),
        Ok(n) => Err(format!("expected DuplicateContact, append wrote {n} rows")),
    }
}

async fn repeated_id_within_append_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.append_assignments(&[row("7", "X"), row("7", "Y")]).await {
        Err(StorageError::DuplicateContact { .. }) => Ok(()),
        Err(e) => Err(format!("expected DuplicateContact, got {e}")),
        Ok(n) => Err(format!("expected DuplicateContact, append wrote {n} rows")),
    }
}

/// A rejected append is all-or-nothing: its fresh rows are not written either.
async fn rejected_append_writes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append_assignments(&[row("1", "X")])
        .await
        .map_err(|e| e.to_string())?;
    let _ = s
        .append_assignments(&[row("2", "X"), row("1", "Y"), row("3", "Y")])
        .await;

    let ids = s.existing_contact_ids().await.map_err(|e| e.to_string())?;
    if ids.len() != 1 || !ids.contains("1") {
        return Err(format!("expected only {{1}} after rejected append, got {:?}", ids));
    }
    Ok(())
}

async fn duplicate_error_names_contact<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append_assignments(&[row("42", "X")])
        .await
        .map_err(|e| e.to_string())?;
    match s.append_assignments(&[row("41", "X"), row("42", "X")]).await {
        Err(StorageError::DuplicateContact { contact_id }) if contact_id == "42" => Ok(()),
        Err(e) => Err(format!("expected DuplicateContact for 42, got {e}")),
        Ok(n) => Err(format!("expected DuplicateContact, append wrote {n} rows")),
    }
}
