use std::future::Future;

use super::{row, TestResult};
use crate::AssignmentStore;

pub(super) async fn run_append_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "append",
            "fresh_store_is_empty",
            fresh_store_is_empty(factory).await,
        ),
        TestResult::from_result(
            "append",
            "append_then_ids_visible",
            append_then_ids_visible(factory).await,
        ),
        TestResult::from_result(
            "append",
            "append_reports_row_count",
            append_reports_row_count(factory).await,
        ),
        TestResult::from_result(
            "append",
            "empty_append_is_noop",
            empty_append_is_noop(factory).await,
        ),
        TestResult::from_result(
            "append",
            "successive_appends_accumulate",
            successive_appends_accumulate(factory).await,
        ),
        TestResult::from_result(
            "append",
            "record_fields_round_trip",
            record_fields_round_trip(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

/// A new store has no IDs and no rows.
async fn fresh_store_is_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ids = s.existing_contact_ids().await.map_err(|e| e.to_string())?;
    if !ids.is_empty() {
        return Err(format!("expected no ids, got {}", ids.len()));
    }
    let rows = s.list_assignments(None).await.map_err(|e| e.to_string())?;
    if !rows.is_empty() {
        return Err(format!("expected no rows, got {}", rows.len()));
    }
    Ok(())
}

async fn append_then_ids_visible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append_assignments(&[row("1", "Strive"), row("2", "Control")])
        .await
        .map_err(|e| e.to_string())?;

    let ids = s.existing_contact_ids().await.map_err(|e| e.to_string())?;
    if !(ids.contains("1") && ids.contains("2") && ids.len() == 2) {
        return Err(format!("expected {{1, 2}}, got {:?}", ids));
    }
    Ok(())
}

async fn append_reports_row_count<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let n = s
        .append_assignments(&[row("1", "X"), row("2", "X"), row("3", "Y")])
        .await
        .map_err(|e| e.to_string())?;
    if n != 3 {
        return Err(format!("expected 3 rows written, got {}", n));
    }
    Ok(())
}

async fn empty_append_is_noop<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let n = s.append_assignments(&[]).await.map_err(|e| e.to_string())?;
    if n != 0 {
        return Err(format!("expected 0 rows written, got {}", n));
    }
    let rows = s.list_assignments(None).await.map_err(|e| e.to_string())?;
    if !rows.is_empty() {
        return Err(format!("expected no rows, got {}", rows.len()));
    }
    Ok(())
}

async fn successive_appends_accumulate<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append_assignments(&[row("1", "X")])
        .await
        .map_err(|e| e.to_string())?;
    s.append_assignments(&[row("2", "Y")])
        .await
        .map_err(|e| e.to_string())?;
    let rows = s.list_assignments(None).await.map_err(|e| e.to_string())?;
    if rows.len() != 2 {
        return Err(format!("expected 2 rows, got {}", rows.len()));
    }
    Ok(())
}

/// Every column written is read back unchanged.
async fn record_fields_round_trip<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let written = crate::AssignmentRecord::new("000123", "Wednesday Anytime Action", "2024-02-29");
    s.append_assignments(std::slice::from_ref(&written))
        .await
        .map_err(|e| e.to_string())?;
    let rows = s.list_assignments(None).await.map_err(|e| e.to_string())?;
    match rows.as_slice() {
        [only] if *only == written => Ok(()),
        other => Err(format!("expected [{:?}], got {:?}", written, other)),
    }
}
