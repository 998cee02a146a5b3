use std::future::Future;

use super::{row, TestResult};
use crate::AssignmentStore;

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "query",
            "list_filters_by_label",
            list_filters_by_label(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_unknown_label_is_empty",
            list_unknown_label_is_empty(factory).await,
        ),
        TestResult::from_result(
            "query",
            "list_preserves_insertion_order",
            list_preserves_insertion_order(factory).await,
        ),
    ]
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn list_filters_by_label<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append_assignments(&[row("1", "Strive"), row("2", "Control"), row("3", "Strive")])
        .await
        .map_err(|e| e.to_string())?;
    let strive = s
        .list_assignments(Some("Strive"))
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = strive.iter().map(|r| r.contact_id.as_str()).collect();
    if ids != ["1", "3"] {
        return Err(format!("expected [1, 3], got {:?}", ids));
    }
    Ok(())
}

async fn list_unknown_label_is_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append_assignments(&[row("1", "Strive")])
        .await
        .map_err(|e| e.to_string())?;
    let rows = s
        .list_assignments(Some("Voicemail"))
        .await
        .map_err(|e| e.to_string())?;
    if !rows.is_empty() {
        return Err(format!("expected no rows, got {}", rows.len()));
    }
    Ok(())
}

async fn list_preserves_insertion_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for id in ["c", "a", "b"] {
        s.append_assignments(&[row(id, "X")])
            .await
            .map_err(|e| e.to_string())?;
    }
    let rows = s.list_assignments(None).await.map_err(|e| e.to_string())?;
    let ids: Vec<&str> = rows.iter().map(|r| r.contact_id.as_str()).collect();
    if ids != ["c", "a", "b"] {
        return Err(format!("expected [c, a, b], got {:?}", ids));
    }
    Ok(())
}
