//! Conformance test suite for `AssignmentStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `AssignmentStore` implementation can run to verify correctness. The
//! suite covers:
//!
//! - **Append**: rows become visible, counts are reported, empty appends are no-ops
//! - **Uniqueness**: already-stored and repeated IDs are rejected, all-or-nothing
//! - **Query**: label filtering and insertion order
//! - **Concurrency**: racing appends of one contact admit exactly one
//!
//! [`run_shared_backing_suite`] repeats the racing checks across two handles
//! opened on the same backing table, which is how two concurrent runs see it.
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use cohort_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn warehouse_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_warehouse_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod append;
mod concurrent;
mod query;
mod uniqueness;

use std::fmt;
use std::future::Future;

use crate::record::AssignmentRecord;
use crate::AssignmentStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "append", "uniqueness").
    pub category: String,
    /// Test name (e.g. "append_then_ids_visible").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(append::run_append_tests(&factory).await);
    results.extend(uniqueness::run_uniqueness_tests(&factory).await);
    results.extend(query::run_query_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

/// Run the multi-handle checks against a store.
///
/// The `factory` opens a fresh, empty table and returns two independent
/// handles onto it. Appends through either handle must observe the other.
pub async fn run_shared_backing_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: AssignmentStore,
    F: Fn() -> Fut,
    Fut: Future<Output = (S, S)>,
{
    let results = concurrent::run_shared_backing_tests(&factory).await;
    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn row(contact_id: &str, group_label: &str) -> AssignmentRecord {
    AssignmentRecord::new(contact_id, group_label, "2025-01-01")
}
