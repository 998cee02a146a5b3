//! Append-only assignment table in a JSON-lines file.
//!
//! One `AssignmentRecord` per line. A missing file is an empty table. File
//! I/O is synchronous and runs under `spawn_blocking`. Appends hold an
//! exclusive advisory lock on a sidecar `<file>.lock` for the whole
//! read-check-append, so separate handles and separate processes writing
//! the same table are serialized.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs4::fs_std::FileExt;

use crate::error::StorageError;
use crate::record::AssignmentRecord;
use crate::traits::{ensure_new, AssignmentStore};

#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    path: PathBuf,
}

impl JsonLinesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonLinesStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_all(path: &Path) -> Result<Vec<AssignmentRecord>, StorageError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(StorageError::Backend(format!(
                "could not open '{}': {}",
                path.display(),
                e
            )))
        }
    };

    let mut rows = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: AssignmentRecord =
            serde_json::from_str(&line).map_err(|e| StorageError::Corrupt {
                line: index + 1,
                message: e.to_string(),
            })?;
        rows.push(record);
    }
    Ok(rows)
}

fn append_rows(path: &Path, records: &[AssignmentRecord]) -> Result<(), StorageError> {
    let mut buf = String::new();
    for record in records {
        let line =
            serde_json::to_string(record).map_err(|e| StorageError::Backend(e.to_string()))?;
        buf.push_str(&line);
        buf.push('\n');
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(buf.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Exclusive lock on the table, released when the returned file is dropped.
fn lock_table(path: &Path) -> Result<File, StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let lock_file = lock_path(path);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_file)?;
    FileExt::lock_exclusive(&file).map_err(|e| {
        StorageError::Backend(format!("could not lock '{}': {}", lock_file.display(), e))
    })?;
    Ok(file)
}

async fn blocking<T, F>(f: F) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Backend(format!("task join error: {}", e)))?
}

#[async_trait]
impl AssignmentStore for JsonLinesStore {
    async fn existing_contact_ids(&self) -> Result<HashSet<String>, StorageError> {
        let path = self.path.clone();
        blocking(move || {
            Ok(read_all(&path)?
                .into_iter()
                .map(|r| r.contact_id)
                .collect())
        })
        .await
    }

    async fn append_assignments(
        &self,
        records: &[AssignmentRecord],
    ) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }
        let path = self.path.clone();
        let records = records.to_vec();
        blocking(move || {
            let _lock = lock_table(&path)?;
            let existing: HashSet<String> = read_all(&path)?
                .into_iter()
                .map(|r| r.contact_id)
                .collect();
            ensure_new(&existing, &records)?;
            append_rows(&path, &records)?;
            tracing::debug!(path = %path.display(), rows = records.len(), "appended assignments");
            Ok(records.len())
        })
        .await
    }

    async fn list_assignments(
        &self,
        group_label: Option<&str>,
    ) -> Result<Vec<AssignmentRecord>, StorageError> {
        let path = self.path.clone();
        let rows = blocking(move || read_all(&path)).await?;
        Ok(rows
            .into_iter()
            .filter(|r| group_label.map_or(true, |g| r.group_label == g))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::{run_conformance_suite, run_shared_backing_suite};

    #[tokio::test]
    async fn jsonl_store_conformance() {
        let dir = tempfile::tempdir().unwrap();
        let counter = std::sync::atomic::AtomicUsize::new(0);
        let report = run_conformance_suite(|| {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let path = dir.path().join(format!("store-{n}.jsonl"));
            async move { JsonLinesStore::new(path) }
        })
        .await;
        assert!(report.failed == 0, "{report}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn jsonl_handles_on_one_file_conformance() {
        let dir = tempfile::tempdir().unwrap();
        let counter = std::sync::atomic::AtomicUsize::new(0);
        let report = run_shared_backing_suite(|| {
            let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let path = dir.path().join(format!("shared-{n}.jsonl"));
            async move { (JsonLinesStore::new(&path), JsonLinesStore::new(&path)) }
        })
        .await;
        assert!(report.failed == 0, "{report}");
        assert!(report.total > 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn separate_handles_never_double_record_a_contact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assignments.jsonl");
        let first = std::sync::Arc::new(JsonLinesStore::new(&path));
        let second = std::sync::Arc::new(JsonLinesStore::new(&path));

        for round in 0..50 {
            let contact = format!("contact-{round}");
            let (a, b) = (first.clone(), second.clone());
            let (ca, cb) = (contact.clone(), contact.clone());
            let left = tokio::spawn(async move {
                let result = a
                    .append_assignments(&[AssignmentRecord::new(ca, "X", "2024-05-15")])
                    .await;
                result
            });
            let right = tokio::spawn(async move {
                let result = b
                    .append_assignments(&[AssignmentRecord::new(cb, "Y", "2024-05-15")])
                    .await;
                result
            });
            let wins = [left.await.unwrap(), right.await.unwrap()]
                .iter()
                .filter(|r| r.is_ok())
                .count();
            assert_eq!(wins, 1, "round {round}");
        }

        let rows = first.list_assignments(None).await.unwrap();
        assert_eq!(rows.len(), 50);
        assert!(dir.path().join("assignments.jsonl.lock").exists());
    }

    #[tokio::test]
    async fn missing_file_is_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonLinesStore::new(dir.path().join("nested").join("none.jsonl"));
        assert!(store.existing_contact_ids().await.unwrap().is_empty());
        assert!(store.list_assignments(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assignments.jsonl");
        let store = JsonLinesStore::new(&path);
        store
            .append_assignments(&[AssignmentRecord::new("9", "Strive", "2024-05-15")])
            .await
            .unwrap();

        let reopened = JsonLinesStore::new(&path);
        let rows = reopened.list_assignments(None).await.unwrap();
        assert_eq!(rows, vec![AssignmentRecord::new("9", "Strive", "2024-05-15")]);
    }

    #[tokio::test]
    async fn corrupt_line_reported_with_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assignments.jsonl");
        std::fs::write(
            &path,
            "{\"contact_id\":\"1\",\"group_label\":\"X\",\"assigned_on\":\"2024-05-15\"}\nnot json\n",
        )
        .unwrap();
        let err = JsonLinesStore::new(&path)
            .existing_contact_ids()
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { line: 2, .. }));
    }
}
