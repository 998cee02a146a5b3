//! `cohort history`: what the assignment store already holds.

use std::collections::BTreeMap;
use std::path::Path;
use std::process;

use cohort_storage::{AssignmentRecord, AssignmentStore, JsonLinesStore};

use crate::config::{read_config, resolve_store_path};
use crate::{report_error, OutputFormat};

pub(crate) fn cmd_history(config_path: &Path, label: Option<&str>, output: OutputFormat, quiet: bool) {
    let config = match read_config(config_path) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    let store = JsonLinesStore::new(resolve_store_path(config_path, &config));

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start runtime: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let rows = match rt.block_on(store.list_assignments(label)) {
        Ok(rows) => rows,
        Err(e) => {
            let msg = format!(
                "could not read assignments from '{}': {}",
                store.path().display(),
                e
            );
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let counts = count_by_label(&rows);
    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "assignments": rows,
                "counts": counts,
            });
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Text => {
            for row in &rows {
                println!("{}\t{}\t{}", row.contact_id, row.group_label, row.assigned_on);
            }
            if !quiet {
                let summary: Vec<String> = counts
                    .iter()
                    .map(|(label, n)| format!("{}={}", label, n))
                    .collect();
                println!("{} assignments: {}", rows.len(), summary.join(" "));
            }
        }
    }
}

fn count_by_label(rows: &[AssignmentRecord]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row.group_label.as_str()).or_insert(0) += 1;
    }
    counts
}
