//! `cohort allocate`: preview a partition without touching any store.

use std::path::Path;
use std::process;

use cohort_core::{allocate, ContactId, GroupLabels};

use crate::{report_error, OutputFormat};

pub(crate) fn cmd_allocate(
    input: &Path,
    labels: &[String],
    seed: u64,
    output: OutputFormat,
    quiet: bool,
) {
    let labels = match GroupLabels::new(labels.iter().cloned()) {
        Ok(l) => l,
        Err(e) => {
            report_error(&format!("invalid labels: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let text = match std::fs::read_to_string(input) {
        Ok(t) => t,
        Err(e) => {
            let msg = format!("error reading '{}': {}", input.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    let ids = match read_ids(&text) {
        Ok(ids) => ids,
        Err(msg) => {
            report_error(&format!("error reading '{}': {}", input.display(), msg), output, quiet);
            process::exit(1);
        }
    };

    let batch = match allocate(&ids, &labels, seed) {
        Ok(b) => b,
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    };

    match output {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = batch
                .iter()
                .map(|(id, label)| serde_json::json!({ "contact_id": id, "group": label }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows).unwrap_or_default());
        }
        OutputFormat::Text => {
            println!("VanID,Group");
            for (id, label) in batch.iter() {
                println!("{},{}", id, label);
            }
        }
    }
}

/// Contact IDs from either a bare list (one per line) or a CSV whose header
/// contains a `VanID` column.
fn read_ids(text: &str) -> Result<Vec<ContactId>, String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first = text.lines().next().unwrap_or_default();
    if !first.contains(',') && first.trim() != "VanID" {
        return Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ContactId::from)
            .collect());
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let column = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .position(|h| h == "VanID")
        .ok_or_else(|| "CSV input has no VanID column".to_string())?;

    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        if let Some(id) = record.get(column).filter(|v| !v.is_empty()) {
            ids.push(ContactId::from(id));
        }
    }
    Ok(ids)
}
