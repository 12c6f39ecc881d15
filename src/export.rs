//! CSV snapshots of a run's accepted and rejected postings.
//!
//! Written next to the database writes at the end of a run so the batch can
//! be inspected without opening SQLite.

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::{FieldValue, JobPosting, LOADED_AT_FORMAT};

fn cell(value: &FieldValue) -> String {
    match value {
        FieldValue::Integer(v) => v.to_string(),
        FieldValue::Text(v) => v.clone(),
        FieldValue::Timestamp(v) => v.format(LOADED_AT_FORMAT).to_string(),
        FieldValue::Null => String::new(),
    }
}

/// Write `jobs` to `path` with a header row, replacing any existing file.
pub fn write_csv(path: &Path, jobs: &[JobPosting]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let header: Vec<&str> = JobPosting::default()
        .to_record()
        .iter()
        .map(|(column, _)| *column)
        .collect();
    writer.write_record(&header)?;

    for job in jobs {
        let row: Vec<String> = job.to_record().iter().map(|(_, v)| cell(v)).collect();
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
