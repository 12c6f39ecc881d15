//! Additive schema verification.
//!
//! Tables are created lazily from the first batch written to them, so an
//! older database may lack columns that later versions write or that the
//! front end reads. [`verify_schema`] adds any missing column with
//! `ALTER TABLE ... ADD COLUMN`. It never drops, renames or rewrites
//! anything.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::db::quote_ident;
use crate::store;

/// Columns every job table is expected to carry, with the definition used
/// when one has to be added.
pub const EXPECTED_COLUMNS: &[(&str, &str)] = &[
    ("title", "TEXT"),
    ("company", "TEXT"),
    ("location", "TEXT"),
    ("date", "TEXT"),
    ("job_url", "TEXT"),
    ("job_description", "TEXT"),
    ("source", "TEXT DEFAULT 'linkedin'"),
    ("applied", "INTEGER DEFAULT 0"),
    ("saved", "INTEGER DEFAULT 0"),
    ("interview", "INTEGER DEFAULT 0"),
    ("rejected", "INTEGER DEFAULT 0"),
    ("hidden", "INTEGER DEFAULT 0"),
    ("date_loaded", "TIMESTAMP"),
    ("cover_letter", "TEXT"),
    ("resume", "TEXT"),
];

/// Outcome of a schema verification pass.
#[derive(Debug, Default)]
pub struct SchemaReport {
    pub added: Vec<String>,
    /// `(column, error)` for every ALTER that failed.
    pub failed: Vec<(String, String)>,
}

pub async fn table_columns(pool: &SqlitePool, table: &str) -> Result<Vec<String>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(table)))
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to read columns of {}", table))?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("name").map_err(Into::into))
        .collect()
}

/// Add every column of [`EXPECTED_COLUMNS`] missing from `table`.
///
/// A table that does not exist yet is left alone. A failing ALTER is
/// recorded in the report and the remaining columns are still attempted.
pub async fn verify_schema(pool: &SqlitePool, table: &str) -> Result<SchemaReport> {
    let mut report = SchemaReport::default();
    if !store::table_exists(pool, table).await? {
        return Ok(report);
    }

    let existing = table_columns(pool, table).await?;

    for (column, definition) in EXPECTED_COLUMNS {
        if existing.iter().any(|c| c == column) {
            continue;
        }
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(table),
            quote_ident(column),
            definition
        );
        match sqlx::query(&sql).execute(pool).await {
            Ok(_) => report.added.push(column.to_string()),
            Err(e) => {
                warn!(table, column, error = %e, "failed to add column");
                report.failed.push((column.to_string(), e.to_string()));
            }
        }
    }

    Ok(report)
}
