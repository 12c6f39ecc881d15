//! Age-based hiding of stale, untouched postings.
//!
//! Rows the user never applied to or saved are hidden once their
//! `date_loaded` is older than the configured threshold. Rows are only ever
//! flagged `hidden = 1`, never deleted.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeDelta};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::db::quote_ident;
use crate::store;

/// Timestamp layouts `date_loaded` has been written with.
const LOADED_AT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

pub fn parse_loaded_at(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    LOADED_AT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Hide rows of `table` with `applied = 0`, `saved = 0`, not already hidden,
/// and a parseable `date_loaded` more than `days` days before `now`.
///
/// Rows whose timestamp cannot be parsed are left alone. Returns the number
/// of rows hidden; `days <= 0` disables cleanup.
pub async fn hide_stale_jobs(
    pool: &SqlitePool,
    table: &str,
    days: i64,
    now: NaiveDateTime,
) -> Result<u64> {
    if days <= 0 || !store::table_exists(pool, table).await? {
        return Ok(0);
    }
    // A threshold past the representable calendar has no stale rows.
    let Some(cutoff) = TimeDelta::try_days(days).and_then(|age| now.checked_sub_signed(age)) else {
        debug!(table, days, "retention threshold out of range, nothing to hide");
        return Ok(0);
    };

    let rows = sqlx::query(&format!(
        "SELECT id, CAST(date_loaded AS TEXT) AS date_loaded FROM {} \
         WHERE COALESCE(applied, 0) = 0 AND COALESCE(saved, 0) = 0 \
         AND COALESCE(hidden, 0) != 1 AND date_loaded IS NOT NULL",
        quote_ident(table)
    ))
    .fetch_all(pool)
    .await
    .with_context(|| format!("Failed to scan {} for stale jobs", table))?;

    let mut stale_ids = Vec::new();
    for row in &rows {
        let id: i64 = row.try_get("id")?;
        let loaded: Option<String> = row.try_get("date_loaded")?;
        match loaded.as_deref().and_then(parse_loaded_at) {
            Some(loaded_at) if loaded_at < cutoff => stale_ids.push(id),
            Some(_) => {}
            None => debug!(table, id, "unparseable date_loaded, skipping"),
        }
    }

    if stale_ids.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["?"; stale_ids.len()].join(", ");
    let sql = format!(
        "UPDATE {} SET hidden = 1 WHERE id IN ({})",
        quote_ident(table),
        placeholders
    );
    let mut query = sqlx::query(&sql);
    for id in &stale_ids {
        query = query.bind(*id);
    }
    let result = query
        .execute(pool)
        .await
        .with_context(|| format!("Failed to hide stale jobs in {}", table))?;

    Ok(result.rows_affected())
}
