//! Create-or-append sync of posting batches into SQLite tables.
//!
//! The first batch written to a table defines it: column types are inferred
//! from the batch's values and an auto-incrementing `id` is added. Later
//! batches only append rows whose `(title, company, date)` is not already
//! present, which makes repeated runs idempotent on that key.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};
use std::collections::HashSet;

use crate::db::quote_ident;
use crate::filter::FilterRules;
use crate::models::{DedupKey, FieldValue, JobPosting, StatusFlags, LOADED_AT_FORMAT};
use crate::progress::ProgressReporter;
use crate::retention::parse_loaded_at;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name = ?",
    )
    .bind(table)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Identity columns of a stored row.
#[derive(Debug, Clone)]
pub struct StoredIdentity {
    pub job_url: String,
    pub key: DedupKey,
}

fn text(row: &SqliteRow, column: &str) -> Result<String> {
    Ok(row
        .try_get::<Option<String>, _>(column)?
        .unwrap_or_default())
}

pub async fn load_identities(pool: &SqlitePool, table: &str) -> Result<Vec<StoredIdentity>> {
    let rows = sqlx::query(&format!(
        "SELECT CAST(job_url AS TEXT) AS job_url, CAST(title AS TEXT) AS title, \
         CAST(company AS TEXT) AS company, CAST(date AS TEXT) AS date FROM {}",
        quote_ident(table)
    ))
    .fetch_all(pool)
    .await
    .with_context(|| format!("Failed to read existing rows of {}", table))?;

    rows.iter()
        .map(|row| {
            Ok(StoredIdentity {
                job_url: text(row, "job_url")?,
                key: (text(row, "title")?, text(row, "company")?, text(row, "date")?),
            })
        })
        .collect()
}

async fn existing_keys(pool: &SqlitePool, table: &str) -> Result<HashSet<DedupKey>> {
    Ok(load_identities(pool, table)
        .await?
        .into_iter()
        .map(|identity| identity.key)
        .collect())
}

/// Column name and SQLite type for each field, taken from the first
/// non-null value in the batch.
pub fn infer_column_types(records: &[Vec<(&'static str, FieldValue)>]) -> Vec<(&'static str, &'static str)> {
    let Some(first) = records.first() else {
        return Vec::new();
    };
    first
        .iter()
        .enumerate()
        .map(|(idx, (column, _))| {
            let sql_type = records
                .iter()
                .map(|record| &record[idx].1)
                .find(|value| **value != FieldValue::Null)
                .map(FieldValue::sql_type)
                .unwrap_or("TEXT");
            (*column, sql_type)
        })
        .collect()
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &FieldValue) -> SqliteQuery<'q> {
    match value {
        FieldValue::Integer(v) => query.bind(*v),
        FieldValue::Text(v) => query.bind(v.clone()),
        FieldValue::Timestamp(v) => query.bind(v.format(LOADED_AT_FORMAT).to_string()),
        FieldValue::Null => query.bind(None::<String>),
    }
}

async fn insert_jobs(pool: &SqlitePool, table: &str, jobs: &[&JobPosting]) -> Result<u64> {
    if jobs.is_empty() {
        return Ok(0);
    }
    let records: Vec<_> = jobs.iter().map(|job| job.to_record()).collect();
    let columns: Vec<String> = records[0].iter().map(|(c, _)| quote_ident(c)).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        columns.join(", "),
        placeholders
    );

    let mut tx = pool.begin().await?;
    for record in &records {
        let mut query = sqlx::query(&sql);
        for (_, value) in record {
            query = bind_value(query, value);
        }
        query
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert into {}", table))?;
    }
    tx.commit().await?;

    Ok(records.len() as u64)
}

/// Create `table` from the shape of `jobs` and insert all of them.
pub async fn create_table(pool: &SqlitePool, table: &str, jobs: &[JobPosting]) -> Result<u64> {
    let records: Vec<_> = jobs.iter().map(|job| job.to_record()).collect();
    let columns = if records.is_empty() {
        infer_column_types(&[JobPosting::default().to_record()])
    } else {
        infer_column_types(&records)
    };

    let column_defs: Vec<String> = columns
        .iter()
        .map(|(name, sql_type)| format!("{} {}", quote_ident(name), sql_type))
        .collect();
    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
        quote_ident(table),
        column_defs.join(", ")
    );
    sqlx::query(&sql)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create table {}", table))?;

    let refs: Vec<&JobPosting> = jobs.iter().collect();
    insert_jobs(pool, table, &refs).await
}

/// Append the postings whose `(title, company, date)` is not yet in `table`.
pub async fn append_new(pool: &SqlitePool, table: &str, jobs: &[JobPosting]) -> Result<u64> {
    let mut seen = existing_keys(pool, table).await?;
    let fresh: Vec<&JobPosting> = jobs
        .iter()
        .filter(|job| seen.insert(job.dedup_key()))
        .collect();
    insert_jobs(pool, table, &fresh).await
}

/// Create `table` from `jobs` if it does not exist, otherwise append the new
/// rows. Returns the number of rows inserted.
pub async fn sync_table(
    pool: &SqlitePool,
    table: &str,
    jobs: &[JobPosting],
    progress: &dyn ProgressReporter,
) -> Result<u64> {
    if jobs.is_empty() {
        progress.info(&format!("No new records to add to the {} table", table));
        return Ok(0);
    }

    if table_exists(pool, table).await? {
        let added = append_new(pool, table, jobs).await?;
        if added > 0 {
            progress.ok(&format!("Added {} new records to the {} table", added, table));
        } else {
            progress.info(&format!("No new records to add to the {} table", table));
        }
        Ok(added)
    } else {
        let added = create_table(pool, table, jobs).await?;
        progress.ok(&format!(
            "Created the {} table and added {} records",
            table, added
        ));
        Ok(added)
    }
}

/// A persisted posting together with its row id.
#[derive(Debug, Clone)]
pub struct StoredJob {
    pub id: i64,
    pub job: JobPosting,
}

/// Read the non-hidden rows of `table`, newest first, and apply the live
/// filter stages of `rules`.
pub async fn read_visible_jobs(
    pool: &SqlitePool,
    table: &str,
    rules: &FilterRules,
) -> Result<Vec<StoredJob>> {
    if !table_exists(pool, table).await? {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(&format!(
        "SELECT id, CAST(title AS TEXT) AS title, CAST(company AS TEXT) AS company, \
         CAST(location AS TEXT) AS location, CAST(date AS TEXT) AS date, \
         CAST(job_url AS TEXT) AS job_url, CAST(job_description AS TEXT) AS job_description, \
         CAST(source AS TEXT) AS source, \
         COALESCE(applied, 0) AS applied, COALESCE(saved, 0) AS saved, \
         COALESCE(interview, 0) AS interview, COALESCE(rejected, 0) AS rejected, \
         COALESCE(hidden, 0) AS hidden, CAST(date_loaded AS TEXT) AS date_loaded \
         FROM {} WHERE COALESCE(hidden, 0) = 0 ORDER BY id DESC",
        quote_ident(table)
    ))
    .fetch_all(pool)
    .await
    .with_context(|| format!("Failed to read {}", table))?;

    let mut jobs = Vec::with_capacity(rows.len());
    for row in &rows {
        let flag = |column: &str| -> Result<bool> { Ok(row.try_get::<i64, _>(column)? != 0) };
        let job = JobPosting {
            title: text(row, "title")?,
            company: text(row, "company")?,
            location: text(row, "location")?,
            date: text(row, "date")?,
            job_url: text(row, "job_url")?,
            job_description: text(row, "job_description")?,
            source: text(row, "source")?,
            flags: StatusFlags {
                applied: flag("applied")?,
                saved: flag("saved")?,
                interview: flag("interview")?,
                rejected: flag("rejected")?,
                hidden: flag("hidden")?,
            },
            date_loaded: row
                .try_get::<Option<String>, _>("date_loaded")?
                .as_deref()
                .and_then(parse_loaded_at),
        };
        if rules.passes_live(&job) {
            jobs.push(StoredJob {
                id: row.try_get("id")?,
                job,
            });
        }
    }
    Ok(jobs)
}
