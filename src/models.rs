//! Core data models used throughout jobsweep.
//!
//! These types represent the job cards and postings that flow through the
//! ingestion pipeline, plus the loosely typed record shape used when a batch
//! is written to SQLite.

use chrono::NaiveDateTime;

/// Lightweight posting summary parsed from a search-results page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobCard {
    pub title: String,
    pub company: String,
    pub location: String,
    /// Source-reported posting date, expected as `YYYY-MM-DD`.
    pub date: String,
    /// Canonical external identifier. Empty for malformed cards.
    pub job_url: String,
}

/// Independent status flags. Several may be set at once; a posting can be
/// both applied and rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub applied: bool,
    pub saved: bool,
    pub interview: bool,
    pub rejected: bool,
    pub hidden: bool,
}

/// Full canonical record, including the fetched description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    pub date: String,
    pub job_url: String,
    pub job_description: String,
    pub source: String,
    pub flags: StatusFlags,
    /// Stamped at sync time.
    pub date_loaded: Option<NaiveDateTime>,
}

/// Fallback identity of a posting: `(title, company, date)`.
pub type DedupKey = (String, String, String);

impl JobPosting {
    pub fn dedup_key(&self) -> DedupKey {
        (self.title.clone(), self.company.clone(), self.date.clone())
    }

    /// Column/value pairs in the order they are written to a table.
    pub fn to_record(&self) -> Vec<(&'static str, FieldValue)> {
        let flag = |b: bool| FieldValue::Integer(b as i64);
        vec![
            ("title", FieldValue::Text(self.title.clone())),
            ("company", FieldValue::Text(self.company.clone())),
            ("location", FieldValue::Text(self.location.clone())),
            ("date", FieldValue::Text(self.date.clone())),
            ("job_url", FieldValue::Text(self.job_url.clone())),
            (
                "job_description",
                FieldValue::Text(self.job_description.clone()),
            ),
            ("source", FieldValue::Text(self.source.clone())),
            ("applied", flag(self.flags.applied)),
            ("saved", flag(self.flags.saved)),
            ("interview", flag(self.flags.interview)),
            ("rejected", flag(self.flags.rejected)),
            ("hidden", flag(self.flags.hidden)),
            (
                "date_loaded",
                self.date_loaded
                    .map(FieldValue::Timestamp)
                    .unwrap_or(FieldValue::Null),
            ),
        ]
    }
}

/// A single cell of a record about to be written.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
    Timestamp(NaiveDateTime),
    Null,
}

/// Format `date_loaded` is written with.
pub const LOADED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

impl FieldValue {
    /// SQLite column type inferred from a value.
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldValue::Integer(_) => "INTEGER",
            FieldValue::Timestamp(_) => "TIMESTAMP",
            FieldValue::Text(_) | FieldValue::Null => "TEXT",
        }
    }
}
