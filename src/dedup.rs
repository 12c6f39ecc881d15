//! Duplicate elimination.
//!
//! Two passes run on every batch:
//!
//! - [`dedup_batch`] collapses postings within the freshly scraped batch
//!   that share `(title, company)`. URL and date are ignored, so a role
//!   reposted under a new URL collapses into its first occurrence.
//! - [`KnownJobs`] holds the identities already persisted in the accepted
//!   and rejected tables. A posting is known when its non-empty `job_url`
//!   or its `(title, company, date)` triple matches any stored row.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashSet;

use crate::models::{DedupKey, JobPosting};
use crate::store;

/// Sort by `(title, company)` and keep the first of each run of equal keys.
pub fn dedup_batch(mut jobs: Vec<JobPosting>) -> Vec<JobPosting> {
    // Stable sort keeps scrape order inside each group, so "first" is the
    // first card seen.
    jobs.sort_by(|a, b| (&a.title, &a.company).cmp(&(&b.title, &b.company)));
    jobs.dedup_by(|later, first| later.title == first.title && later.company == first.company);
    jobs
}

/// Identities of postings already stored in either table.
#[derive(Debug, Default)]
pub struct KnownJobs {
    urls: HashSet<String>,
    keys: HashSet<DedupKey>,
}

impl KnownJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load identities from every table in `tables` that exists.
    pub async fn load(pool: &SqlitePool, tables: &[&str]) -> Result<Self> {
        let mut known = Self::new();
        for table in tables {
            if !store::table_exists(pool, table).await? {
                continue;
            }
            for identity in store::load_identities(pool, table).await? {
                known.insert_parts(identity.job_url, identity.key);
            }
        }
        Ok(known)
    }

    pub fn insert(&mut self, job: &JobPosting) {
        self.insert_parts(job.job_url.clone(), job.dedup_key());
    }

    fn insert_parts(&mut self, job_url: String, key: DedupKey) {
        if !job_url.is_empty() {
            self.urls.insert(job_url);
        }
        self.keys.insert(key);
    }

    pub fn contains(&self, job: &JobPosting) -> bool {
        (!job.job_url.is_empty() && self.urls.contains(&job.job_url))
            || self.keys.contains(&job.dedup_key())
    }

    /// Keep only postings not already known.
    pub fn retain_new(&self, jobs: Vec<JobPosting>) -> Vec<JobPosting> {
        jobs.into_iter().filter(|job| !self.contains(job)).collect()
    }
}
