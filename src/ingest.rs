//! Ingestion pipeline orchestration.
//!
//! Coordinates one full run: sources → normalization → batch dedup →
//! cross-reference against stored rows → date window → description fetch →
//! description filter → table sync → CSV snapshot → retention cleanup.
//!
//! Everything runs sequentially on one task. Only an unreachable database is
//! fatal; every other failure is reported on the progress stream and the run
//! carries on with the next page, job or table.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::dedup::{dedup_batch, KnownJobs};
use crate::export;
use crate::filter::{detect_language, within_window, FilterRules};
use crate::migrate;
use crate::models::JobPosting;
use crate::normalize::normalize;
use crate::progress::ProgressReporter;
use crate::retention;
use crate::store;
use crate::traits::SourceRegistry;

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cards_scraped: usize,
    pub unique_cards: usize,
    pub new_jobs: usize,
    pub skipped_by_date: usize,
    pub descriptions_fetched: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub errors: usize,
    pub inserted_accepted: u64,
    pub inserted_rejected: u64,
    pub hidden_stale: u64,
}

/// Run the pipeline against the database named in `config`.
pub async fn run_pipeline(
    config: &Config,
    sources: &SourceRegistry,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let pool = db::connect(config)
        .await
        .context("Error! cannot create the database connection")?;

    let result = run_with_pool(&pool, config, sources, progress, Local::now().naive_local()).await;
    pool.close().await;
    result
}

/// Run the pipeline on an open pool with an explicit clock.
pub async fn run_with_pool(
    pool: &SqlitePool,
    config: &Config,
    sources: &SourceRegistry,
    progress: &dyn ProgressReporter,
    now: NaiveDateTime,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let jobs_table = config.jobs_tablename.as_str();
    let filtered_table = config.filtered_jobs_tablename.as_str();

    for table in [jobs_table, filtered_table] {
        verify_table(pool, table, progress).await;
    }

    // Scrape
    if sources.is_empty() {
        progress.warn("No sources configured, nothing to scrape");
    }
    let mut batch = Vec::new();
    for source in sources.sources() {
        progress.info(&format!("Scraping source: {}", source.source_name()));
        match source.get_job_cards(progress).await {
            Ok(cards) => batch.extend(
                cards
                    .into_iter()
                    .map(|card| normalize(card, source.source_name())),
            ),
            Err(e) => progress.error(&format!(
                "Source {} failed: {:#}",
                source.source_name(),
                e
            )),
        }
    }
    summary.cards_scraped = batch.len();

    let batch = dedup_batch(batch);
    summary.unique_cards = batch.len();
    progress.info(&format!(
        "Total job cards after removing duplicates: {}",
        batch.len()
    ));

    let known = KnownJobs::load(pool, &[jobs_table, filtered_table]).await?;
    let new_jobs = known.retain_new(batch);
    summary.new_jobs = new_jobs.len();
    progress.info(&format!(
        "Total new jobs found after comparing to the database: {}",
        new_jobs.len()
    ));

    if new_jobs.is_empty() {
        progress.info("No jobs found");
    } else {
        let rules = FilterRules::from_config(config);
        let described = describe_jobs(new_jobs, config, sources, &rules, progress, now, &mut summary).await;

        let (mut accepted, mut rejected) = rules.split_by_description(described);
        summary.accepted = accepted.len();
        summary.rejected = rejected.len();
        progress.info(&format!("Total jobs to add: {}", accepted.len()));
        progress.info(&format!(
            "Total jobs filtered out by description: {}",
            rejected.len()
        ));

        for job in accepted.iter_mut().chain(rejected.iter_mut()) {
            job.date_loaded = Some(now);
        }

        summary.inserted_accepted = sync_or_report(pool, jobs_table, &accepted, progress).await;
        summary.inserted_rejected =
            sync_or_report(pool, filtered_table, &rejected, progress).await;

        export_or_report(config, jobs_table, &accepted, progress);
        export_or_report(config, filtered_table, &rejected, progress);
    }

    if config.retention_enabled() {
        match retention::hide_stale_jobs(pool, jobs_table, config.delete_unapplied_jobs_after_days, now)
            .await
        {
            Ok(hidden) => {
                summary.hidden_stale = hidden;
                progress.ok(&format!(
                    "Hid {} unapplied jobs older than {} days",
                    hidden, config.delete_unapplied_jobs_after_days
                ));
            }
            Err(e) => progress.error(&format!("Retention cleanup failed: {:#}", e)),
        }
    }

    report_summary(&summary, progress);
    Ok(summary)
}

async fn verify_table(pool: &SqlitePool, table: &str, progress: &dyn ProgressReporter) {
    match migrate::verify_schema(pool, table).await {
        Ok(report) => {
            for column in &report.added {
                progress.ok(&format!("Added {} column to {} table", column, table));
            }
            for (column, error) in &report.failed {
                progress.warn(&format!(
                    "Could not add {} column to {} table: {}",
                    column, table, error
                ));
            }
        }
        Err(e) => progress.warn(&format!("Error verifying table schema of {}: {:#}", table, e)),
    }
}

/// Fetch descriptions for the jobs inside the date window.
async fn describe_jobs(
    jobs: Vec<JobPosting>,
    config: &Config,
    sources: &SourceRegistry,
    rules: &FilterRules,
    progress: &dyn ProgressReporter,
    now: NaiveDateTime,
    summary: &mut RunSummary,
) -> Vec<JobPosting> {
    let mut described = Vec::with_capacity(jobs.len());

    for mut job in jobs {
        if !within_window(&job.date, config.days_to_scrape, now) {
            summary.skipped_by_date += 1;
            continue;
        }

        let Some(source) = sources.find(&job.source) else {
            summary.errors += 1;
            progress.error(&format!(
                "No source registered for {} ({})",
                job.source, job.job_url
            ));
            continue;
        };

        progress.info(&format!(
            "Found new job: {} at {} {}",
            job.title, job.company, job.job_url
        ));

        match source.get_job_description(&job.job_url, progress).await {
            Ok(description) => job.job_description = description,
            Err(e) => {
                summary.errors += 1;
                progress.error(&format!("Failed to process job {}: {:#}", job.job_url, e));
                continue;
            }
        }
        summary.descriptions_fetched += 1;

        let language = detect_language(&job.job_description);
        if !rules.language_allowed(&language) {
            progress.warn(&format!(
                "Job description language not supported: {}",
                language
            ));
        }

        described.push(job);
    }

    described
}

async fn sync_or_report(
    pool: &SqlitePool,
    table: &str,
    jobs: &[JobPosting],
    progress: &dyn ProgressReporter,
) -> u64 {
    match store::sync_table(pool, table, jobs, progress).await {
        Ok(added) => added,
        Err(e) => {
            progress.error(&format!("Failed to sync {} table: {:#}", table, e));
            0
        }
    }
}

fn export_or_report(config: &Config, table: &str, jobs: &[JobPosting], progress: &dyn ProgressReporter) {
    let path = config.csv_path(table);
    match export::write_csv(&path, jobs) {
        Ok(()) => progress.info(&format!("Wrote {} jobs to {}", jobs.len(), path.display())),
        Err(e) => progress.warn(&format!("Could not write {}: {:#}", path.display(), e)),
    }
}

fn report_summary(summary: &RunSummary, progress: &dyn ProgressReporter) {
    progress.info("Run summary:");
    progress.info(&format!("  cards scraped: {}", summary.cards_scraped));
    progress.info(&format!("  unique cards: {}", summary.unique_cards));
    progress.info(&format!("  new jobs: {}", summary.new_jobs));
    progress.info(&format!("  skipped by date: {}", summary.skipped_by_date));
    progress.info(&format!("  descriptions fetched: {}", summary.descriptions_fetched));
    progress.info(&format!("  accepted: {}", summary.accepted));
    progress.info(&format!("  rejected: {}", summary.rejected));
    progress.info(&format!("  rows inserted (accepted): {}", summary.inserted_accepted));
    progress.info(&format!("  rows inserted (rejected): {}", summary.inserted_rejected));
    if summary.hidden_stale > 0 {
        progress.info(&format!("  hidden as stale: {}", summary.hidden_stale));
    }
    if summary.errors > 0 {
        progress.warn(&format!("{} jobs failed and were skipped", summary.errors));
    }
}
