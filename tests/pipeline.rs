//! End-to-end runs of the ingestion pipeline against an in-memory source.
//!
//! The source never touches the network, so these tests exercise dedup,
//! filtering, table sync and retention exactly as a real run would, and can
//! also observe which detail pages the pipeline asked for.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDateTime};
use jobsweep::config::Config;
use jobsweep::connector_linkedin::DESCRIPTION_NOT_FETCHED;
use jobsweep::db;
use jobsweep::ingest::run_pipeline;
use jobsweep::models::{JobCard, JobPosting, StatusFlags};
use jobsweep::progress::{Level, ProgressReporter, RecordingProgress};
use jobsweep::store;
use jobsweep::traits::{JobSource, SourceRegistry};
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ─── Test Source ────────────────────────────────────────────────────

/// Serves fixed cards and descriptions, and records every description
/// request it receives.
struct InMemorySource {
    cards: Vec<JobCard>,
    descriptions: HashMap<String, String>,
    failing_urls: Vec<String>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl InMemorySource {
    fn new(cards: Vec<JobCard>) -> Self {
        Self {
            cards,
            descriptions: HashMap::new(),
            failing_urls: Vec::new(),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn describe(mut self, url: &str, description: &str) -> Self {
        self.descriptions
            .insert(url.to_string(), description.to_string());
        self
    }

    fn fail_on(mut self, url: &str) -> Self {
        self.failing_urls.push(url.to_string());
        self
    }

    fn requests(&self) -> Arc<Mutex<Vec<String>>> {
        self.requested.clone()
    }
}

#[async_trait]
impl JobSource for InMemorySource {
    fn source_name(&self) -> &str {
        "linkedin"
    }

    async fn get_job_cards(&self, _progress: &dyn ProgressReporter) -> Result<Vec<JobCard>> {
        Ok(self.cards.clone())
    }

    async fn get_job_description(
        &self,
        job_url: &str,
        _progress: &dyn ProgressReporter,
    ) -> Result<String> {
        self.requested.lock().unwrap().push(job_url.to_string());
        if self.failing_urls.iter().any(|u| u == job_url) {
            bail!("connection reset while reading {}", job_url);
        }
        Ok(self
            .descriptions
            .get(job_url)
            .cloned()
            .unwrap_or_else(|| "A regular engineering role.".to_string()))
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn days_ago(days: i64) -> String {
    (now() - Duration::days(days))
        .date()
        .format("%Y-%m-%d")
        .to_string()
}

fn card(title: &str, company: &str, url: &str, date: &str) -> JobCard {
    JobCard {
        title: title.to_string(),
        company: company.to_string(),
        location: "Remote".to_string(),
        date: date.to_string(),
        job_url: url.to_string(),
    }
}

fn test_config(tmp: &TempDir, extra: serde_json::Value) -> Config {
    let mut value = json!({
        "db_path": tmp.path().join("data").join("jobs.db"),
        "export_dir": tmp.path().join("out"),
        "days_to_scrape": 10,
        "search_queries": [],
    });
    if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(value).unwrap()
}

fn registry(source: InMemorySource) -> SourceRegistry {
    let mut sources = SourceRegistry::new();
    sources.register(Box::new(source));
    sources
}

async fn open(config: &Config) -> SqlitePool {
    db::connect(config).await.unwrap()
}

async fn urls_in(pool: &SqlitePool, table: &str) -> Vec<String> {
    if !store::table_exists(pool, table).await.unwrap() {
        return Vec::new();
    }
    sqlx::query_scalar(&format!("SELECT job_url FROM {} ORDER BY id", table))
        .fetch_all(pool)
        .await
        .unwrap()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_intra_batch_duplicates_collapse_to_one_row() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, json!({}));
    let today = days_ago(0);
    let source = InMemorySource::new(vec![
        card("Backend Engineer", "Acme", "https://x/1", &today),
        card("Backend Engineer", "Acme", "https://x/2", &today),
    ]);

    let summary = run_pipeline(&config, &registry(source), &RecordingProgress::new())
        .await
        .unwrap();
    assert_eq!(summary.cards_scraped, 2);
    assert_eq!(summary.unique_cards, 1);
    assert_eq!(summary.inserted_accepted, 1);

    let pool = open(&config).await;
    assert_eq!(urls_in(&pool, "jobs").await, vec!["https://x/1".to_string()]);
    pool.close().await;
}

#[tokio::test]
async fn test_banned_description_lands_in_rejected_table() {
    let tmp = TempDir::new().unwrap();
    // Title/company filters would also match; placement still follows the
    // description keyword.
    let config = test_config(
        &tmp,
        json!({
            "desc_words": ["unpaid"],
            "title_include": ["intern"],
            "company_exclude": ["nobody"],
        }),
    );
    let today = days_ago(0);
    let source = InMemorySource::new(vec![
        card("Summer Intern", "Acme", "https://x/unpaid", &today),
        card("Platform Intern", "Globex", "https://x/paid", &today),
    ])
    .describe("https://x/unpaid", "This is an unpaid internship")
    .describe("https://x/paid", "This is a paid internship");

    let summary = run_pipeline(&config, &registry(source), &RecordingProgress::new())
        .await
        .unwrap();
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.rejected, 1);

    let pool = open(&config).await;
    assert_eq!(urls_in(&pool, "jobs").await, vec!["https://x/paid".to_string()]);
    assert_eq!(
        urls_in(&pool, "filtered_jobs").await,
        vec!["https://x/unpaid".to_string()]
    );
    pool.close().await;
}

#[tokio::test]
async fn test_stale_card_skipped_before_detail_fetch() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, json!({ "days_to_scrape": 10 }));
    let source = InMemorySource::new(vec![
        card("Old Role", "Acme", "https://x/old", &days_ago(15)),
        card("Bad Date", "Acme", "https://x/bad", "last tuesday"),
        card("Fresh Role", "Acme", "https://x/new", &days_ago(2)),
    ]);
    let requests = source.requests();

    let summary = run_pipeline(&config, &registry(source), &RecordingProgress::new())
        .await
        .unwrap();
    assert_eq!(summary.skipped_by_date, 2);
    assert_eq!(
        *requests.lock().unwrap(),
        vec!["https://x/new".to_string()]
    );
}

#[tokio::test]
async fn test_known_url_excluded_from_new_jobs() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, json!({}));
    let today = days_ago(0);

    let pool = open(&config).await;
    let existing = JobPosting {
        title: "Original Title".to_string(),
        company: "Acme".to_string(),
        date: days_ago(3),
        job_url: "https://linkedin.com/jobs/view/123/".to_string(),
        source: "linkedin".to_string(),
        date_loaded: Some(now()),
        ..Default::default()
    };
    store::create_table(&pool, "jobs", &[existing]).await.unwrap();
    pool.close().await;

    let source = InMemorySource::new(vec![card(
        "Retitled Role",
        "Acme",
        "https://linkedin.com/jobs/view/123/",
        &today,
    )]);
    let requests = source.requests();

    let summary = run_pipeline(&config, &registry(source), &RecordingProgress::new())
        .await
        .unwrap();
    assert_eq!(summary.new_jobs, 0);
    assert!(requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_known_triple_excluded_when_url_missing() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, json!({}));
    let today = days_ago(0);

    let pool = open(&config).await;
    let existing = JobPosting {
        title: "Backend Engineer".to_string(),
        company: "Acme".to_string(),
        date: today.clone(),
        job_url: "https://x/1".to_string(),
        source: "linkedin".to_string(),
        date_loaded: Some(now()),
        ..Default::default()
    };
    store::create_table(&pool, "filtered_jobs", &[existing])
        .await
        .unwrap();
    pool.close().await;

    let source = InMemorySource::new(vec![card("Backend Engineer", "Acme", "", &today)]);
    let summary = run_pipeline(&config, &registry(source), &RecordingProgress::new())
        .await
        .unwrap();
    assert_eq!(summary.new_jobs, 0);
}

#[tokio::test]
async fn test_second_run_inserts_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, json!({ "desc_words": ["unpaid"] }));
    let today = days_ago(0);
    let cards = vec![
        card("Backend Engineer", "Acme", "https://x/1", &today),
        card("Data Engineer", "Globex", "https://x/2", &today),
        card("Intern", "Initech", "https://x/3", &today),
    ];

    let first_source =
        InMemorySource::new(cards.clone()).describe("https://x/3", "An unpaid position");
    let first = run_pipeline(&config, &registry(first_source), &RecordingProgress::new())
        .await
        .unwrap();
    assert_eq!(first.inserted_accepted, 2);
    assert_eq!(first.inserted_rejected, 1);

    let second_source =
        InMemorySource::new(cards).describe("https://x/3", "An unpaid position");
    let requests = second_source.requests();
    let second = run_pipeline(&config, &registry(second_source), &RecordingProgress::new())
        .await
        .unwrap();
    assert_eq!(second.new_jobs, 0);
    assert_eq!(second.inserted_accepted, 0);
    assert_eq!(second.inserted_rejected, 0);
    // Rejected postings are not fetched again either.
    assert!(requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_job_is_counted_and_run_continues() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, json!({}));
    let today = days_ago(0);
    let source = InMemorySource::new(vec![
        card("Alpha Engineer", "Acme", "https://x/a", &today),
        card("Beta Engineer", "Acme", "https://x/b", &today),
    ])
    .fail_on("https://x/a");
    let progress = RecordingProgress::new();

    let summary = run_pipeline(&config, &registry(source), &progress)
        .await
        .unwrap();
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.inserted_accepted, 1);
    assert!(progress.contains(Level::Error, "https://x/a"));

    let pool = open(&config).await;
    assert_eq!(urls_in(&pool, "jobs").await, vec!["https://x/b".to_string()]);
    pool.close().await;
}

#[tokio::test]
async fn test_unfetched_description_still_accepted() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, json!({ "desc_words": ["unpaid"] }));
    let source = InMemorySource::new(vec![card("Dev", "Acme", "https://x/gone", &days_ago(0))])
        .describe("https://x/gone", DESCRIPTION_NOT_FETCHED);

    let summary = run_pipeline(&config, &registry(source), &RecordingProgress::new())
        .await
        .unwrap();
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.inserted_accepted, 1);

    let pool = open(&config).await;
    let stored: String =
        sqlx::query_scalar("SELECT job_description FROM jobs WHERE job_url = 'https://x/gone'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(stored, DESCRIPTION_NOT_FETCHED);
    pool.close().await;
}

#[tokio::test]
async fn test_retention_hides_stale_unapplied_rows() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, json!({ "delete_unapplied_jobs_after_days": 30 }));

    let pool = open(&config).await;
    let loaded = now() - Duration::days(35);
    let stale = JobPosting {
        title: "Stale".to_string(),
        company: "Acme".to_string(),
        job_url: "https://x/stale".to_string(),
        date_loaded: Some(loaded),
        ..Default::default()
    };
    let applied = JobPosting {
        title: "Applied".to_string(),
        company: "Acme".to_string(),
        job_url: "https://x/applied".to_string(),
        flags: StatusFlags {
            applied: true,
            ..Default::default()
        },
        date_loaded: Some(loaded),
        ..Default::default()
    };
    store::create_table(&pool, "jobs", &[stale, applied])
        .await
        .unwrap();
    pool.close().await;

    let summary = run_pipeline(
        &config,
        &registry(InMemorySource::new(vec![])),
        &RecordingProgress::new(),
    )
    .await
    .unwrap();
    assert_eq!(summary.hidden_stale, 1);

    let pool = open(&config).await;
    let hidden: Vec<String> = sqlx::query_scalar("SELECT job_url FROM jobs WHERE hidden = 1")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(hidden, vec!["https://x/stale".to_string()]);
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(total, 2);
    pool.close().await;
}

#[tokio::test]
async fn test_schema_migrated_before_sync() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, json!({}));

    let pool = open(&config).await;
    sqlx::query(
        "CREATE TABLE jobs (id INTEGER PRIMARY KEY AUTOINCREMENT, title TEXT, company TEXT, \
         location TEXT, date TEXT, job_url TEXT, job_description TEXT, applied INTEGER, \
         interview INTEGER, rejected INTEGER, date_loaded TEXT)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO jobs (title, company, date, job_url, applied) VALUES ('Old', 'Acme', '2020-01-01', 'https://x/old', 1)")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let source = InMemorySource::new(vec![card("New Role", "Acme", "https://x/new", &days_ago(0))]);
    let progress = RecordingProgress::new();
    let summary = run_pipeline(&config, &registry(source), &progress)
        .await
        .unwrap();
    assert_eq!(summary.inserted_accepted, 1);
    assert!(progress.contains(Level::Ok, "Added source column to jobs table"));

    let pool = open(&config).await;
    assert_eq!(
        urls_in(&pool, "jobs").await,
        vec!["https://x/old".to_string(), "https://x/new".to_string()]
    );
    let old_source: String =
        sqlx::query_scalar("SELECT source FROM jobs WHERE job_url = 'https://x/old'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(old_source, "linkedin");
    pool.close().await;
}

#[tokio::test]
async fn test_csv_snapshots_written() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, json!({}));
    let source = InMemorySource::new(vec![card("Dev", "Acme", "https://x/1", &days_ago(1))]);

    run_pipeline(&config, &registry(source), &RecordingProgress::new())
        .await
        .unwrap();

    let accepted = std::fs::read_to_string(config.csv_path("jobs")).unwrap();
    assert!(accepted.contains("https://x/1"));
    let rejected = std::fs::read_to_string(config.csv_path("filtered_jobs")).unwrap();
    assert_eq!(rejected.lines().count(), 1);
}

#[tokio::test]
async fn test_empty_registry_warns_and_finishes() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp, json!({}));
    let progress = RecordingProgress::new();

    let summary = run_pipeline(&config, &SourceRegistry::new(), &progress)
        .await
        .unwrap();
    assert_eq!(summary.cards_scraped, 0);
    assert!(progress.contains(Level::Warning, "No sources configured"));
    assert!(progress.contains(Level::Info, "No jobs found"));
}

#[tokio::test]
async fn test_unopenable_database_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, "file, not a directory").unwrap();
    let config: Config = serde_json::from_value(json!({
        "db_path": blocker.join("jobs.db"),
        "export_dir": tmp.path(),
    }))
    .unwrap();

    let result = run_pipeline(
        &config,
        &registry(InMemorySource::new(vec![])),
        &RecordingProgress::new(),
    )
    .await;
    assert!(result.is_err());
}
