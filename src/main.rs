//! # jobsweep CLI
//!
//! Runs one ingestion pass: scrape the configured job boards, drop what is
//! already stored, fetch descriptions, filter, and sync into SQLite.
//!
//! ## Usage
//!
//! ```bash
//! jobsweep [CONFIG] [--list]
//! ```
//!
//! `CONFIG` defaults to `config.json`. Progress is written line by line to
//! stdout; diagnostics go to stderr and are controlled by `RUST_LOG`.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobsweep::config;
use jobsweep::db;
use jobsweep::filter::FilterRules;
use jobsweep::ingest;
use jobsweep::progress::{ProgressReporter, StdoutProgress};
use jobsweep::store;
use jobsweep::traits::SourceRegistry;

/// jobsweep: scrape, dedup, filter and sync job postings into SQLite.
#[derive(Parser)]
#[command(name = "jobsweep", version, about)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(default_value = "config.json")]
    config: PathBuf,

    /// Print the visible accepted jobs (live filters applied) and exit
    /// without scraping.
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,jobsweep=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if cli.list {
        return list_jobs(&cli.config).await;
    }

    let progress = StdoutProgress;
    let started = Instant::now();
    let result = scrape(&cli.config, &progress).await;
    let elapsed = started.elapsed().as_secs_f64();

    match &result {
        Ok(()) => progress.ok(&format!("Scraping finished in {:.2} seconds", elapsed)),
        Err(e) => progress.error(&format!(
            "Scraping failed after {:.2} seconds: {:#}",
            elapsed, e
        )),
    }
    result
}

async fn scrape(config_path: &Path, progress: &dyn ProgressReporter) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    tracing::info!(config = %config_path.display(), "configuration loaded");

    let sources = SourceRegistry::from_config(&cfg)?;
    progress.info(&format!("Starting job scrape with {} source(s)", sources.len()));

    ingest::run_pipeline(&cfg, &sources, progress).await?;
    Ok(())
}

async fn list_jobs(config_path: &Path) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let pool = db::connect(&cfg).await?;
    let rules = FilterRules::from_config(&cfg);
    let jobs = store::read_visible_jobs(&pool, &cfg.jobs_tablename, &rules).await;
    pool.close().await;

    let jobs = jobs?;
    println!("{:<6} {:<10} {:<40} {:<30} URL", "ID", "DATE", "TITLE", "COMPANY");
    for stored in &jobs {
        println!(
            "{:<6} {:<10} {:<40} {:<30} {}",
            stored.id,
            stored.job.date,
            truncate(&stored.job.title, 40),
            truncate(&stored.job.company, 30),
            stored.job.job_url
        );
    }
    println!("{} visible jobs", jobs.len());
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
