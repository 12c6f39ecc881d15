use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::traits::KNOWN_SOURCES;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    #[serde(default)]
    pub search_queries: Vec<SearchQueryConfig>,
    #[serde(default = "default_pages_to_scrape")]
    pub pages_to_scrape: u32,
    #[serde(default = "default_timespan")]
    pub timespan: String,
    #[serde(default = "default_days_to_scrape")]
    pub days_to_scrape: i64,

    #[serde(default)]
    pub desc_words: Vec<String>,
    #[serde(default)]
    pub title_exclude: Vec<String>,
    #[serde(default)]
    pub title_include: Vec<String>,
    #[serde(default)]
    pub company_exclude: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,

    #[serde(default)]
    pub delete_unapplied_jobs_after_days: i64,

    #[serde(default = "default_jobs_tablename")]
    pub jobs_tablename: String,
    #[serde(default = "default_filtered_jobs_tablename")]
    pub filtered_jobs_tablename: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub proxies: HashMap<String, String>,
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
}

/// One search sweep against a job board.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SearchQueryConfig {
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub location: String,
    /// Work-type code (on-site / remote / hybrid). Configs carry it as
    /// either a string or a number.
    #[serde(rename = "f_WT", default, deserialize_with = "string_or_number")]
    pub work_type: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay_secs: 1,
            timeout_secs: 5,
        }
    }
}

fn default_rounds() -> u32 {
    1
}
fn default_pages_to_scrape() -> u32 {
    10
}
fn default_timespan() -> String {
    "r84600".to_string()
}
fn default_days_to_scrape() -> i64 {
    7
}
fn default_jobs_tablename() -> String {
    "jobs".to_string()
}
fn default_filtered_jobs_tablename() -> String {
    "filtered_jobs".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/jobs.db")
}
fn default_sources() -> Vec<String> {
    vec!["linkedin".to_string()]
}
fn default_export_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    1
}
fn default_timeout_secs() -> u64 {
    5
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

impl Config {
    /// Proxy URL for outgoing requests, preferring the `https` entry.
    pub fn proxy(&self) -> Option<&str> {
        self.proxies
            .get("https")
            .or_else(|| self.proxies.get("http"))
            .map(String::as_str)
    }

    /// Whether retention cleanup runs at all.
    pub fn retention_enabled(&self) -> bool {
        self.delete_unapplied_jobs_after_days > 0
    }

    /// Path of the CSV artifact for a table.
    pub fn csv_path(&self, table: &str) -> PathBuf {
        self.export_dir.join(format!("{}.csv", table))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config =
        serde_json::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.jobs_tablename.trim().is_empty() {
        anyhow::bail!("jobs_tablename must not be empty");
    }
    if config.filtered_jobs_tablename.trim().is_empty() {
        anyhow::bail!("filtered_jobs_tablename must not be empty");
    }
    if config.jobs_tablename == config.filtered_jobs_tablename {
        anyhow::bail!(
            "jobs_tablename and filtered_jobs_tablename must differ (both are '{}')",
            config.jobs_tablename
        );
    }

    if config.fetch.retries == 0 {
        anyhow::bail!("fetch.retries must be >= 1");
    }
    if config.fetch.timeout_secs == 0 {
        anyhow::bail!("fetch.timeout_secs must be >= 1");
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        if !seen.insert(source.as_str()) {
            anyhow::bail!("Duplicate source: '{}'", source);
        }
        if !KNOWN_SOURCES.contains(&source.as_str()) {
            anyhow::bail!(
                "Unknown source: '{}'. Available: {}",
                source,
                KNOWN_SOURCES.join(", ")
            );
        }
    }

    Ok(())
}
