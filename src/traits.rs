//! Job-source extension trait.
//!
//! Every job board the pipeline reads from implements [`JobSource`]. The
//! pipeline only talks to sources through this trait, so supporting a new
//! board means adding an implementation and registering it, not branching
//! inside the pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │          SourceRegistry          │
//! │  ┌──────────┐   ┌─────────────┐  │
//! │  │ LinkedIn │   │  Custom     │  │
//! │  │(built-in)│   │  (Rust)     │  │
//! │  └──────────┘   └─────────────┘  │
//! └───────────────┬──────────────────┘
//!                 ▼
//!          run_pipeline() → dedup → filter → sync
//! ```
//!
//! # Example
//!
//! ```rust
//! use anyhow::Result;
//! use async_trait::async_trait;
//! use jobsweep::models::JobCard;
//! use jobsweep::progress::ProgressReporter;
//! use jobsweep::traits::{JobSource, SourceRegistry};
//!
//! struct StaticBoard;
//!
//! #[async_trait]
//! impl JobSource for StaticBoard {
//!     fn source_name(&self) -> &str { "static" }
//!
//!     async fn get_job_cards(&self, _progress: &dyn ProgressReporter) -> Result<Vec<JobCard>> {
//!         Ok(vec![])
//!     }
//!
//!     async fn get_job_description(&self, _url: &str, _progress: &dyn ProgressReporter) -> Result<String> {
//!         Ok(String::new())
//!     }
//! }
//!
//! let mut sources = SourceRegistry::new();
//! sources.register(Box::new(StaticBoard));
//! assert_eq!(sources.len(), 1);
//! ```

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::connector_linkedin::LinkedInSource;
use crate::models::JobCard;
use crate::progress::ProgressReporter;

/// Source tags accepted in the `sources` config list.
pub const KNOWN_SOURCES: &[&str] = &["linkedin"];

/// A job board the pipeline can scrape.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Tag stamped on every posting from this source (e.g. `"linkedin"`).
    fn source_name(&self) -> &str;

    /// Run the paginated search sweep and return every parsed card.
    ///
    /// Pages that cannot be fetched contribute zero cards; they are
    /// reported on `progress` and never abort the sweep.
    async fn get_job_cards(&self, progress: &dyn ProgressReporter) -> Result<Vec<JobCard>>;

    /// Fetch and clean the description behind `job_url`.
    ///
    /// A missing page or content container yields a sentinel string, not
    /// an error. An `Err` is reserved for unexpected failures; the pipeline
    /// logs it against the job URL and moves on to the next job.
    async fn get_job_description(
        &self,
        job_url: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<String>;
}

/// Ordered set of sources a run scrapes.
pub struct SourceRegistry {
    sources: Vec<Box<dyn JobSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Build the built-in sources listed in `config.sources`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();
        for name in &config.sources {
            match name.as_str() {
                "linkedin" => registry.register(Box::new(LinkedInSource::new(config)?)),
                other => anyhow::bail!(
                    "Unknown source: '{}'. Available: {}",
                    other,
                    KNOWN_SOURCES.join(", ")
                ),
            }
        }
        Ok(registry)
    }

    pub fn register(&mut self, source: Box<dyn JobSource>) {
        self.sources.push(source);
    }

    pub fn sources(&self) -> &[Box<dyn JobSource>] {
        &self.sources
    }

    pub fn find(&self, name: &str) -> Option<&dyn JobSource> {
        self.sources
            .iter()
            .find(|s| s.source_name() == name)
            .map(|s| s.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
