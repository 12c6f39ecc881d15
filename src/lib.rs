//! # jobsweep
//!
//! A batch ingestion pipeline for job listings.
//!
//! jobsweep queries a job board across several search terms and pages,
//! fetches the detail page of every posting it has not seen before, filters
//! the results, and syncs them incrementally into SQLite. Postings rejected
//! by the description filter are kept in a table of their own so they are
//! never fetched again.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │  Sources    │──▶│ Normalize + │──▶│  Date gate  │──▶│  Filter  │
//! │ (LinkedIn)  │   │   Dedup     │   │ + Describe  │   │  stages  │
//! └─────────────┘   └─────────────┘   └─────────────┘   └────┬─────┘
//!                                                            │
//!                               ┌────────────────────────────┤
//!                               ▼                            ▼
//!                         ┌──────────┐                 ┌──────────┐
//!                         │   jobs   │                 │ filtered │
//!                         │ (SQLite) │                 │  _jobs   │
//!                         └────┬─────┘                 └──────────┘
//!                              ▼
//!                       retention cleanup
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! jobsweep                      # run with ./config.json
//! jobsweep ./my-config.json     # run with another config
//! jobsweep config.json --list   # print visible accepted jobs
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | JSON configuration parsing |
//! | [`models`] | Core data types |
//! | [`fetch`] | Bounded-retry HTTP fetcher |
//! | [`traits`] | Job source trait and registry |
//! | [`connector_linkedin`] | LinkedIn guest search source |
//! | [`normalize`] | Card → posting normalization |
//! | [`dedup`] | Batch and cross-run deduplication |
//! | [`filter`] | Keyword, title, language and company filters |
//! | [`db`] | Database connection |
//! | [`migrate`] | Additive schema verification |
//! | [`store`] | Create-or-append table sync |
//! | [`retention`] | Hiding stale postings |
//! | [`export`] | CSV snapshots |
//! | [`progress`] | Stdout progress stream |
//! | [`ingest`] | Pipeline orchestration |

pub mod config;
pub mod connector_linkedin;
pub mod db;
pub mod dedup;
pub mod export;
pub mod fetch;
pub mod filter;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod retention;
pub mod store;
pub mod traits;
