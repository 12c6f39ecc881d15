//! LinkedIn guest job-search connector.
//!
//! Reads the public (logged-out) job-search endpoint, which returns HTML
//! fragments of 25 job cards per page, and the public job view pages for
//! descriptions. Both are parsed with CSS selectors.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::config::{Config, SearchQueryConfig};
use crate::fetch::{FetchPolicy, Fetcher};
use crate::models::JobCard;
use crate::progress::ProgressReporter;
use crate::traits::JobSource;

pub const SOURCE_NAME: &str = "linkedin";

/// Results per search page.
pub const PAGE_SIZE: u32 = 25;

/// Returned when the description container is missing from a job page.
pub const DESCRIPTION_NOT_FOUND: &str = "Could not find Job Description";

/// Returned when the job page itself could not be fetched.
pub const DESCRIPTION_NOT_FETCHED: &str = "Could not fetch job description";

/// Guest job-search endpoint returning HTML card fragments.
pub const SEARCH_ENDPOINT: &str =
    "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search";

pub struct LinkedInSource {
    fetcher: Fetcher,
    endpoint: String,
    queries: Vec<SearchQueryConfig>,
    rounds: u32,
    pages_to_scrape: u32,
    timespan: String,
}

impl LinkedInSource {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_endpoint(config, SEARCH_ENDPOINT)
    }

    /// Build a source that queries `endpoint` instead of the public one.
    pub fn with_endpoint(config: &Config, endpoint: &str) -> Result<Self> {
        let fetcher = Fetcher::new(
            FetchPolicy::from(&config.fetch),
            &config.headers,
            config.proxy(),
        )?;
        Ok(Self {
            fetcher,
            endpoint: endpoint.to_string(),
            queries: config.search_queries.clone(),
            rounds: config.rounds,
            pages_to_scrape: config.pages_to_scrape,
            timespan: config.timespan.clone(),
        })
    }
}

#[async_trait]
impl JobSource for LinkedInSource {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    async fn get_job_cards(&self, progress: &dyn ProgressReporter) -> Result<Vec<JobCard>> {
        let total_queries = u32::try_from(self.queries.len()).unwrap_or(u32::MAX);
        let total_pages = sweep_size(self.rounds, total_queries, self.pages_to_scrape);
        let mut current_page = 0u32;
        let mut cards = Vec::new();

        progress.info("  Starting job card scraping:");
        progress.info(&format!("    - Rounds: {}", self.rounds));
        progress.info(&format!("    - Search queries: {}", total_queries));
        progress.info(&format!("    - Pages per query: {}", self.pages_to_scrape));
        progress.info(&format!("    - Total pages to scrape: {}", total_pages));

        for round in 0..self.rounds {
            progress.info(&format!("  Round {}/{}:", round + 1, self.rounds));
            for (query_idx, query) in self.queries.iter().enumerate() {
                progress.info(&format!(
                    "    Query {}/{}: '{}' in '{}'",
                    query_idx + 1,
                    total_queries,
                    query.keywords,
                    query.location
                ));
                if !query.work_type.is_empty() {
                    progress.info(&format!("      Work type filter: {}", query.work_type));
                }

                for page in 0..self.pages_to_scrape {
                    current_page = current_page.saturating_add(1);
                    let url = search_url(&self.endpoint, query, &self.timespan, page);
                    progress.info(&format!(
                        "      -> Scraping page {}/{} (Overall: {}/{})...",
                        page + 1,
                        self.pages_to_scrape,
                        current_page,
                        total_pages
                    ));

                    let Some(body) = self.fetcher.fetch(&url).await else {
                        progress.error("Failed to scrape page (may be empty or rate limited)");
                        continue;
                    };
                    let page_cards = parse_job_cards(&body)?;
                    progress.ok(&format!("Found {} job cards on this page", page_cards.len()));
                    cards.extend(page_cards);
                }
            }
        }

        progress.ok("Job card scraping completed");
        progress.info(&format!("    - Total job cards scraped: {}", cards.len()));
        Ok(cards)
    }

    async fn get_job_description(
        &self,
        job_url: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<String> {
        let Some(body) = self.fetcher.fetch(job_url).await else {
            progress.error(&format!("Could not fetch job description from {}", job_url));
            return Ok(DESCRIPTION_NOT_FETCHED.to_string());
        };

        let description = parse_job_description(&body)?;
        if !description.is_empty() && description != DESCRIPTION_NOT_FOUND {
            progress.ok(&format!(
                "Job description fetched ({} characters)",
                description.chars().count()
            ));
        } else {
            progress.warn("Job description not found or empty");
        }
        Ok(description)
    }
}

/// Number of search pages a sweep requests, saturating at `u32::MAX`.
pub fn sweep_size(rounds: u32, queries: u32, pages_per_query: u32) -> u32 {
    rounds.saturating_mul(queries).saturating_mul(pages_per_query)
}

/// Build the search URL for one `(query, page)` pair.
pub fn search_url(endpoint: &str, query: &SearchQueryConfig, timespan: &str, page: u32) -> String {
    format!(
        "{}?keywords={}&location={}&f_TPR=&f_WT={}&geoId=&f_TPR={}&start={}",
        endpoint,
        urlencoding::encode(&query.keywords),
        urlencoding::encode(&query.location),
        query.work_type,
        timespan,
        PAGE_SIZE.saturating_mul(page)
    )
}

/// Build the canonical job URL from a posting identifier.
pub fn job_url(posting_id: &str) -> String {
    format!("https://www.linkedin.com/jobs/view/{}/", posting_id)
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector '{}': {:?}", css, e))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Parse a search-results page into cards. Cards without a title are dropped.
pub fn parse_job_cards(html: &str) -> Result<Vec<JobCard>> {
    let info_sel = selector("div.base-search-card__info")?;
    let title_sel = selector("h3")?;
    let company_sel = selector("a.hidden-nested-link")?;
    let location_sel = selector("span.job-search-card__location")?;
    let date_sel = selector("time.job-search-card__listdate")?;
    let date_new_sel = selector("time.job-search-card__listdate--new")?;

    let doc = Html::parse_document(html);
    let mut cards = Vec::new();

    for info in doc.select(&info_sel) {
        let title = match info.select(&title_sel).next() {
            Some(el) => element_text(el).trim().to_string(),
            None => continue,
        };
        if title.is_empty() {
            continue;
        }

        let company = info
            .select(&company_sel)
            .next()
            .map(|el| element_text(el).trim().replace('\n', " "))
            .unwrap_or_default();

        let location = info
            .select(&location_sel)
            .next()
            .map(|el| element_text(el).trim().to_string())
            .unwrap_or_default();

        let posting_id = info
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|parent| parent.value().attr("data-entity-urn"))
            .and_then(|urn| urn.rsplit(':').next())
            .unwrap_or("");
        let url = if posting_id.is_empty() {
            String::new()
        } else {
            job_url(posting_id)
        };

        // Two date-tag variants exist depending on how fresh the posting is.
        let date = [&date_sel, &date_new_sel]
            .iter()
            .filter_map(|sel| info.select(sel).next())
            .filter_map(|el| el.value().attr("datetime"))
            .find(|d| !d.is_empty())
            .unwrap_or("")
            .to_string();

        cards.push(JobCard {
            title,
            company,
            location,
            date,
            job_url: url,
        });
    }

    Ok(cards)
}

/// Extract the description text from a job view page.
///
/// Inline links and spans are dropped, list items get a `- ` prefix, and
/// the "Show more"/"Show less" toggles are stripped. Returns
/// [`DESCRIPTION_NOT_FOUND`] when the content container is absent.
pub fn parse_job_description(html: &str) -> Result<String> {
    let container_sel = selector("div.description__text.description__text--rich")?;
    let doc = Html::parse_document(html);

    let Some(container) = doc.select(&container_sel).next() else {
        return Ok(DESCRIPTION_NOT_FOUND.to_string());
    };

    let mut fragments = Vec::new();
    collect_fragments(container, false, &mut fragments);

    let text = fragments.join("\n");
    let text = text
        .trim()
        .replace("\n\n", "")
        .replace("::marker", "-")
        .replace("-\n", "- ")
        .replace("Show less", "")
        .replace("Show more", "");
    Ok(text)
}

fn collect_fragments(el: ElementRef<'_>, in_list: bool, out: &mut Vec<String>) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push(text.text.to_string()),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                match child_el.value().name() {
                    "span" | "a" => {}
                    "ul" => collect_fragments(child_el, true, out),
                    "li" if in_list => {
                        out.push("-".to_string());
                        collect_fragments(child_el, in_list, out);
                    }
                    _ => collect_fragments(child_el, in_list, out),
                }
            }
            _ => {}
        }
    }
}
