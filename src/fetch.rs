//! Bounded-retry page fetcher.
//!
//! Every page the scrapers read goes through [`Fetcher::fetch`]. Timeouts are
//! retried a fixed number of times with a fixed delay; any other failure
//! (connection refused, TLS, non-2xx status) gives up immediately. The
//! fetcher never returns an error: `None` means "skip this unit of work".

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::FetchConfig;

/// Retry and timeout settings for [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
        }
    }
}

impl From<&FetchConfig> for FetchPolicy {
    fn from(cfg: &FetchConfig) -> Self {
        Self {
            retries: cfg.retries.max(1),
            retry_delay: Duration::from_secs(cfg.retry_delay_secs),
            timeout: Duration::from_secs(cfg.timeout_secs),
        }
    }
}

pub struct Fetcher {
    client: reqwest::Client,
    policy: FetchPolicy,
}

enum Attempt {
    Done(String),
    TimedOut,
    Failed,
}

impl Fetcher {
    /// Build a fetcher sending `headers` on every request, optionally
    /// through `proxy`.
    pub fn new(
        policy: FetchPolicy,
        headers: &HashMap<String, String>,
        proxy: Option<&str>,
    ) -> Result<Self> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name: {}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {}", name))?;
            header_map.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(policy.timeout)
            .default_headers(header_map);
        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .with_context(|| format!("Invalid proxy URL: {}", proxy_url))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().context("Failed to create HTTP client")?;
        Ok(Self { client, policy })
    }

    /// Fetch `url` and return the response body, or `None` once retries are
    /// exhausted or a non-timeout error occurs.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        for attempt in 1..=self.policy.retries {
            match self.attempt(url).await {
                Attempt::Done(body) => {
                    debug!(url, attempt, bytes = body.len(), "fetched");
                    return Some(body);
                }
                Attempt::Failed => return None,
                Attempt::TimedOut => {
                    warn!(
                        url,
                        attempt,
                        retries = self.policy.retries,
                        "timeout, retrying in {:?}",
                        self.policy.retry_delay
                    );
                    if attempt < self.policy.retries {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }
        warn!(url, "giving up after {} timeouts", self.policy.retries);
        None
    }

    async fn attempt(&self, url: &str) -> Attempt {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return classify(url, e),
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url, %status, "unexpected HTTP status");
            return Attempt::Failed;
        }

        match response.text().await {
            Ok(body) => Attempt::Done(body),
            Err(e) => classify(url, e),
        }
    }
}

fn classify(url: &str, err: reqwest::Error) -> Attempt {
    if err.is_timeout() {
        Attempt::TimedOut
    } else {
        warn!(url, error = %err, "request failed");
        Attempt::Failed
    }
}
