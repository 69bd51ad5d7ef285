//! Crawl orchestration for one domain's support documentation.
//!
//! ```text
//! domain ──► discovery (path probes + sitemap) ──► bounded URL list
//!                                                        │
//!            robots check ──► extract_page ──► DocumentChunk   (per URL,
//!                                                        │      sequential,
//!            rate limit + courtesy delay between pages ──┘      delayed)
//!                                                        │
//!                               content-hash dedupe ──► Vec<DocumentChunk>
//! ```
//!
//! Crawling is deliberately single-domain-sequential: one page in flight at
//! a time, a fixed delay between fetches. Concurrency happens across
//! domains, never within one.

pub mod discovery;
pub mod extract;
pub mod robots;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::config::Settings;
use crate::limiter::RateLimiter;
use crate::text::dedupe_chunks;
use crate::types::{DocumentChunk, SupportError};

pub use discovery::{discover_support_urls, normalize_domain, normalize_url, parse_sitemap};
pub use extract::extract_page;

/// Pause between limiter checks when a domain is over budget.
const LIMITER_BACKOFF: Duration = Duration::from_millis(250);

/// Sequential, rate-limited crawler for support documentation.
pub struct SupportCrawler {
    client: Client,
    settings: Settings,
    limiter: Arc<RateLimiter>,
}

impl SupportCrawler {
    /// Builds a crawler with its own HTTP client. The limiter is shared by
    /// reference so several crawlers can draw on one budget, or each get
    /// their own, as the caller composes them.
    pub fn new(settings: Settings, limiter: Arc<RateLimiter>) -> Result<Self, SupportError> {
        let client = Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(settings.request_timeout)
            .use_rustls_tls()
            .build()?;
        Ok(Self {
            client,
            settings,
            limiter,
        })
    }

    /// Crawls all support documents for a bare domain (assumes https).
    pub async fn crawl_domain(&self, domain: &str) -> Result<Vec<DocumentChunk>, SupportError> {
        let domain = normalize_domain(domain);
        let base_url = Url::parse(&format!("https://{domain}"))
            .map_err(|err| SupportError::InvalidDocument(format!("domain '{domain}': {err}")))?;
        self.crawl_site(&base_url).await
    }

    /// Crawls a site rooted at an explicit base URL.
    ///
    /// Pure with respect to state: network reads only, no index writes. A
    /// failing page contributes nothing and never aborts the crawl; the
    /// returned set is deduplicated by content hash.
    pub async fn crawl_site(&self, base_url: &Url) -> Result<Vec<DocumentChunk>, SupportError> {
        let urls =
            discover_support_urls(&self.client, base_url, self.settings.max_crawl_pages).await;
        let limiter_key = base_url.host_str().unwrap_or("").to_string();

        let mut crawled: HashSet<String> = HashSet::new();
        let mut chunks = Vec::new();

        for url in urls {
            if !crawled.insert(url.clone()) {
                continue;
            }
            // Courtesy delay between pages, not before the first.
            if crawled.len() > 1 {
                tokio::time::sleep(self.settings.crawl_delay).await;
            }

            self.await_budget(&limiter_key).await;
            if !robots::can_crawl_url(&self.client, &url).await {
                tracing::info!(url, "skipped: disallowed by robots.txt");
                continue;
            }

            self.limiter.record_request(&limiter_key);
            if let Some(chunk) =
                extract_page(&self.client, &url, self.settings.max_content_length).await
            {
                chunks.push(chunk);
            }
        }

        let unique = dedupe_chunks(chunks);
        tracing::info!(
            base = %base_url,
            pages = crawled.len(),
            chunks = unique.len(),
            "crawl finished"
        );
        Ok(unique)
    }

    /// Blocks until the shared limiter has budget for `key`.
    async fn await_budget(&self, key: &str) {
        while !self.limiter.can_request(key) {
            tokio::time::sleep(LIMITER_BACKOFF).await;
        }
    }

    /// The underlying HTTP client, for callers that probe the same site.
    pub fn client(&self) -> &Client {
        &self.client
    }
}
