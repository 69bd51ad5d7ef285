//! Environment-driven settings for the crawl and retrieval pipeline.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for crawling, chunking, and retrieval.
///
/// Every field has a default suitable for polite crawling of a small support
/// site; [`Settings::from_env`] overrides them from `SUPPORTSMITH_*`
/// variables (a `.env` file is honored when present).
#[derive(Clone, Debug)]
pub struct Settings {
    /// Upper bound on pages discovered per domain.
    pub max_crawl_pages: usize,
    /// Courtesy delay between page fetches within one domain.
    pub crawl_delay: Duration,
    /// Per-request timeout for all network calls.
    pub request_timeout: Duration,
    /// User agent sent on every request.
    pub user_agent: String,
    /// Maximum characters kept from a page before classification.
    pub max_content_length: usize,
    /// Chunker window size in characters.
    pub chunk_size: usize,
    /// Chunker overlap in characters.
    pub chunk_overlap: usize,
    /// Number of passages retrieved per query.
    pub retrieve_top_k: usize,
    /// Location of the sqlite vector database.
    pub db_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_crawl_pages: 50,
            crawl_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            user_agent: "supportsmith-crawler/0.1".to_string(),
            max_content_length: 2000,
            chunk_size: 1000,
            chunk_overlap: 100,
            retrieve_top_k: 3,
            db_path: PathBuf::from("./support_chunks.sqlite"),
        }
    }
}

impl Settings {
    /// Builds settings from the environment, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            max_crawl_pages: parse_var("SUPPORTSMITH_MAX_CRAWL_PAGES")
                .unwrap_or(defaults.max_crawl_pages),
            crawl_delay: parse_var("SUPPORTSMITH_CRAWL_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.crawl_delay),
            request_timeout: parse_var("SUPPORTSMITH_REQUEST_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            user_agent: env::var("SUPPORTSMITH_USER_AGENT").unwrap_or(defaults.user_agent),
            max_content_length: parse_var("SUPPORTSMITH_MAX_CONTENT_LENGTH")
                .unwrap_or(defaults.max_content_length),
            chunk_size: parse_var("SUPPORTSMITH_CHUNK_SIZE").unwrap_or(defaults.chunk_size),
            chunk_overlap: parse_var("SUPPORTSMITH_CHUNK_OVERLAP").unwrap_or(defaults.chunk_overlap),
            retrieve_top_k: parse_var("SUPPORTSMITH_TOP_K").unwrap_or(defaults.retrieve_top_k),
            db_path: env::var("SUPPORTSMITH_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}
