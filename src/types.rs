//! Core data model and error taxonomy for the support knowledge pipeline.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unified error type for the crawling, indexing, and answering pipeline.
///
/// Most failures in this crate are recovered locally (a failed page fetch is
/// an empty contribution, a failed search is an empty result list). The
/// variants below are reserved for failures the caller must see, most
/// importantly index writes: a crawl must not report success when nothing
/// was persisted.
#[derive(Debug, thiserror::Error)]
pub enum SupportError {
    /// An HTTP request failed at the transport level.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The vector store rejected a read or write.
    #[error("storage failure: {0}")]
    Storage(String),

    /// The embedding model failed to encode text.
    #[error("embedding failure: {0}")]
    Embedding(String),

    /// The generative model failed or returned unusable output.
    #[error("synthesis failure: {0}")]
    Synthesis(String),

    /// A document or URL could not be parsed.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Another crawl of the same domain is already running.
    #[error("crawl already in progress for domain '{0}'")]
    CrawlInProgress(String),
}

/// Fixed taxonomy of support-topic labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cancellation,
    Refund,
    Billing,
    Shipping,
    Account,
    Technical,
    General,
}

impl Category {
    /// All categories, in classifier priority order.
    pub const ALL: [Category; 7] = [
        Category::Cancellation,
        Category::Refund,
        Category::Billing,
        Category::Shipping,
        Category::Account,
        Category::Technical,
        Category::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cancellation => "cancellation",
            Category::Refund => "refund",
            Category::Billing => "billing",
            Category::Shipping => "shipping",
            Category::Account => "account",
            Category::Technical => "technical",
            Category::General => "general",
        }
    }

    /// Parses a stored label; unknown strings fall back to [`Category::General`].
    pub fn parse(label: &str) -> Category {
        match label.trim().to_ascii_lowercase().as_str() {
            "cancellation" => Category::Cancellation,
            "refund" => Category::Refund,
            "billing" => Category::Billing,
            "shipping" => Category::Shipping,
            "account" => Category::Account,
            "technical" => Category::Technical,
            _ => Category::General,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of extracted support content, the atomic input to indexing.
///
/// Content is bounded to the extractor's maximum length; longer pages are
/// split further by the chunker during indexing. Chunks are immutable once
/// embedded; a re-crawl supersedes the previous set wholesale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub content: String,
    pub title: String,
    pub url: String,
    pub category: Category,
    /// Open string-to-string metadata. The keys `title`, `url`, `category`,
    /// and `scraped_at` are reserved for the pipeline.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl DocumentChunk {
    pub fn new(
        content: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            content: content.into(),
            title: title.into(),
            url: url.into(),
            category,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A single ranked passage returned from the embedding index.
///
/// Ephemeral: produced fresh per query and discarded after response
/// assembly. `distance` is a non-negative dissimilarity score (0 = identical
/// under the index's cosine metric).
#[derive(Clone, Debug)]
pub struct RetrievalResult {
    pub content: String,
    pub metadata: BTreeMap<String, String>,
    pub distance: f32,
}

impl RetrievalResult {
    pub fn title(&self) -> &str {
        self.metadata.get("title").map(String::as_str).unwrap_or("Untitled")
    }

    pub fn url(&self) -> &str {
        self.metadata.get("url").map(String::as_str).unwrap_or("")
    }

    pub fn category(&self) -> Category {
        self.metadata
            .get("category")
            .map(|label| Category::parse(label))
            .unwrap_or(Category::General)
    }
}

/// A source citation attached to an answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
    pub category: Category,
}

impl From<&RetrievalResult> for SourceRef {
    fn from(result: &RetrievalResult) -> Self {
        SourceRef {
            title: result.title().to_string(),
            url: result.url().to_string(),
            category: result.category(),
        }
    }
}

/// Structured answer assembled from retrieval and synthesis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub confidence: f32,
    pub suggested_actions: Vec<String>,
}

/// Lifecycle state reported to the external crawl-status store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlPhase {
    Crawling,
    Completed,
    Error,
}

impl CrawlPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlPhase::Crawling => "crawling",
            CrawlPhase::Completed => "completed",
            CrawlPhase::Error => "error",
        }
    }
}

/// Snapshot of one domain's crawl progress. The core produces these values;
/// persistence (and expiry) belongs to the caller's status store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlStatus {
    pub domain: String,
    pub phase: CrawlPhase,
    pub pages_found: usize,
    pub last_updated: DateTime<Utc>,
}

impl CrawlStatus {
    pub fn now(domain: impl Into<String>, phase: CrawlPhase, pages_found: usize) -> Self {
        Self {
            domain: domain.into(),
            phase,
            pages_found,
            last_updated: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_defaults_to_general() {
        assert_eq!(Category::parse("Refund"), Category::Refund);
        assert_eq!(Category::parse("  billing "), Category::Billing);
        assert_eq!(Category::parse("unknown-label"), Category::General);
        assert_eq!(Category::parse(""), Category::General);
    }

    #[test]
    fn retrieval_result_metadata_defaults() {
        let result = RetrievalResult {
            content: "text".into(),
            metadata: BTreeMap::new(),
            distance: 0.2,
        };
        assert_eq!(result.title(), "Untitled");
        assert_eq!(result.url(), "");
        assert_eq!(result.category(), Category::General);
    }

    #[test]
    fn crawl_phase_labels() {
        assert_eq!(CrawlPhase::Crawling.as_str(), "crawling");
        assert_eq!(CrawlPhase::Completed.as_str(), "completed");
        assert_eq!(CrawlPhase::Error.as_str(), "error");
    }
}
