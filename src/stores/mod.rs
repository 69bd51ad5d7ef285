//! Storage backends for embedded support-document chunks.
//!
//! One [`Backend`] trait abstracts the vector store so the pipeline never
//! ties itself to a specific database:
//!
//! ```text
//!                 ┌──────────────────┐
//!                 │   Backend trait  │
//!                 │ (domain-keyed IO)│
//!                 └────────┬─────────┘
//!                          │
//!                          ▼
//!                 ┌──────────────────┐
//!                 │      SQLite      │
//!                 │    sqlite-vec    │
//!                 └──────────────────┘
//! ```
//!
//! Every operation is keyed by domain: a domain's chunks form one
//! collection, written and replaced as a unit, and similarity search never
//! crosses domain boundaries.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Category, SupportError};

pub use sqlite::{ChunkDocument, SqliteSupportStore};

/// A chunk with its embedding, ready for storage.
///
/// Backend-agnostic; each backend converts to and from its own document
/// representation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique within a domain collection (`{domain}_{index}`).
    pub id: String,
    /// Collection key: normalized bare host.
    pub domain: String,
    /// Source page URL.
    pub url: String,
    /// Source page title, possibly empty.
    pub title: String,
    /// Support-topic label.
    pub category: Category,
    /// Zero-based position within the domain's ingestion order.
    pub chunk_index: usize,
    /// Normalized chunk text.
    pub content: String,
    /// Open metadata as JSON.
    pub metadata: serde_json::Value,
    /// Embedding vector, when computed.
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    pub fn new(
        id: impl Into<String>,
        domain: impl Into<String>,
        url: impl Into<String>,
        title: impl Into<String>,
        category: Category,
        chunk_index: usize,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            domain: domain.into(),
            url: url.into(),
            title: title.into(),
            category,
            chunk_index,
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

impl From<ChunkRecord> for ChunkDocument {
    fn from(record: ChunkRecord) -> Self {
        ChunkDocument {
            id: record.id,
            domain: record.domain,
            url: record.url,
            title: record.title,
            category: record.category,
            chunk_index: record.chunk_index,
            content: record.content,
            metadata: record.metadata,
        }
    }
}

impl From<ChunkDocument> for ChunkRecord {
    fn from(doc: ChunkDocument) -> Self {
        ChunkRecord {
            id: doc.id,
            domain: doc.domain,
            url: doc.url,
            title: doc.title,
            category: doc.category,
            chunk_index: doc.chunk_index,
            content: doc.content,
            metadata: doc.metadata,
            embedding: None,
        }
    }
}

/// Domain-partitioned chunk storage with similarity search.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Atomically replaces a domain's collection with `chunks` (records
    /// without embeddings are skipped). Clearing first is deliberate: a
    /// re-crawl with fewer chunks must not leave stale ids searchable.
    /// Returns the number of records written.
    async fn replace_domain(
        &self,
        domain: &str,
        chunks: Vec<ChunkRecord>,
    ) -> Result<usize, SupportError>;

    /// k-nearest-neighbour search within one domain's collection, most
    /// similar first. Each hit carries its cosine distance (0 = identical).
    /// Distance ties break in the store's internal order, which is
    /// unspecified.
    async fn search_domain(
        &self,
        domain: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, SupportError>;

    /// Removes a domain's collection, returning the number of chunks
    /// dropped.
    async fn delete_domain(&self, domain: &str) -> Result<usize, SupportError>;

    /// Number of chunks stored for a domain.
    async fn count_domain(&self, domain: &str) -> Result<usize, SupportError>;
}
