//! ```text
//! Domain ──► crawler::discovery (path probes + sitemap) ──► URL list
//!                                       │
//!         crawler::extract ──► DocumentChunk (cleaned, categorized)
//!                                       │
//!         classify (filter + prioritize) ──► index::KnowledgeIndex
//!                                       │         (chunk ► embed ► store)
//!                                       ▼
//!                      stores::SqliteSupportStore (sqlite-vec)
//!                                       │
//! Question ──► index retrieval ──► agent::SupportAgent ──► QueryResponse
//! ```
//!
pub mod agent;
pub mod classify;
pub mod config;
pub mod crawler;
pub mod embeddings;
pub mod index;
pub mod limiter;
pub mod service;
pub mod stores;
pub mod text;
pub mod types;

pub use agent::{RigSynthesizer, SupportAgent, Synthesizer};
pub use config::Settings;
pub use crawler::SupportCrawler;
pub use embeddings::HashEmbeddingModel;
pub use index::KnowledgeIndex;
pub use limiter::RateLimiter;
pub use service::SupportService;
pub use stores::{Backend, ChunkRecord, SqliteSupportStore};
pub use types::{
    Category, CrawlPhase, CrawlStatus, DocumentChunk, QueryResponse, RetrievalResult, SourceRef,
    SupportError,
};
