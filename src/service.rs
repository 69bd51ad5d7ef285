//! Top-level service wiring crawl, index, and answer into one facade, with
//! per-domain single-flight crawl locking.

use std::collections::HashMap;
use std::sync::Arc;

use rig::embeddings::EmbeddingModel;

use crate::agent::{SupportAgent, Synthesizer};
use crate::classify::{is_support_content, prioritize_chunks};
use crate::crawler::{SupportCrawler, normalize_domain};
use crate::index::KnowledgeIndex;
use crate::stores::Backend;
use crate::types::{CrawlPhase, CrawlStatus, DocumentChunk, QueryResponse, SupportError};

/// One async mutex per domain, created on demand.
///
/// The map itself is guarded by a synchronous lock held only for lookup;
/// the per-domain mutexes are what crawls actually contend on. Entries are
/// never removed: the set of crawled domains is small and a stale entry is
/// just an idle mutex.
#[derive(Default)]
struct DomainLocks {
    inner: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DomainLocks {
    fn get(&self, domain: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .lock()
            .entry(domain.to_string())
            .or_default()
            .clone()
    }
}

/// The full pipeline behind one entry point per operation: refresh a
/// domain's knowledge, answer a question against it.
///
/// Every entry point normalizes its domain argument first, so
/// `"Shop.Example"` and `"shop.example"` name the same collection, the same
/// single-flight lock, and the same status reports.
pub struct SupportService<E, B, S> {
    crawler: SupportCrawler,
    index: KnowledgeIndex<E, B>,
    agent: SupportAgent<S>,
    locks: DomainLocks,
}

impl<E, B, S> SupportService<E, B, S>
where
    E: EmbeddingModel,
    B: Backend,
    S: Synthesizer,
{
    pub fn new(
        crawler: SupportCrawler,
        index: KnowledgeIndex<E, B>,
        agent: SupportAgent<S>,
    ) -> Self {
        Self {
            crawler,
            index,
            agent,
            locks: DomainLocks::default(),
        }
    }

    /// Crawls a domain and replaces its indexed knowledge.
    ///
    /// Single-flight per domain: a second refresh while one is running
    /// fails fast with [`SupportError::CrawlInProgress`] instead of queuing,
    /// so callers can report "already crawling" immediately. Different
    /// domains refresh concurrently.
    pub async fn refresh_domain(&self, domain: &str) -> Result<CrawlStatus, SupportError> {
        self.refresh_domain_with_status(domain, |_| {}).await
    }

    /// [`refresh_domain`](Self::refresh_domain) with lifecycle reporting:
    /// `on_status` sees a `Crawling` snapshot when the crawl starts and a
    /// terminal `Completed` or `Error` snapshot when it ends, for callers
    /// that persist progress in an external status store.
    pub async fn refresh_domain_with_status<F>(
        &self,
        domain: &str,
        on_status: F,
    ) -> Result<CrawlStatus, SupportError>
    where
        F: Fn(&CrawlStatus) + Send,
    {
        let domain = normalize_domain(domain);
        let lock = self.locks.get(&domain);
        let Ok(_guard) = lock.try_lock() else {
            return Err(SupportError::CrawlInProgress(domain));
        };

        tracing::info!(domain, "crawl started");
        on_status(&CrawlStatus::now(&domain, CrawlPhase::Crawling, 0));

        match self.crawl_and_index(&domain).await {
            Ok(indexed) => {
                tracing::info!(domain, chunks = indexed, "crawl completed");
                let done = CrawlStatus::now(&domain, CrawlPhase::Completed, indexed);
                on_status(&done);
                Ok(done)
            }
            Err(err) => {
                tracing::error!(domain, error = %err, "crawl failed");
                on_status(&CrawlStatus::now(&domain, CrawlPhase::Error, 0));
                Err(err)
            }
        }
    }

    /// Crawls a domain without touching the index: network reads only.
    pub async fn crawl_domain(&self, domain: &str) -> Result<Vec<DocumentChunk>, SupportError> {
        self.crawler.crawl_domain(domain).await
    }

    async fn crawl_and_index(&self, domain: &str) -> Result<usize, SupportError> {
        let chunks = self.crawler.crawl_domain(domain).await?;
        let indexed = self.process_documents(domain, chunks).await?;
        Ok(indexed)
    }

    /// Filters, prioritizes, and indexes already-crawled documents.
    ///
    /// Exposed separately so callers with their own document source (a file
    /// import, a test fixture) reuse the same filtering and indexing path
    /// the crawler feeds into.
    pub async fn process_documents(
        &self,
        domain: &str,
        documents: Vec<DocumentChunk>,
    ) -> Result<usize, SupportError> {
        let domain = normalize_domain(domain);
        let total = documents.len();
        let kept: Vec<DocumentChunk> = documents
            .into_iter()
            .filter(|chunk| is_support_content(&chunk.content))
            .collect();
        if kept.len() < total {
            tracing::debug!(
                domain,
                dropped = total - kept.len(),
                "filtered non-support content"
            );
        }
        let ordered = prioritize_chunks(kept);
        self.index.upsert(&domain, &ordered).await
    }

    /// Answers a question against a domain's indexed knowledge.
    ///
    /// Never errors: retrieval failures and synthesis failures both degrade
    /// to the agent's fallback responses.
    pub async fn process_query(
        &self,
        domain: &str,
        query: &str,
        context: Option<&str>,
    ) -> QueryResponse {
        let domain = normalize_domain(domain);
        let results = self.index.query_default(&domain, query).await;
        self.agent.process_query(query, results.as_slice(), context).await
    }

    /// Number of chunks currently indexed for a domain.
    pub async fn indexed_chunks(&self, domain: &str) -> Result<usize, SupportError> {
        self.index.count(&normalize_domain(domain)).await
    }

    /// Drops a domain's indexed knowledge.
    pub async fn forget_domain(&self, domain: &str) -> Result<usize, SupportError> {
        self.index.clear(&normalize_domain(domain)).await
    }
}
