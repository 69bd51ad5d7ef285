//! The knowledge index: chunk, embed, and persist support documents, and
//! retrieve the nearest passages for a query.

use std::collections::BTreeMap;

use rig::embeddings::EmbeddingModel;
use serde_json::json;

use crate::config::Settings;
use crate::embeddings::{embed_query, embed_texts};
use crate::stores::{Backend, ChunkRecord};
use crate::types::{DocumentChunk, RetrievalResult, SupportError};

/// Write/read facade over one embedding model and one storage backend.
///
/// The same model must serve both sides: vectors written by one encoder are
/// meaningless to another.
pub struct KnowledgeIndex<E, B> {
    model: E,
    store: B,
    settings: Settings,
}

impl<E, B> KnowledgeIndex<E, B>
where
    E: EmbeddingModel,
    B: Backend,
{
    pub fn new(model: E, store: B, settings: Settings) -> Self {
        Self {
            model,
            store,
            settings,
        }
    }

    /// Splits, embeds, and persists a domain's documents, replacing whatever
    /// the domain held before. Returns the number of chunks written.
    ///
    /// An empty document set is a no-op that leaves existing data intact, so
    /// a crawl that found nothing cannot wipe a previously good index.
    pub async fn upsert(
        &self,
        domain: &str,
        documents: &[DocumentChunk],
    ) -> Result<usize, SupportError> {
        if documents.is_empty() {
            tracing::info!(domain, "no documents to index, keeping existing data");
            return Ok(0);
        }

        let mut records = Vec::new();
        let mut seq = 0usize;
        for document in documents {
            for piece in crate::text::chunk_text(
                &document.content,
                self.settings.chunk_size,
                self.settings.chunk_overlap,
            ) {
                let mut metadata = serde_json::Map::new();
                for (key, value) in &document.metadata {
                    metadata.insert(key.clone(), json!(value));
                }
                metadata.insert("title".into(), json!(document.title));
                metadata.insert("url".into(), json!(document.url));
                metadata.insert("category".into(), json!(document.category.as_str()));

                records.push(
                    ChunkRecord::new(
                        format!("{domain}_{seq}"),
                        domain,
                        &document.url,
                        &document.title,
                        document.category,
                        seq,
                        piece,
                    )
                    .with_metadata(serde_json::Value::Object(metadata)),
                );
                seq += 1;
            }
        }

        let texts: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
        let vectors = embed_texts(&self.model, &texts).await?;
        for (record, vector) in records.iter_mut().zip(vectors) {
            record.embedding = Some(vector);
        }

        let written = self.store.replace_domain(domain, records).await?;
        tracing::info!(domain, chunks = written, "indexed domain");
        Ok(written)
    }

    /// Retrieves the `top_k` passages nearest to `query` within one domain.
    ///
    /// Retrieval failures degrade to an empty list rather than erroring: the
    /// answering layer has a fallback response for "nothing found", and a
    /// transient search failure should read the same way to the end user.
    pub async fn query(&self, domain: &str, query: &str, top_k: usize) -> Vec<RetrievalResult> {
        let embedding = match embed_query(&self.model, query).await {
            Ok(embedding) => embedding,
            Err(err) => {
                tracing::warn!(domain, error = %err, "query embedding failed");
                return Vec::new();
            }
        };

        let hits = match self.store.search_domain(domain, &embedding, top_k).await {
            Ok(hits) => hits,
            Err(err) => {
                tracing::warn!(domain, error = %err, "similarity search failed");
                return Vec::new();
            }
        };

        hits.into_iter()
            .map(|(record, distance)| RetrievalResult {
                content: record.content,
                metadata: flatten_metadata(&record.metadata),
                distance,
            })
            .collect()
    }

    /// Retrieves with the configured default `top_k`.
    pub async fn query_default(&self, domain: &str, query: &str) -> Vec<RetrievalResult> {
        self.query(domain, query, self.settings.retrieve_top_k).await
    }

    /// Number of chunks currently stored for `domain`.
    pub async fn count(&self, domain: &str) -> Result<usize, SupportError> {
        self.store.count_domain(domain).await
    }

    /// Drops a domain's chunks entirely.
    pub async fn clear(&self, domain: &str) -> Result<usize, SupportError> {
        self.store.delete_domain(domain).await
    }
}

/// Projects a JSON metadata object onto string-to-string pairs; non-string
/// values keep their JSON rendering.
fn flatten_metadata(metadata: &serde_json::Value) -> BTreeMap<String, String> {
    let mut flat = BTreeMap::new();
    if let serde_json::Value::Object(map) = metadata {
        for (key, value) in map {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            flat.insert(key.clone(), rendered);
        }
    }
    flat
}
