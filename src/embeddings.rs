//! Embedding helpers over rig's [`EmbeddingModel`] trait, plus a
//! deterministic offline model for tests and local runs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rig::embeddings::embedding::{Embedding, EmbeddingError, EmbeddingModel};

use crate::types::SupportError;

/// Encodes a batch of texts into `f32` vectors, respecting the model's
/// batch limit.
pub async fn embed_texts<E: EmbeddingModel>(
    model: &E,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, SupportError> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(E::MAX_DOCUMENTS.max(1)) {
        let embedded = model
            .embed_texts(batch.iter().cloned())
            .await
            .map_err(|err| SupportError::Embedding(err.to_string()))?;
        vectors.extend(
            embedded
                .into_iter()
                .map(|embedding| embedding.vec.into_iter().map(|v| v as f32).collect()),
        );
    }
    Ok(vectors)
}

/// Encodes a single query with the same model the index was written with.
pub async fn embed_query<E: EmbeddingModel>(model: &E, text: &str) -> Result<Vec<f32>, SupportError> {
    let texts = [text.to_string()];
    let mut vectors = embed_texts(model, &texts).await?;
    vectors
        .pop()
        .ok_or_else(|| SupportError::Embedding("model returned no embedding".to_string()))
}

/// Deterministic bag-of-words embedding model.
///
/// Tokens are feature-hashed into a fixed number of buckets and the vector
/// is L2-normalized, so cosine distance tracks token overlap. Stable across
/// runs with no network calls: the encoder used by tests, and a local
/// fallback when no provider is configured.
#[derive(Clone, Debug)]
pub struct HashEmbeddingModel {
    dims: usize,
}

impl HashEmbeddingModel {
    pub const DEFAULT_DIMS: usize = 256;

    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

impl Default for HashEmbeddingModel {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMS)
    }
}

impl EmbeddingModel for HashEmbeddingModel {
    const MAX_DOCUMENTS: usize = 64;

    type Client = ();

    fn make(_client: &Self::Client, _model: impl Into<String>, dims: Option<usize>) -> Self {
        Self::new(dims.unwrap_or(Self::DEFAULT_DIMS))
    }

    fn ndims(&self) -> usize {
        self.dims
    }

    fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> impl std::future::Future<Output = Result<Vec<Embedding>, EmbeddingError>> + Send {
        let dims = self.dims;
        let docs: Vec<String> = texts.into_iter().collect();
        async move {
            Ok(docs
                .into_iter()
                .map(|document| Embedding {
                    vec: feature_hash(&document, dims),
                    document,
                })
                .collect())
        }
    }
}

fn feature_hash(text: &str, dims: usize) -> Vec<f64> {
    let mut vector = vec![0.0f64; dims];
    for token in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
    {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let bucket = (hasher.finish() % dims as u64) as usize;
        vector[bucket] += 1.0;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}
