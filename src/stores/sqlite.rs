//! SQLite backend with vector search via `sqlite-vec`.

use rig::OneOrMany;
use rig::embeddings::{Embedding, EmbeddingModel};
use rig_sqlite::{Column, ColumnValue, SqliteVectorStore, SqliteVectorStoreTable};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;
use tokio_rusqlite::{Connection, ffi};

use crate::types::{Category, SupportError};

/// Row shape of the `chunks` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkDocument {
    pub id: String,
    pub domain: String,
    pub url: String,
    pub title: String,
    pub category: Category,
    #[serde(deserialize_with = "deserialize_chunk_index")]
    pub chunk_index: usize,
    pub content: String,
    #[serde(deserialize_with = "deserialize_metadata_field")]
    pub metadata: serde_json::Value,
}

impl SqliteVectorStoreTable for ChunkDocument {
    fn name() -> &'static str {
        "chunks"
    }

    fn schema() -> Vec<Column> {
        vec![
            Column::new("id", "TEXT PRIMARY KEY"),
            Column::new("domain", "TEXT").indexed(),
            Column::new("url", "TEXT").indexed(),
            Column::new("title", "TEXT"),
            Column::new("category", "TEXT"),
            Column::new("chunk_index", "TEXT"),
            Column::new("metadata", "TEXT"),
            Column::new("content", "TEXT"),
        ]
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn column_values(&self) -> Vec<(&'static str, Box<dyn ColumnValue>)> {
        vec![
            ("id", Box::new(self.id.clone())),
            ("domain", Box::new(self.domain.clone())),
            ("url", Box::new(self.url.clone())),
            ("title", Box::new(self.title.clone())),
            ("category", Box::new(self.category.as_str().to_string())),
            ("chunk_index", Box::new(self.chunk_index.to_string())),
            ("metadata", Box::new(self.metadata.to_string())),
            ("content", Box::new(self.content.clone())),
        ]
    }
}

fn deserialize_chunk_index<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(u64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Num(value) => usize::try_from(value)
            .map_err(|_| de::Error::custom(format!("chunk_index {value} does not fit in usize"))),
        Repr::Text(text) => text.parse::<usize>().map_err(|err| {
            de::Error::custom(format!("unable to parse chunk_index '{text}': {err}"))
        }),
    }
}

fn deserialize_metadata_field<'de, D>(deserializer: D) -> Result<serde_json::Value, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if let serde_json::Value::String(raw) = value {
        serde_json::from_str(&raw).map_or(Ok(serde_json::Value::String(raw)), Ok)
    } else {
        Ok(value)
    }
}

/// SQLite-backed, domain-partitioned vector store.
#[derive(Clone)]
pub struct SqliteSupportStore<E>
where
    E: EmbeddingModel + 'static,
{
    inner: SqliteVectorStore<E, ChunkDocument>,
    /// Separate connection handle for direct queries not supported by
    /// rig-sqlite. This is a clone of the connection used by the inner
    /// store.
    conn: Connection,
}

impl<E> SqliteSupportStore<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    /// Opens (or creates) the store at `path`, registering the sqlite-vec
    /// extension and verifying it loaded.
    pub async fn open(path: impl AsRef<Path>, model: &E) -> Result<Self, SupportError> {
        Self::register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| SupportError::Storage(err.to_string()))?;
        conn.call(|conn| {
            let result = conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0));
            match result {
                Ok(_) => Ok(()),
                Err(err) => Err(tokio_rusqlite::Error::Rusqlite(err)),
            }
        })
        .await
        .map_err(|err| SupportError::Storage(err.to_string()))?;
        // Clone connection for direct access before moving into store
        let conn_for_queries = conn.clone();
        let store = SqliteVectorStore::new(conn, model)
            .await
            .map_err(|err| SupportError::Storage(err.to_string()))?;
        Ok(Self {
            inner: store,
            conn: conn_for_queries,
        })
    }

    /// Inserts documents paired with their embedding vectors.
    pub async fn add_chunks(
        &self,
        documents: Vec<(ChunkDocument, Vec<f32>)>,
    ) -> Result<(), SupportError> {
        if documents.is_empty() {
            return Ok(());
        }
        let mut rows = Vec::with_capacity(documents.len());
        for (doc, embedding) in documents {
            let converted: Vec<f64> = embedding.into_iter().map(|value| value as f64).collect();
            let embed = Embedding {
                document: doc.content.clone(),
                vec: converted,
            };
            rows.push((doc, OneOrMany::one(embed)));
        }
        self.inner
            .add_rows(rows)
            .await
            .map_err(|err| SupportError::Storage(err.to_string()))?;
        Ok(())
    }

    fn register_sqlite_vec() -> Result<(), SupportError> {
        use std::sync::Mutex;

        static INIT: Once = Once::new();
        static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

        INIT.call_once(|| {
            let result = unsafe {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *mut c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                let init_fn: SqliteExtensionInit =
                    transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                let rc = ffi::sqlite3_auto_extension(Some(init_fn));
                if rc != 0 {
                    Err(format!(
                        "failed to register sqlite-vec extension (code {rc})"
                    ))
                } else {
                    Ok(())
                }
            };
            *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
        });

        INIT_RESULT
            .lock()
            .expect("init result mutex poisoned")
            .clone()
            .expect("init was called but result not set")
            .map_err(SupportError::Storage)
    }

    /// The underlying connection, for queries the [`Backend`](super::Backend)
    /// trait does not cover.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

// ============================================================================
// Backend Trait Implementation
// ============================================================================

use super::{Backend, ChunkRecord};
use async_trait::async_trait;

#[async_trait]
impl<E> Backend for SqliteSupportStore<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    async fn replace_domain(
        &self,
        domain: &str,
        chunks: Vec<ChunkRecord>,
    ) -> Result<usize, SupportError> {
        self.delete_domain(domain).await?;

        let documents_with_embeddings: Vec<(ChunkDocument, Vec<f32>)> = chunks
            .into_iter()
            .filter_map(|record| {
                let embedding = record.embedding.clone()?;
                let doc = ChunkDocument::from(record);
                Some((doc, embedding))
            })
            .collect();

        let written = documents_with_embeddings.len();
        self.add_chunks(documents_with_embeddings).await?;
        Ok(written)
    }

    async fn search_domain(
        &self,
        domain: &str,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, SupportError> {
        // The query vector is already computed, so skip the rig index layer
        // and run the sqlite-vec distance function directly.
        let embedding_json = serde_json::to_string(query_embedding)
            .map_err(|err| SupportError::Storage(err.to_string()))?;
        let domain = domain.to_string();
        let conn = self.connection();

        conn.call(move |conn| {
            // The vec0 embeddings table is keyed by rowid, not by document id.
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT c.id, c.domain, c.url, c.title, c.category, c.chunk_index, \
                     c.content, c.metadata, \
                     vec_distance_cosine(e.embedding, vec_f32(?1)) as distance \
                     FROM chunks c \
                     JOIN chunks_embeddings e ON c.rowid = e.rowid \
                     WHERE c.domain = ?2 \
                     ORDER BY distance ASC \
                     LIMIT {}",
                    top_k
                ))
                .map_err(tokio_rusqlite::Error::Rusqlite)?;

            let rows = stmt
                .query_map([&embedding_json, &domain], |row| {
                    let doc = ChunkDocument {
                        id: row.get(0)?,
                        domain: row.get(1)?,
                        url: row.get(2)?,
                        title: row.get(3)?,
                        category: Category::parse(&row.get::<_, String>(4)?),
                        chunk_index: row.get::<_, String>(5)?.parse().unwrap_or(0),
                        content: row.get(6)?,
                        metadata: row
                            .get::<_, String>(7)
                            .map(|s| serde_json::from_str(&s).unwrap_or_default())
                            .unwrap_or_default(),
                    };
                    let distance: f32 = row.get(8)?;
                    Ok((ChunkRecord::from(doc), distance))
                })
                .map_err(tokio_rusqlite::Error::Rusqlite)?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
            }
            Ok(results)
        })
        .await
        .map_err(|err| SupportError::Storage(err.to_string()))
    }

    async fn delete_domain(&self, domain: &str) -> Result<usize, SupportError> {
        let domain = domain.to_string();
        let conn = self.connection();

        conn.call(move |conn| {
            // Embeddings live in a rowid-keyed vec0 table; collect the
            // document rowids first and delete per key.
            let rowids: Vec<i64> = {
                let mut stmt = conn
                    .prepare("SELECT rowid FROM chunks WHERE domain = ?")
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([&domain], |row| row.get::<_, i64>(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut rowids = Vec::new();
                for row in rows {
                    rowids.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                rowids
            };

            for rowid in &rowids {
                conn.execute("DELETE FROM chunks_embeddings WHERE rowid = ?", [rowid])
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
            }
            let deleted = conn
                .execute("DELETE FROM chunks WHERE domain = ?", [&domain])
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(deleted)
        })
        .await
        .map_err(|err| SupportError::Storage(err.to_string()))
    }

    async fn count_domain(&self, domain: &str) -> Result<usize, SupportError> {
        let domain = domain.to_string();
        let conn = self.connection();

        conn.call(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM chunks WHERE domain = ?",
                    [&domain],
                    |row| row.get(0),
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(count as usize)
        })
        .await
        .map_err(|err| SupportError::Storage(err.to_string()))
    }
}
