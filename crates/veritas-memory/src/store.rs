use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use veritas_core::error::{Result, VeritasError};
use veritas_core::traits::VectorStore;
use veritas_core::types::{SimilarSource, Source};

use crate::embeddings::{cosine_similarity, EmbeddingProvider};

const MAX_ID_LEN: usize = 200;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sources (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        url TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        score REAL NOT NULL,
        domain TEXT NOT NULL,
        scraped_at TEXT,
        metadata TEXT NOT NULL,
        embedding BLOB NOT NULL,
        stored_at TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    );

    CREATE INDEX IF NOT EXISTS idx_sources_score ON sources(collection, score);";

const SELECT_SOURCE: &str =
    "SELECT url, title, content, score, scraped_at, metadata, embedding, collection FROM sources";

/// Stable document id for a URL.
///
/// Path separators and colons become underscores; URLs longer than the id limit
/// are replaced by their SHA-256 hex digest.
pub fn source_id(url: &str) -> String {
    if url.len() > MAX_ID_LEN {
        let digest = Sha256::digest(url.as_bytes());
        return digest.iter().map(|b| format!("{:02x}", b)).collect();
    }
    url.replace(['/', ':'], "_")
}

fn db_err(e: impl std::fmt::Display) -> VeritasError {
    VeritasError::Database(e.to_string())
}

fn to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn from_blob(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

struct StoredRow {
    source: Source,
    embedding: Vec<f32>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    let url: String = row.get(0)?;
    let title: String = row.get(1)?;
    let content: String = row.get(2)?;
    let score: f64 = row.get(3)?;
    let scraped_at: Option<String> = row.get(4)?;
    let metadata: String = row.get(5)?;
    let blob: Vec<u8> = row.get(6)?;

    let mut source = Source::new(url, title, content).with_score(score);
    source.metadata = serde_json::from_str(&metadata).unwrap_or_default();
    source.scraped_at = scraped_at
        .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(StoredRow {
        source,
        embedding: from_blob(&blob),
    })
}

/// SQLite-backed vector store for analyzed sources.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SqliteVectorStore {
    /// Open or create a store at the given path.
    pub fn open(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| db_err(format!("Failed to create db directory: {}", e)))?;
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "Vector store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    /// Open an in-memory store (for testing).
    pub fn in_memory(embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != expected {
            return Err(VeritasError::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                expected
            )));
        }
        Ok(vectors)
    }

    fn insert(&self, collection: &str, sources: &[Source], vectors: &[Vec<f32>]) -> Result<()> {
        let mut conn = self.conn.lock().map_err(db_err)?;
        let tx = conn.transaction().map_err(db_err)?;
        let stored_at = Utc::now().to_rfc3339();
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO sources
                     (collection, id, url, title, content, score, domain, scraped_at,
                      metadata, embedding, stored_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                )
                .map_err(db_err)?;
            for (source, vector) in sources.iter().zip(vectors) {
                let metadata = serde_json::to_string(&source.metadata)?;
                stmt.execute(params![
                    collection,
                    source_id(&source.url),
                    source.url,
                    source.title,
                    source.content,
                    source.trustworthiness_score,
                    source.domain(),
                    source.scraped_at.map(|t| t.to_rfc3339()),
                    metadata,
                    to_blob(vector),
                    stored_at,
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Rank stored sources by similarity to `text`.
    ///
    /// `collection = None` searches every collection. Matches below `min_score`
    /// similarity are dropped.
    pub async fn search(
        &self,
        collection: Option<&str>,
        text: &str,
        limit: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<SimilarSource>> {
        let query = self
            .embed(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let rows = self.load(collection)?;
        let mut scored: Vec<SimilarSource> = rows
            .into_iter()
            .map(|row| SimilarSource {
                similarity: cosine_similarity(&query, &row.embedding),
                source: row.source,
            })
            .filter(|s| min_score.map_or(true, |min| s.similarity >= min))
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        Ok(scored)
    }

    fn load(&self, collection: Option<&str>) -> Result<Vec<StoredRow>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let rows = match collection {
            Some(c) => {
                let mut stmt = conn
                    .prepare(&format!("{} WHERE collection = ?1", SELECT_SOURCE))
                    .map_err(db_err)?;
                let rows = stmt.query_map(params![c], read_row).map_err(db_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)?
            }
            None => {
                let mut stmt = conn.prepare(SELECT_SOURCE).map_err(db_err)?;
                let rows = stmt.query_map([], read_row).map_err(db_err)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)?
            }
        };
        Ok(rows)
    }

    /// Number of sources in a collection.
    pub fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.conn.lock().map_err(db_err)?;
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sources WHERE collection = ?1",
                params![collection],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(n as usize)
    }

    /// Sources at or above `threshold`, best first.
    pub fn trustworthy(&self, collection: &str, threshold: f64, limit: usize) -> Result<Vec<Source>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn
            .prepare(&format!(
                "{} WHERE collection = ?1 AND score >= ?2 ORDER BY score DESC LIMIT ?3",
                SELECT_SOURCE
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![collection, threshold, limit as i64], read_row)
            .map_err(db_err)?;
        rows.map(|r| r.map(|row| row.source))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)
    }

    /// Remove one source. Returns whether it existed.
    pub fn delete_by_url(&self, collection: &str, url: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(db_err)?;
        let n = conn
            .execute(
                "DELETE FROM sources WHERE collection = ?1 AND id = ?2",
                params![collection, source_id(url)],
            )
            .map_err(db_err)?;
        Ok(n > 0)
    }

    /// Remove every source in a collection. Returns how many were removed.
    pub fn clear(&self, collection: &str) -> Result<usize> {
        let conn = self.conn.lock().map_err(db_err)?;
        let n = conn
            .execute("DELETE FROM sources WHERE collection = ?1", params![collection])
            .map_err(db_err)?;
        info!(collection, removed = n, "Collection cleared");
        Ok(n)
    }

    /// Collections with their source counts, by name.
    pub fn collections(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn
            .prepare("SELECT collection, COUNT(*) FROM sources GROUP BY collection ORDER BY collection")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let n: i64 = row.get(1)?;
                Ok((name, n as usize))
            })
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }
}

impl VectorStore for SqliteVectorStore {
    fn add(&self, collection: &str, sources: &[Source]) -> BoxFuture<'_, Result<()>> {
        let collection = collection.to_string();
        let sources = sources.to_vec();
        Box::pin(async move {
            if sources.is_empty() {
                return Ok(());
            }
            let texts = sources.iter().map(|s| s.content.clone()).collect();
            let vectors = self.embed(texts).await?;
            self.insert(&collection, &sources, &vectors)?;
            info!(collection = %collection, count = sources.len(), "Sources stored");
            Ok(())
        })
    }

    fn query_similar(
        &self,
        collection: &str,
        text: &str,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<SimilarSource>>> {
        let collection = collection.to_string();
        let text = text.to_string();
        Box::pin(async move { self.search(Some(&collection), &text, limit, None).await })
    }

    fn get_by_url(&self, collection: &str, url: &str) -> BoxFuture<'_, Result<Option<Source>>> {
        let collection = collection.to_string();
        let id = source_id(url);
        Box::pin(async move {
            let conn = self.conn.lock().map_err(db_err)?;
            let row = conn
                .query_row(
                    &format!("{} WHERE collection = ?1 AND id = ?2", SELECT_SOURCE),
                    params![collection, id],
                    read_row,
                )
                .optional()
                .map_err(db_err)?;
            Ok(row.map(|r| r.source))
        })
    }
}
