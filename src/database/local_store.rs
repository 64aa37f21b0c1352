use async_trait::async_trait;
use rusqlite::params;
use std::path::Path;
use std::sync::Arc;
use tokio_rusqlite::Connection;

use super::vector_store::{check_counts, cosine_similarity, Chunk, ScoredChunk, VectorStore, VectorStoreError};

/// Embedded vector store: chunks and their embeddings live in a SQLite file and
/// search is an exact cosine scan, which is plenty for a learner's notes.
#[derive(Clone)]
pub struct LocalVectorStore {
    conn: Arc<Connection>,
}

impl LocalVectorStore {
    pub async fn open<P: AsRef<Path>>(dir: P) -> Result<Self, VectorStoreError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| VectorStoreError::Connection(format!("{}: {}", dir.display(), e)))?;

        let path = dir.join("chunks.db");
        let conn = Connection::open(&path)
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
        log::info!("Opened local vector store at {}", path.display());
        Self::with_connection(conn).await
    }

    pub async fn open_in_memory() -> Result<Self, VectorStoreError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, VectorStoreError> {
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS chunks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    source TEXT NOT NULL,
                    chunk_index INTEGER NOT NULL,
                    text TEXT NOT NULL,
                    embedding BLOB NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks (source);",
            )?;
            Ok(())
        })
        .await?;

        Ok(Self { conn: Arc::new(conn) })
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn replace_source(
        &self,
        source: &str,
        chunks: Vec<String>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize, VectorStoreError> {
        check_counts(&chunks, &embeddings)?;

        let source = source.to_string();
        let rows: Vec<(String, Vec<u8>)> = chunks
            .into_iter()
            .zip(embeddings.iter().map(|e| encode_embedding(e)))
            .collect();
        let count = rows.len();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM chunks WHERE source = ?1", [&source])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO chunks (source, chunk_index, text, embedding) VALUES (?1, ?2, ?3, ?4)",
                    )?;
                    for (index, (text, blob)) in rows.iter().enumerate() {
                        stmt.execute(params![source, index as i64, text, blob])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;

        log::debug!("Stored {} chunks in local vector store", count);
        Ok(count)
    }

    async fn search(
        &self,
        embedding: &[f32],
        source: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = embedding.to_vec();
        let source = source.map(str::to_string);
        let mut scored = self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT source, chunk_index, text, embedding FROM chunks
                     WHERE ?1 IS NULL OR source = ?1
                     ORDER BY id ASC",
                )?;
                let rows = stmt.query_map(params![source], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                })?;

                let mut scored = Vec::new();
                for row in rows {
                    let (source, chunk_index, text, blob) = row?;
                    // Vectors from a different embedding model have another dimension.
                    if let Some(score) = cosine_similarity(&query, &decode_embedding(&blob)) {
                        scored.push(ScoredChunk {
                            chunk: Chunk {
                                source,
                                chunk_index: chunk_index.max(0) as usize,
                                text,
                            },
                            score,
                        });
                    }
                }
                Ok(scored)
            })
            .await?;

        // Stable sort keeps insertion order between equal scores.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_source(&self, source: &str) -> Result<(), VectorStoreError> {
        let source = source.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM chunks WHERE source = ?1", [&source])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        let count = self.conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count.max(0) as usize)
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
