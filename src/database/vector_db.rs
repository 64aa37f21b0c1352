use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder,
    Distance, Filter, PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::qdrant_config::create_qdrant_client;
use super::vector_store::{check_counts, Chunk, ScoredChunk, VectorStore, VectorStoreError};

/// Qdrant-backed store, used when `QDRANT_URL` is configured.
#[derive(Clone)]
pub struct QdrantVectorStore {
    client: Arc<Qdrant>,
    collection: String,
}

fn op_err(e: impl std::fmt::Display) -> VectorStoreError {
    VectorStoreError::Operation(e.to_string())
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn payload_int(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(i) => Some(*i),
        Kind::DoubleValue(d) => Some(*d as i64),
        _ => None,
    }
}

impl QdrantVectorStore {
    pub async fn connect(url: &str, collection: &str) -> Result<Self, VectorStoreError> {
        let client = create_qdrant_client(url).await?;
        Ok(Self {
            client: Arc::new(client),
            collection: collection.to_string(),
        })
    }

    async fn collection_exists(&self) -> Result<bool, VectorStoreError> {
        self.client.collection_exists(self.collection.clone()).await.map_err(op_err)
    }

    async fn ensure_collection(&self, vector_size: u64) -> Result<(), VectorStoreError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        match self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
        {
            Ok(_) => {
                log::info!("Created Qdrant collection {} ({} dims)", self.collection, vector_size);
                Ok(())
            }
            Err(e) if e.to_string().contains("already exists") => {
                log::info!("Collection {} already exists, skipping creation", self.collection);
                Ok(())
            }
            Err(e) => Err(op_err(e)),
        }
    }

    fn source_filter(source: &str) -> Filter {
        Filter::must([Condition::matches("source", source.to_string())])
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn replace_source(
        &self,
        source: &str,
        chunks: Vec<String>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize, VectorStoreError> {
        check_counts(&chunks, &embeddings)?;
        let Some(dimension) = embeddings.first().map(|e| e.len() as u64) else {
            self.delete_source(source).await?;
            return Ok(0);
        };

        self.ensure_collection(dimension).await?;
        self.delete_source(source).await?;

        let points: Vec<PointStruct> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (text, embedding))| {
                let mut payload = Payload::new();
                payload.insert("source", source.to_string());
                payload.insert("chunk_index", index as i64);
                payload.insert("text", text);
                PointStruct::new(Uuid::new_v4().to_string(), embedding, payload)
            })
            .collect();
        let count = points.len();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(op_err)?;

        Ok(count)
    }

    async fn search(
        &self,
        embedding: &[f32],
        source: Option<&str>,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        if k == 0 || !self.collection_exists().await? {
            return Ok(Vec::new());
        }

        let mut request = SearchPointsBuilder::new(&self.collection, embedding.to_vec(), k as u64)
            .with_payload(true);
        if let Some(source) = source {
            request = request.filter(Self::source_filter(source));
        }

        let response = self.client
            .search_points(request)
            .await
            .map_err(op_err)?;

        let results = response
            .result
            .into_iter()
            .filter_map(|point| {
                let text = payload_str(&point.payload, "text")?;
                let source = payload_str(&point.payload, "source").unwrap_or_default();
                let chunk_index = payload_int(&point.payload, "chunk_index").unwrap_or(0).max(0) as usize;
                Some(ScoredChunk {
                    chunk: Chunk { source, chunk_index, text },
                    score: point.score,
                })
            })
            .collect();

        Ok(results)
    }

    async fn delete_source(&self, source: &str) -> Result<(), VectorStoreError> {
        if !self.collection_exists().await? {
            return Ok(());
        }

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(Self::source_filter(source))
                    .wait(true),
            )
            .await
            .map_err(op_err)?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        if !self.collection_exists().await? {
            return Ok(0);
        }

        let response = self.client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(op_err)?;
        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    fn backend(&self) -> &'static str {
        "qdrant"
    }
}
