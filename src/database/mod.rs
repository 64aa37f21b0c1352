pub mod database;
pub mod local_store;
pub mod qdrant_config;
pub mod vector_db;
pub mod vector_store;

pub use database::{Database, DatabaseError, DocumentRecord, SessionRecord};
pub use local_store::LocalVectorStore;
pub use vector_db::QdrantVectorStore;
pub use vector_store::{Chunk, ScoredChunk, VectorStore, VectorStoreError};

use crate::config::AppConfig;
use std::sync::Arc;

/// Opens Qdrant when `QDRANT_URL` is set, the embedded store otherwise.
pub async fn open_vector_store(config: &AppConfig) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match &config.qdrant_url {
        Some(url) => Ok(Arc::new(QdrantVectorStore::connect(url, &config.qdrant_collection).await?)),
        None => Ok(Arc::new(LocalVectorStore::open(&config.vector_store_dir).await?)),
    }
}
