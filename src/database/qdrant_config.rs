use qdrant_client::Qdrant;
use std::time::Duration;

use super::vector_store::VectorStoreError;

/// The Qdrant client speaks gRPC, which listens on 6334; users usually copy the
/// REST URL (port 6333) from the dashboard.
pub fn grpc_url(url: &str) -> String {
    let clean_url = match url.split_once("://") {
        Some((_, rest)) => rest,
        None => url,
    }
    .trim_end_matches('/');

    let grpc = if let Some(host) = clean_url.strip_suffix(":6333") {
        format!("{}:6334", host)
    } else {
        clean_url.to_string()
    };

    format!("http://{}", grpc)
}

pub async fn create_qdrant_client(url: &str) -> Result<Qdrant, VectorStoreError> {
    let url_with_scheme = grpc_url(url);
    log::info!("Attempting to connect to Qdrant with URL: {}", url_with_scheme);

    let client = Qdrant::from_url(&url_with_scheme)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

    match client.list_collections().await {
        Ok(_) => {
            log::info!("Successfully connected to Qdrant");
            Ok(client)
        }
        Err(e) => {
            log::error!("Connection test failed: {}", e);
            Err(VectorStoreError::Connection(format!("Failed to connect to Qdrant: {}", e)))
        }
    }
}
