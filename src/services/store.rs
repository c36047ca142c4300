// Content store accessor
//
// The store is an external collaborator reached through the narrow
// get/put surface below; everything else (presigned URLs, listing,
// metadata) belongs to other services.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::errors::{StoreError, StoreResult};

/// Narrow object-store interface used by the swap pipeline and the
/// caption handler. Injected so tests can substitute an in-memory
/// fake without touching orchestration logic.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>>;
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> StoreResult<()>;
}

/// HTTP object-store client against an S3-style gateway
/// (`{base}/{bucket}/{key}`).
pub struct HttpStore {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, key)
    }

    fn map_status(status: StatusCode, bucket: &str, key: &str) -> StoreError {
        match status {
            StatusCode::NOT_FOUND => StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => StoreError::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            other => StoreError::Transport(format!("unexpected store status {}", other)),
        }
    }
}

#[async_trait]
impl ContentStore for HttpStore {
    #[instrument(skip(self), fields(bucket = bucket, key = key))]
    async fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        let url = self.object_url(bucket, key);
        debug!("Fetching object {}/{}", bucket, key);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(status, bucket, key));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        debug!("Fetched {} bytes from {}/{}", bytes.len(), bucket, key);
        Ok(bytes.to_vec())
    }

    #[instrument(skip(self, bytes), fields(bucket = bucket, key = key, size = bytes.len()))]
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> StoreResult<()> {
        let url = self.object_url(bucket, key);
        debug!("Uploading {} bytes to {}/{}", bytes.len(), bucket, key);

        let response = self
            .http_client
            .put(&url)
            .body(bytes)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::map_status(status, bucket, key));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store_for(server: &MockServer) -> HttpStore {
        HttpStore::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_body_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pics/a.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let bytes = store.get("pics", "a.png").await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_get_maps_missing_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pics/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let err = store.get("pics", "missing.png").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_maps_access_denied() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pics/secret.png"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let err = store.get("pics", "secret.png").await.unwrap_err();
        assert!(matches!(err, StoreError::AccessDenied { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pics/broken.png"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let err = store.get("pics", "broken.png").await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }

    #[tokio::test]
    async fn test_put_uploads_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/pics/out.png"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        store.put("pics", "out.png", vec![9u8; 16]).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_denied() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/pics/out.png"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let err = store.put("pics", "out.png", vec![0u8]).await.unwrap_err();
        assert!(matches!(err, StoreError::AccessDenied { .. }));
    }
}
