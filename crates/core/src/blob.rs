use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Opaque blob store that keeps the original uploaded file and hands
/// back a URL chunks can reference as provenance.
#[async_trait]
pub trait BlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, ServiceError>;
}

/// Blob store speaking plain HTTP PUT against `{endpoint}/{bucket}/{key}`.
pub struct HttpBlobStore {
    client: Client,
    endpoint: String,
    bucket: String,
}

impl HttpBlobStore {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(UPLOAD_TIMEOUT)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            bucket: bucket.into(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, ServiceError> {
        let url = self.object_url(key);
        let response = self
            .client
            .put(&url)
            .header("content-type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::BadResponse(format!(
                "blob upload to {url} returned {}",
                response.status()
            )));
        }

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_url_joins_endpoint_bucket_and_key() {
        let store = HttpBlobStore::new("https://blobs.example", "finrag-documents");
        assert_eq!(
            store.object_url("doc-1/budget.pdf"),
            "https://blobs.example/finrag-documents/doc-1/budget.pdf"
        );
    }
}
