use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns text into a fixed-length vector via an external embedding
/// service. The model itself is opaque; this seam only owns the calling
/// discipline.
#[async_trait]
pub trait Embedder {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// HTTP client for a JSON embedding endpoint.
pub struct RestEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl RestEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimensions: usize,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(EMBED_TIMEOUT)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
            dimensions,
        }
    }
}

#[async_trait]
impl Embedder for RestEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let mut request = self.client.post(&self.endpoint).json(&EmbedRequest {
            model: &self.model,
            text,
        });

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::BadResponse(format!(
                "embedding endpoint returned {}",
                response.status()
            )));
        }

        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|error| ServiceError::BadResponse(error.to_string()))?;

        validate_dimensions(&payload.embedding, self.dimensions)
    }
}

fn validate_dimensions(embedding: &[f32], expected: usize) -> Result<Vec<f32>, ServiceError> {
    if embedding.is_empty() {
        return Err(ServiceError::BadResponse(
            "embedding response was empty".to_string(),
        ));
    }
    if embedding.len() != expected {
        return Err(ServiceError::BadResponse(format!(
            "embedding dimension {} != expected {}",
            embedding.len(),
            expected
        )));
    }
    Ok(embedding.to_vec())
}
