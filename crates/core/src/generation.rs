use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Opaque text-completion service. The pipeline only decides what prompt
/// to send and how to contain failures.
#[async_trait]
pub trait GenerativeModel {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<String, ServiceError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

/// HTTP client for a JSON text-completion endpoint.
pub struct RestGenerativeClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl RestGenerativeClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(GENERATION_TIMEOUT)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        }
    }
}

#[async_trait]
impl GenerativeModel for RestGenerativeClient {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<String, ServiceError> {
        let mut request = self.client.post(&self.endpoint).json(&CompletionRequest {
            model: &self.model,
            prompt,
            temperature,
            max_output_tokens,
        });

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ServiceError::BadResponse(format!(
                "generation endpoint returned {}",
                response.status()
            )));
        }

        let payload: CompletionResponse = response
            .json()
            .await
            .map_err(|error| ServiceError::BadResponse(error.to_string()))?;

        if payload.text.trim().is_empty() {
            return Err(ServiceError::BadResponse(
                "generation response was empty".to_string(),
            ));
        }

        Ok(payload.text)
    }
}
