use crate::error::SearchError;
use crate::models::{DocumentChunk, IndexFailure, IndexReport, RetrievedChunk};
use crate::traits::SearchStore;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

/// Candidate-pool multiplier for approximate kNN. Exploring well past
/// `k` keeps recall acceptable on small indexes.
const KNN_CANDIDATE_FACTOR: usize = 20;

const STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Elasticsearch-backed [`SearchStore`] over the plain JSON REST API.
pub struct ElasticStore {
    client: Client,
    endpoint: String,
    index_name: String,
    api_key: Option<String>,
    vector_dimensions: usize,
}

impl ElasticStore {
    pub fn new(
        endpoint: impl Into<String>,
        index_name: impl Into<String>,
        api_key: Option<String>,
        vector_dimensions: usize,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(STORE_TIMEOUT)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            index_name: index_name.into(),
            api_key,
            vector_dimensions,
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("authorization", format!("ApiKey {key}")),
            None => request,
        }
    }

    /// Startup liveness probe; lets callers fail fast before accepting
    /// work instead of checking the client on every request.
    pub async fn ping(&self) -> Result<(), SearchError> {
        let response = self
            .authorized(self.client.get(&self.endpoint))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    fn index_mapping(&self) -> Value {
        json!({
            "settings": {
                "analysis": {
                    "analyzer": {
                        "english": {
                            "tokenizer": "standard",
                            "filter": ["lowercase", "stop", "kstem"]
                        }
                    }
                }
            },
            "mappings": {
                "properties": {
                    "document_id": {"type": "keyword"},
                    "source_filename": {"type": "keyword"},
                    "source_url": {"type": "keyword", "index": false},
                    "chunk_id": {"type": "keyword"},
                    "amounts": {"type": "keyword"},
                    "text": {
                        "type": "text",
                        "analyzer": "english"
                    },
                    "vector": {
                        "type": "dense_vector",
                        "dims": self.vector_dimensions,
                        "index": true,
                        "similarity": "cosine"
                    },
                    "timestamp": {"type": "date"}
                }
            }
        })
    }
}

#[async_trait]
impl SearchStore for ElasticStore {
    async fn ensure_schema(&self) -> Result<(), SearchError> {
        let index_url = format!("{}/{}", self.endpoint, self.index_name);
        let response = self
            .authorized(self.client.head(&index_url))
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if !response.status().is_client_error() {
            return Err(SearchError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .authorized(self.client.put(&index_url))
            .json(&self.index_mapping())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Request(format!(
                "index setup failed with {}",
                response.status()
            )));
        }

        tracing::info!(index = %self.index_name, "created search index");
        Ok(())
    }

    async fn write_batch(&self, chunks: &[DocumentChunk]) -> Result<IndexReport, SearchError> {
        if chunks.is_empty() {
            return Ok(IndexReport::default());
        }

        let payload = bulk_payload(&self.index_name, chunks)?;
        let response = self
            .authorized(self.client.post(format!("{}/_bulk", self.endpoint)))
            .header("content-type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        Ok(parse_bulk_report(&body, chunks.len()))
    }

    async fn knn_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError> {
        let body = json!({
            "knn": {
                "field": "vector",
                "query_vector": query_vector,
                "k": k,
                "num_candidates": k * KNN_CANDIDATE_FACTOR
            },
            "size": k,
            "_source": ["text", "source_filename", "source_url"]
        });

        let response = self
            .authorized(
                self.client
                    .post(format!("{}/{}/_search", self.endpoint, self.index_name)),
            )
            .json(&body)
            .send()
            .await?;

        // A not-yet-created index means nothing was ingested: a valid
        // empty result, not a retrieval error.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        Ok(parse_knn_hits(&body))
    }
}

/// NDJSON `_bulk` body: an `index` action per chunk, keyed by chunk id
/// so re-ingesting a document id overwrites its chunks in place.
fn bulk_payload(index_name: &str, chunks: &[DocumentChunk]) -> Result<String, SearchError> {
    let mut lines = Vec::with_capacity(chunks.len() * 2);

    for chunk in chunks {
        lines.push(serde_json::to_string(&json!({
            "index": {"_index": index_name, "_id": chunk.chunk_id}
        }))?);
        lines.push(serde_json::to_string(chunk)?);
    }

    Ok(lines.join("\n") + "\n")
}

fn parse_bulk_report(body: &Value, total: usize) -> IndexReport {
    let had_errors = body
        .pointer("/errors")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if !had_errors {
        return IndexReport {
            indexed: total,
            failures: Vec::new(),
        };
    }

    let mut failures = Vec::new();
    let items = body
        .pointer("/items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for item in items {
        let action = item.pointer("/index").cloned().unwrap_or(Value::Null);
        if let Some(error) = action.pointer("/error") {
            failures.push(IndexFailure {
                chunk_id: action
                    .pointer("/_id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                reason: error
                    .pointer("/reason")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown index error")
                    .to_string(),
            });
        }
    }

    IndexReport {
        indexed: total.saturating_sub(failures.len()),
        failures,
    }
}

fn parse_knn_hits(body: &Value) -> Vec<RetrievedChunk> {
    let hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.into_iter()
        .map(|hit| {
            let source = hit.pointer("/_source").cloned().unwrap_or(Value::Null);
            RetrievedChunk {
                score: hit.pointer("/_score").and_then(Value::as_f64).unwrap_or(0.0),
                text: source
                    .pointer("/text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                source_filename: source
                    .pointer("/source_filename")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                source_url: source
                    .pointer("/source_url")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }
        })
        .collect()
}
