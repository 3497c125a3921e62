use crate::error::SearchError;
use crate::models::{DocumentChunk, IndexReport, RetrievedChunk};
use async_trait::async_trait;

/// The search store behind the pipeline: keyword/full-text fields plus a
/// dense vector field with cosine similarity.
///
/// Schema creation is the one shared mutation and must be idempotent.
/// Bulk writes are upserts keyed by `chunk_id` with per-item failure
/// reporting. A kNN search that finds nothing returns an empty Vec, not
/// an error.
#[async_trait]
pub trait SearchStore {
    async fn ensure_schema(&self) -> Result<(), SearchError>;

    async fn write_batch(&self, chunks: &[DocumentChunk]) -> Result<IndexReport, SearchError>;

    async fn knn_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError>;
}
