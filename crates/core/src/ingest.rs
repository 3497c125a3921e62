use crate::blob::BlobStore;
use crate::chunking::{build_chunks, clean_text};
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extractor::extract;
use crate::models::{ChunkingOptions, DocumentFormat, DocumentRecord, IngestReceipt};
use crate::traits::SearchStore;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;
use walkdir::WalkDir;

/// Recursively lists the files under `folder` with a supported
/// extension (pdf, xlsx, xls, csv), sorted for stable ingestion order.
pub fn discover_supported_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(DocumentFormat::from_filename)
            .is_some();

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Upload-to-index pipeline: extract, normalize, chunk, embed, write.
///
/// Extraction and empty-content failures abort before any store
/// mutation, so a rejected upload leaves no partially indexed document.
/// Per-chunk embedding failures skip that chunk and continue; per-chunk
/// index-write failures are reported in the receipt.
pub struct IngestPipeline<E, S> {
    embedder: E,
    store: S,
    blob: Option<Box<dyn BlobStore + Send + Sync>>,
    options: ChunkingOptions,
}

impl<E, S> IngestPipeline<E, S>
where
    E: Embedder + Send + Sync,
    S: SearchStore + Send + Sync,
{
    pub fn new(embedder: E, store: S, options: ChunkingOptions) -> Self {
        Self {
            embedder,
            store,
            blob: None,
            options,
        }
    }

    /// Also persist each original file to a blob store and stamp chunks
    /// with the resulting URL.
    pub fn with_blob_store(mut self, blob: Box<dyn BlobStore + Send + Sync>) -> Self {
        self.blob = Some(blob);
        self
    }

    pub async fn ingest(&self, bytes: &[u8], filename: &str) -> Result<IngestReceipt, IngestError> {
        let format = DocumentFormat::from_filename(filename)
            .ok_or_else(|| IngestError::UnsupportedFormat(filename.to_string()))?;

        let raw = extract(bytes, format)?;
        let clean = clean_text(&raw);
        if clean.is_empty() {
            return Err(IngestError::EmptyContent);
        }

        let document_id = Uuid::new_v4().to_string();
        let source_url = match &self.blob {
            Some(blob) => Some(
                blob.put(&format!("{document_id}/{filename}"), bytes)
                    .await
                    .map_err(IngestError::BlobUpload)?,
            ),
            None => None,
        };

        let record = DocumentRecord {
            document_id,
            source_filename: filename.to_string(),
            source_url,
            checksum: digest_bytes(bytes),
            uploaded_at: Utc::now(),
        };

        let chunks = build_chunks(&clean, &record, &self.options, record.uploaded_at)?;
        if chunks.is_empty() {
            return Err(IngestError::EmptyContent);
        }

        // Embedding calls are independent: one failure drops that chunk
        // from the batch and the rest continue.
        let mut batch = Vec::with_capacity(chunks.len());
        let mut skipped = 0usize;
        for mut chunk in chunks {
            match self.embedder.embed(&chunk.text).await {
                Ok(vector) => {
                    chunk.vector = Some(vector);
                    batch.push(chunk);
                }
                Err(error) => {
                    warn!(chunk_id = %chunk.chunk_id, %error, "embedding failed, skipping chunk");
                    skipped += 1;
                }
            }
        }

        self.store.ensure_schema().await?;
        let report = self.store.write_batch(&batch).await?;

        Ok(IngestReceipt {
            document_id: record.document_id,
            source_filename: record.source_filename,
            source_url: record.source_url,
            chunks_indexed: report.indexed,
            chunks_skipped: skipped,
            index_failures: report.failures,
        })
    }

    /// Convenience for CLI use: read one file and ingest it.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReceipt, IngestError> {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
            .to_string();

        let bytes = tokio::fs::read(path).await?;
        self.ingest(&bytes, &filename).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SearchError, ServiceError};
    use crate::models::{DocumentChunk, IndexReport, RetrievedChunk};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FakeEmbedder {
        fail_on_call: Option<usize>,
        calls: AtomicUsize,
    }

    impl FakeEmbedder {
        fn reliable() -> Self {
            Self {
                fail_on_call: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_once(call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                return Err(ServiceError::BadResponse("quota exceeded".to_string()));
            }
            Ok(vec![0.1, 0.2, 0.3, 0.4])
        }
    }

    #[derive(Default)]
    struct FakeStore {
        written: Mutex<Vec<DocumentChunk>>,
        schema_calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchStore for Arc<FakeStore> {
        async fn ensure_schema(&self) -> Result<(), SearchError> {
            self.schema_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn write_batch(&self, chunks: &[DocumentChunk]) -> Result<IndexReport, SearchError> {
            self.written.lock().unwrap().extend_from_slice(chunks);
            Ok(IndexReport {
                indexed: chunks.len(),
                failures: Vec::new(),
            })
        }

        async fn knn_search(
            &self,
            _query_vector: &[f32],
            _k: usize,
        ) -> Result<Vec<RetrievedChunk>, SearchError> {
            Ok(Vec::new())
        }
    }

    /// CSV whose cleaned text is one long paragraph, forcing the
    /// fixed-window fallback into several chunks.
    fn long_csv() -> Vec<u8> {
        let mut csv = String::from("id,description\n");
        for row in 0..100 {
            csv.push_str(&format!("{row},spending line item with recurring detail\n"));
        }
        csv.into_bytes()
    }

    #[tokio::test]
    async fn successful_ingest_writes_embedded_chunks() {
        let store = Arc::new(FakeStore::default());
        let pipeline =
            IngestPipeline::new(FakeEmbedder::reliable(), store.clone(), ChunkingOptions::default());

        let receipt = pipeline.ingest(&long_csv(), "ledger.csv").await.unwrap();

        let written = store.written.lock().unwrap();
        assert!(receipt.chunks_indexed >= 2);
        assert_eq!(receipt.chunks_indexed, written.len());
        assert_eq!(receipt.chunks_skipped, 0);
        assert!(written.iter().all(|chunk| chunk.vector.is_some()));
        assert!(written
            .iter()
            .all(|chunk| chunk.document_id == receipt.document_id));
        assert_eq!(store.schema_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_embedding_failure_skips_only_that_chunk() {
        let reference_store = Arc::new(FakeStore::default());
        let reference = IngestPipeline::new(
            FakeEmbedder::reliable(),
            reference_store.clone(),
            ChunkingOptions::default(),
        );
        let total = reference
            .ingest(&long_csv(), "ledger.csv")
            .await
            .unwrap()
            .chunks_indexed;

        let store = Arc::new(FakeStore::default());
        let pipeline = IngestPipeline::new(
            FakeEmbedder::failing_once(0),
            store.clone(),
            ChunkingOptions::default(),
        );
        let receipt = pipeline.ingest(&long_csv(), "ledger.csv").await.unwrap();

        assert_eq!(receipt.chunks_skipped, 1);
        assert_eq!(receipt.chunks_indexed, total - 1);
        assert_eq!(store.written.lock().unwrap().len(), total - 1);
    }

    #[tokio::test]
    async fn empty_extraction_rejects_before_any_store_write() {
        let store = Arc::new(FakeStore::default());
        let pipeline =
            IngestPipeline::new(FakeEmbedder::reliable(), store.clone(), ChunkingOptions::default());

        // Parses as CSV but yields nothing above the minimum chunk length.
        let result = pipeline.ingest(b"a,b\n", "empty.csv").await;

        assert!(matches!(result, Err(IngestError::EmptyContent)));
        assert_eq!(store.schema_calls.load(Ordering::SeqCst), 0);
        assert!(store.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_rejects_before_any_store_write() {
        let store = Arc::new(FakeStore::default());
        let pipeline =
            IngestPipeline::new(FakeEmbedder::reliable(), store.clone(), ChunkingOptions::default());

        let result = pipeline.ingest(b"%PDF-1.4\n%broken", "broken.pdf").await;

        assert!(matches!(result, Err(IngestError::ExtractionFailed { .. })));
        assert!(store.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_extension_is_rejected() {
        let store = Arc::new(FakeStore::default());
        let pipeline =
            IngestPipeline::new(FakeEmbedder::reliable(), store.clone(), ChunkingOptions::default());

        let result = pipeline.ingest(b"whatever", "notes.txt").await;
        assert!(matches!(result, Err(IngestError::UnsupportedFormat(_))));
    }

    #[test]
    fn discovery_is_recursive_and_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"x").unwrap();
        std::fs::write(nested.join("b.xlsx"), b"x").unwrap();
        std::fs::write(nested.join("ignore.txt"), b"x").unwrap();

        let files = discover_supported_files(dir.path());
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn checksum_is_reproducible() {
        assert_eq!(digest_bytes(b"abc"), digest_bytes(b"abc"));
        assert_ne!(digest_bytes(b"abc"), digest_bytes(b"abd"));
    }
}
