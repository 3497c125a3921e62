pub mod blob;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod stores;
pub mod traits;

pub use blob::{BlobStore, HttpBlobStore};
pub use chunking::{build_chunks, clean_text, split_sections};
pub use embeddings::{Embedder, RestEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, QueryError, SearchError, ServiceError};
pub use extractor::extract;
pub use generation::{GenerativeModel, RestGenerativeClient};
pub use ingest::{digest_bytes, discover_supported_files, IngestPipeline};
pub use models::{
    ChunkingOptions, DocumentChunk, DocumentFormat, DocumentRecord, GroundedAnswer, IndexFailure,
    IndexReport, IngestReceipt, NoContextPolicy, QueryOptions, RetrievedChunk, SourceRef,
};
pub use orchestrator::{
    build_grounded_prompt, QueryCoordinator, FALLBACK_ANSWER, NO_DOCUMENTS_ANSWER,
};
pub use stores::ElasticStore;
pub use traits::SearchStore;
