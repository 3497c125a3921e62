use thiserror::Error;

/// Errors raised while turning an uploaded file into indexed chunks.
///
/// Extraction and content errors terminate the upload before any store
/// mutation; embedding and index-write problems are partial-success
/// tolerant and reported through [`crate::IngestReceipt`] instead.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed for {format}: {details}")]
    ExtractionFailed { format: String, details: String },

    #[error("document produced no indexable text after normalization")]
    EmptyContent,

    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("blob upload failed: {0}")]
    BlobUpload(#[source] ServiceError),

    #[error(transparent)]
    Store(#[from] SearchError),
}

/// Errors from the search store (schema, bulk write, kNN query).
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),
}

/// Errors from the remote embedding and generative services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned an unusable response: {0}")]
    BadResponse(String),
}

/// Errors that abort one question/answer request.
///
/// A generative-service failure never appears here: the coordinator
/// converts it to a fixed fallback answer at its outer boundary.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("query embedding failed: {0}")]
    Embedding(#[source] ServiceError),

    #[error(transparent)]
    Store(#[from] SearchError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
