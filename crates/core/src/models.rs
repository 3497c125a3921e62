use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported upload formats, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    Pdf,
    Spreadsheet,
    Csv,
}

impl DocumentFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = filename.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())?;
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "xlsx" | "xls" => Some(Self::Spreadsheet),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Spreadsheet => "spreadsheet",
            Self::Csv => "csv",
        }
    }
}

/// One uploaded file. Immutable once created; a re-upload produces a new
/// record with a fresh id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub source_filename: String,
    pub source_url: Option<String>,
    pub checksum: String,
    pub uploaded_at: DateTime<Utc>,
}

/// One retrievable unit of document text.
///
/// `vector` is present once embedding succeeds; a chunk that failed to
/// embed can still be written without it and stays full-text searchable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    pub source_filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub amounts: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Chunking policy. Defaults follow the ingestion behavior the rest of
/// the pipeline is tested against: paragraph sections up to 2000 chars,
/// 1500-char fixed windows as fallback, 50-char minimum.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingOptions {
    pub max_section_chars: usize,
    pub window_chars: usize,
    pub min_chunk_chars: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            max_section_chars: 2_000,
            window_chars: 1_500,
            min_chunk_chars: 50,
        }
    }
}

/// One retrieval hit, ordered by descending relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub score: f64,
    pub text: String,
    pub source_filename: String,
    pub source_url: Option<String>,
}

/// A deduplicated citation entry in an answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub filename: String,
    pub url: Option<String>,
}

/// Final product of the query pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Per-chunk failure surfaced by a bulk index write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFailure {
    pub chunk_id: String,
    pub reason: String,
}

/// Outcome of one bulk write. Partial failure is expected and reported
/// per item, never as a whole-batch error.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    pub indexed: usize,
    pub failures: Vec<IndexFailure>,
}

/// What one upload produced.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub document_id: String,
    pub source_filename: String,
    pub source_url: Option<String>,
    pub chunks_indexed: usize,
    /// Chunks dropped because their embedding call failed.
    pub chunks_skipped: usize,
    pub index_failures: Vec<IndexFailure>,
}

/// What to do when retrieval finds nothing for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoContextPolicy {
    /// Return a fixed message without calling the generative service.
    CannedReply,
    /// Still call the generative service, disclosing that no grounding
    /// documents were found.
    DiscloseToModel,
}

/// Tunables for the question/answer pipeline.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub top_k: usize,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub no_context_policy: NoContextPolicy,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            temperature: 0.3,
            max_output_tokens: 2_048,
            no_context_policy: NoContextPolicy::CannedReply,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_decided_by_extension_case_insensitively() {
        assert_eq!(
            DocumentFormat::from_filename("budget.PDF"),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::from_filename("ledger.xls"),
            Some(DocumentFormat::Spreadsheet)
        );
        assert_eq!(
            DocumentFormat::from_filename("rows.csv"),
            Some(DocumentFormat::Csv)
        );
        assert_eq!(DocumentFormat::from_filename("notes.txt"), None);
        assert_eq!(DocumentFormat::from_filename("no_extension"), None);
    }

    #[test]
    fn chunk_without_vector_serializes_without_the_field() {
        let chunk = DocumentChunk {
            chunk_id: "doc_0".into(),
            document_id: "doc".into(),
            text: "some text".into(),
            vector: None,
            source_filename: "a.csv".into(),
            source_url: None,
            amounts: Vec::new(),
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&chunk).unwrap();
        assert!(value.get("vector").is_none());
        assert!(value.get("source_url").is_none());
    }
}
