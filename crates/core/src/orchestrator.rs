use crate::embeddings::Embedder;
use crate::error::QueryError;
use crate::generation::GenerativeModel;
use crate::models::{GroundedAnswer, NoContextPolicy, QueryOptions, RetrievedChunk, SourceRef};
use crate::traits::SearchStore;
use tracing::warn;

/// Separator between context blocks in the grounded prompt.
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Returned when the generative service fails; raw provider errors never
/// reach the caller.
pub const FALLBACK_ANSWER: &str =
    "I encountered an error processing your request. Please try again.";

/// Returned under [`NoContextPolicy::CannedReply`] when retrieval finds
/// nothing.
pub const NO_DOCUMENTS_ANSWER: &str =
    "I couldn't find relevant documents for that question. Please upload documents or try a different query.";

/// Question/answer pipeline: embed the query, retrieve the most relevant
/// chunks, and assemble a grounded answer with deduplicated citations.
pub struct QueryCoordinator<E, S, G>
where
    E: Embedder,
    S: SearchStore,
    G: GenerativeModel,
{
    embedder: E,
    store: S,
    model: G,
    options: QueryOptions,
}

impl<E, S, G> QueryCoordinator<E, S, G>
where
    E: Embedder + Send + Sync,
    S: SearchStore + Send + Sync,
    G: GenerativeModel + Send + Sync,
{
    pub fn new(embedder: E, store: S, model: G, options: QueryOptions) -> Self {
        Self {
            embedder,
            store,
            model,
            options,
        }
    }

    pub async fn answer(&self, query: &str) -> Result<GroundedAnswer, QueryError> {
        if query.trim().is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        // A failed query embedding is fatal for this request: retrieval
        // cannot proceed without the vector.
        let query_vector = self
            .embedder
            .embed(query)
            .await
            .map_err(QueryError::Embedding)?;

        let retrieved = self
            .store
            .knn_search(&query_vector, self.options.top_k)
            .await?;

        if retrieved.is_empty() {
            return Ok(self.answer_without_context(query).await);
        }

        let prompt = build_grounded_prompt(query, &retrieved);
        let answer = self.complete_or_fallback(&prompt).await;

        Ok(GroundedAnswer {
            answer,
            sources: dedup_sources(&retrieved),
        })
    }

    async fn answer_without_context(&self, query: &str) -> GroundedAnswer {
        let answer = match self.options.no_context_policy {
            NoContextPolicy::CannedReply => NO_DOCUMENTS_ANSWER.to_string(),
            NoContextPolicy::DiscloseToModel => {
                self.complete_or_fallback(&build_ungrounded_prompt(query))
                    .await
            }
        };

        GroundedAnswer {
            answer,
            sources: Vec::new(),
        }
    }

    async fn complete_or_fallback(&self, prompt: &str) -> String {
        match self
            .model
            .complete(
                prompt,
                self.options.temperature,
                self.options.max_output_tokens,
            )
            .await
        {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "generative service failed, returning fallback answer");
                FALLBACK_ANSWER.to_string()
            }
        }
    }
}

/// Builds the system prompt constraining the model to the retrieved
/// context, with per-source citations and a financial red-flag check.
pub fn build_grounded_prompt(query: &str, retrieved: &[RetrievedChunk]) -> String {
    let context = retrieved
        .iter()
        .enumerate()
        .map(|(position, chunk)| {
            format!(
                "Document {} ({}):\n{}",
                position + 1,
                chunk.source_filename,
                chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    format!(
        "You are a financial transparency assistant.\n\n\
         CONTEXT:\n{context}\n\n\
         USER QUESTION: {query}\n\n\
         INSTRUCTIONS:\n\
         1. Answer ONLY using the provided documents.\n\
         2. Cite the document each claim comes from (e.g. \"According to Document 1...\").\n\
         3. Highlight suspicious patterns or red flags in the figures.\n\
         4. Be concise and use bullet points for key findings.\n\n\
         ANSWER:"
    )
}

fn build_ungrounded_prompt(query: &str) -> String {
    format!(
        "You are a financial transparency assistant. No uploaded documents \
         matched this question, so answer from general knowledge and state \
         clearly that the answer is not grounded in any uploaded document.\n\n\
         USER QUESTION: {query}\n\nANSWER:"
    )
}

/// Deduplicates `(source_filename, source_url)` pairs across the
/// retrieved chunks, first-seen order.
fn dedup_sources(retrieved: &[RetrievedChunk]) -> Vec<SourceRef> {
    let mut sources: Vec<SourceRef> = Vec::new();

    for chunk in retrieved {
        let source = SourceRef {
            filename: chunk.source_filename.clone(),
            url: chunk.source_url.clone(),
        };
        if !sources.contains(&source) {
            sources.push(source);
        }
    }

    sources
}
