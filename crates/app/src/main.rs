use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use finrag_core::{
    discover_supported_files, ChunkingOptions, ElasticStore, HttpBlobStore, IngestPipeline,
    NoContextPolicy, QueryCoordinator, QueryOptions, RestEmbedder, RestGenerativeClient,
    SearchStore,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "finrag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Elasticsearch base URL
    #[arg(long, env = "ELASTIC_ENDPOINT", default_value = "http://localhost:9200")]
    elastic_url: String,

    /// Elasticsearch API key
    #[arg(long, env = "ELASTIC_API_KEY")]
    elastic_api_key: Option<String>,

    /// Index that holds the document chunks
    #[arg(long, env = "ELASTIC_INDEX_NAME", default_value = "finrag-documents")]
    index: String,

    /// Embedding service URL
    #[arg(
        long,
        env = "EMBEDDING_ENDPOINT",
        default_value = "http://localhost:11434/api/embeddings"
    )]
    embedding_url: String,

    /// Embedding model name
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "text-embedding-004")]
    embedding_model: String,

    /// Embedding service API key
    #[arg(long, env = "EMBEDDING_API_KEY")]
    embedding_api_key: Option<String>,

    /// Embedding vector dimensions
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value = "768")]
    embedding_dimensions: usize,

    /// Generative service URL
    #[arg(
        long,
        env = "GENERATION_ENDPOINT",
        default_value = "http://localhost:11434/api/generate"
    )]
    generation_url: String,

    /// Generative model name
    #[arg(long, env = "GENERATION_MODEL", default_value = "gemini-1.5-pro")]
    generation_model: String,

    /// Generative service API key
    #[arg(long, env = "GENERATION_API_KEY")]
    generation_api_key: Option<String>,

    /// Blob store base URL; uploads are kept locally only when unset
    #[arg(long, env = "BLOB_ENDPOINT")]
    blob_url: Option<String>,

    /// Blob store bucket for original files
    #[arg(long, env = "BLOB_BUCKET", default_value = "finrag-documents")]
    blob_bucket: String,
}

#[derive(Subcommand)]
enum Command {
    /// Create the search index schema if it does not exist yet.
    Init,
    /// Ingest one file, or every supported file under a folder.
    Ingest {
        /// File or folder (pdf, xlsx, xls, csv).
        #[arg(long)]
        path: PathBuf,
    },
    /// Ask a question against the indexed documents.
    Ask {
        /// The question to answer.
        #[arg(long)]
        query: String,
        /// Number of chunks to retrieve as context.
        #[arg(long, default_value = "5")]
        top_k: usize,
        /// When nothing is retrieved, still ask the model with a
        /// no-grounding disclosure instead of a canned reply.
        #[arg(long, default_value_t = false)]
        disclose_ungrounded: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let store = ElasticStore::new(
        &cli.elastic_url,
        &cli.index,
        cli.elastic_api_key.clone(),
        cli.embedding_dimensions,
    );

    // Fail fast on an unreachable store instead of checking per request.
    store
        .ping()
        .await
        .with_context(|| format!("search store at {} is not reachable", cli.elastic_url))?;

    let embedder = RestEmbedder::new(
        &cli.embedding_url,
        &cli.embedding_model,
        cli.embedding_api_key.clone(),
        cli.embedding_dimensions,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        index = %cli.index,
        "finrag boot"
    );

    match cli.command {
        Command::Init => {
            store.ensure_schema().await?;
            println!("index `{}` is ready", cli.index);
        }
        Command::Ingest { path } => {
            let mut pipeline = IngestPipeline::new(embedder, store, ChunkingOptions::default());
            if let Some(blob_url) = &cli.blob_url {
                pipeline = pipeline
                    .with_blob_store(Box::new(HttpBlobStore::new(blob_url, &cli.blob_bucket)));
            }

            let files = if path.is_dir() {
                discover_supported_files(&path)
            } else {
                vec![path.clone()]
            };
            anyhow::ensure!(
                !files.is_empty(),
                "no supported files found under {}",
                path.display()
            );

            let mut ingested = 0usize;
            for file in files {
                match pipeline.ingest_file(&file).await {
                    Ok(receipt) => {
                        ingested += 1;
                        println!(
                            "{}: document_id={} chunks_indexed={} chunks_skipped={}",
                            receipt.source_filename,
                            receipt.document_id,
                            receipt.chunks_indexed,
                            receipt.chunks_skipped
                        );
                        for failure in receipt.index_failures {
                            warn!(
                                chunk_id = %failure.chunk_id,
                                reason = %failure.reason,
                                "chunk failed to index"
                            );
                        }
                    }
                    Err(error) => {
                        warn!(path = %file.display(), %error, "skipped file");
                    }
                }
            }

            println!("{ingested} file(s) ingested at {}", Utc::now().to_rfc3339());
        }
        Command::Ask {
            query,
            top_k,
            disclose_ungrounded,
        } => {
            let model = RestGenerativeClient::new(
                &cli.generation_url,
                &cli.generation_model,
                cli.generation_api_key.clone(),
            );

            let options = QueryOptions {
                top_k,
                no_context_policy: if disclose_ungrounded {
                    NoContextPolicy::DiscloseToModel
                } else {
                    NoContextPolicy::CannedReply
                },
                ..QueryOptions::default()
            };

            let coordinator = QueryCoordinator::new(embedder, store, model, options);
            let answer = coordinator.answer(&query).await?;

            println!("{}", answer.answer);
            if !answer.sources.is_empty() {
                println!("\nsources:");
                for source in answer.sources {
                    match source.url {
                        Some(url) => println!("- {} ({url})", source.filename),
                        None => println!("- {}", source.filename),
                    }
                }
            }
        }
    }

    Ok(())
}
