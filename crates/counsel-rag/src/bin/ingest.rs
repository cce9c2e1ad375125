//! counsel-ingest: build and inspect the counseling case index.
//!
//! Reads `DATABASE_URL` and the `OPENAI_*` variables (a `.env` file is
//! honored). Logs go to stderr so `query` output can be piped.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use counsel_core::{defaults, CounselIndex, EmbeddingBackend};
use counsel_db::Database;
use counsel_inference::OpenAIBackend;
use counsel_rag::{CsvCorpusLoader, IngestPipeline, Retriever};

#[derive(Parser)]
#[command(name = "counsel-ingest")]
#[command(author, version, about = "Counseling corpus ingestion and index inspection")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and store a CSV corpus (resumes an interrupted run)
    Ingest {
        /// Corpus CSV file
        #[arg(short, long)]
        csv: PathBuf,

        /// Chunks committed per batch
        #[arg(short, long, default_value_t = defaults::INGEST_BATCH_SIZE)]
        batch_size: usize,

        /// Source label stored with every chunk
        #[arg(short, long, default_value = defaults::INGEST_SOURCE)]
        source: String,

        /// Delete the source's stored chunks first instead of resuming
        #[arg(long)]
        fresh: bool,
    },

    /// Show stored chunk counts and the index dimension
    Stats {
        /// Source label to count
        #[arg(short, long, default_value = defaults::INGEST_SOURCE)]
        source: String,
    },

    /// Retrieve the closest cases for a question
    Query {
        /// Question text
        text: String,

        /// Number of cases to return
        #[arg(short = 'k', long, default_value_t = defaults::RAG_TOP_K)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "counsel_rag=info,counsel_db=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let db = Database::connect(&cli.database_url)
        .await
        .context("connecting to database")?;
    db.migrate().await.context("running migrations")?;

    let backend = Arc::new(OpenAIBackend::from_env()?);
    let index = Arc::new(db.counsel.clone());

    match cli.command {
        Commands::Ingest {
            csv,
            batch_size,
            source,
            fresh,
        } => {
            if fresh {
                let removed = db.counsel.delete_source(&source).await?;
                info!(source = %source, removed, "Cleared stored chunks");
            }
            cmd_ingest(backend, index, &csv, batch_size, &source).await
        }
        Commands::Stats { source } => cmd_stats(backend, &db, &source).await,
        Commands::Query { text, top_k } => cmd_query(backend, index, &text, top_k).await,
    }
}

async fn cmd_ingest(
    backend: Arc<OpenAIBackend>,
    index: Arc<counsel_db::PgCounselRepository>,
    csv: &std::path::Path,
    batch_size: usize,
    source: &str,
) -> anyhow::Result<()> {
    let docs = CsvCorpusLoader::new(source)
        .load(csv)
        .with_context(|| format!("reading {}", csv.display()))?;
    info!(rows = docs.len(), path = %csv.display(), "Loaded corpus");

    let report = IngestPipeline::new(backend, index)
        .with_batch_size(batch_size)
        .with_source(source)
        .run(&docs)
        .await?;

    let output = serde_json::json!({
        "source": source,
        "documents": report.documents,
        "chunks": report.chunks,
        "batches_total": report.batches_total,
        "batches_skipped": report.batches_skipped,
        "chunks_written": report.chunks_written,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_stats(backend: Arc<OpenAIBackend>, db: &Database, source: &str) -> anyhow::Result<()> {
    let index_dimension = db.counsel.index_dimension().await?;
    let output = serde_json::json!({
        "source": source,
        "source_chunks": db.counsel.count_for_source(source).await?,
        "total_chunks": db.counsel.count().await?,
        "index_dimension": index_dimension,
        "backend_dimension": backend.dimension(),
        "dimension_matches": index_dimension.map_or(true, |d| d == backend.dimension()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_query(
    backend: Arc<OpenAIBackend>,
    index: Arc<counsel_db::PgCounselRepository>,
    text: &str,
    top_k: usize,
) -> anyhow::Result<()> {
    let retriever = Retriever::new(backend, index, top_k, f32::MIN);
    let docs = retriever.retrieve(text).await?;

    let output: Vec<serde_json::Value> = docs
        .iter()
        .map(|doc| {
            serde_json::json!({
                "score": doc.score,
                "source": doc.source,
                "row": doc.row,
                "chunk_index": doc.chunk_index,
                "output": doc.output,
                "content": doc.content,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
