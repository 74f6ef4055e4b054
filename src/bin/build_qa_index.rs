//! Builds the FAQ vector index from the question/answer CSV.

use anyhow::Result;
use bearmobile_knowledge::{
    qa_corpus::{build_qa_index, load_qa_csv, DEFAULT_BATCH_SIZE, QA_CSV_PATH, QA_INDEX_PATH},
    Embedder, HashingEmbedder, OpenAiEmbedder,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmbedderKind {
    Openai,
    Hashing,
}

#[derive(Parser)]
#[command(name = "build-qa-index")]
#[command(about = "Embed the FAQ corpus and write the QA vector index")]
struct Args {
    /// CSV with `question` and `answer` columns
    #[arg(long, default_value = QA_CSV_PATH)]
    input: PathBuf,

    /// Directory the index is written to
    #[arg(long, default_value = QA_INDEX_PATH)]
    output: PathBuf,

    /// Rows embedded per request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    #[arg(long, value_enum, default_value = "openai")]
    embedder: EmbedderKind,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bearmobile=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenv::dotenv().ok();
    let args = Args::parse();

    let embedder: Box<dyn Embedder> = match args.embedder {
        EmbedderKind::Openai => Box::new(OpenAiEmbedder::new(None)),
        EmbedderKind::Hashing => Box::new(HashingEmbedder::default()),
    };

    let entries = load_qa_csv(&args.input)?;
    info!("Embedding {} QA rows from {}", entries.len(), args.input.display());

    let store = build_qa_index(&entries, embedder.as_ref(), args.batch_size).await?;
    store.save_local(&args.output).await?;
    info!("Wrote {} entries to {}", store.len(), args.output.display());

    println!("done");
    Ok(())
}
