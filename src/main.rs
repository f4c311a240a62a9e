//! lexrag - CLI entry point.
//!
//! Thin shim over the library: argument parsing, wiring, and printing only.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use lexrag::config::Config;
use lexrag::corpus::{canonical_texts, CorpusLoader};
use lexrag::embedding::BertEmbedder;
use lexrag::generator::OllamaGenerator;
use lexrag::index::IndexBuilder;
use lexrag::pipeline::{Pipeline, PipelineConfig};
use lexrag::retriever::{format_results, Retriever};
use lexrag::Result;

/// Semantic retrieval and answer assembly over a legal Q&A corpus
#[derive(Parser, Debug)]
#[command(name = "lexrag")]
#[command(version, about, long_about = None)]
struct Args {
    /// Verbosity: -v (debug), -vv (trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encode the corpus and persist the vector index
    Ingest {
        /// Corpus file (line-delimited JSON); defaults to the configured path
        #[arg(long)]
        corpus: Option<PathBuf>,
    },

    /// Retrieve documents for a query
    Search {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        min_score: Option<f32>,
        /// Include metadata in the output
        #[arg(long)]
        metadata: bool,
    },

    /// Retrieve documents and generate an answer
    Ask {
        query: String,
        /// Ask the generator to score each reference before answering
        #[arg(long)]
        scoring: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("lexrag={level}"))),
        )
        .init();

    let config = Config::load()?;

    match args.command {
        Commands::Ingest { corpus } => ingest(&config, corpus)?,
        Commands::Search {
            query,
            top_k,
            min_score,
            metadata,
        } => search(&config, &query, top_k, min_score, metadata)?,
        Commands::Ask { query, scoring } => ask(&config, &query, scoring).await?,
    }

    Ok(())
}

fn ingest(config: &Config, corpus: Option<PathBuf>) -> Result<()> {
    let corpus_path = corpus.unwrap_or_else(|| config.corpus.knowledge_base.clone());

    let records = CorpusLoader::new(&corpus_path).load()?;
    let texts = canonical_texts(&records);
    println!("loaded {} records from {}", records.len(), corpus_path.display());

    let embedder = Arc::new(BertEmbedder::new(&config.embedding.model_id)?);
    let index = IndexBuilder::new(embedder)
        .batch_size(config.embedding.batch_size)
        .show_progress(true)
        .build(texts)?;

    index.persist(&config.corpus.index_dir)?;
    println!("index persisted to {}", config.corpus.index_dir.display());
    Ok(())
}

fn search(
    config: &Config,
    query: &str,
    top_k: Option<usize>,
    min_score: Option<f32>,
    metadata: bool,
) -> Result<()> {
    let embedder = Arc::new(BertEmbedder::new(&config.embedding.model_id)?);
    let retriever = Retriever::new(embedder);
    retriever.load(&config.corpus.index_dir)?;

    let results = retriever.retrieve(
        query,
        top_k.unwrap_or(config.retrieval.top_k),
        min_score.unwrap_or(config.retrieval.min_score),
    )?;

    let formatted = format_results(&results, metadata);
    println!("{}", serde_json::to_string_pretty(&formatted)?);
    Ok(())
}

async fn ask(config: &Config, query: &str, scoring: bool) -> Result<()> {
    let embedder = Arc::new(BertEmbedder::new(&config.embedding.model_id)?);
    let retriever = Arc::new(Retriever::new(embedder));
    retriever.load(&config.corpus.index_dir)?;

    let generator = Arc::new(OllamaGenerator::new(&config.generation)?);
    let pipeline = Pipeline::with_config(
        retriever,
        generator,
        PipelineConfig {
            top_k: config.retrieval.top_k,
            min_score: config.retrieval.min_score,
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
        },
    );

    let result = pipeline.process(query, scoring).await?;

    for doc in &result.retrieved {
        println!("[{}] {:.4}  {}", doc.rank, doc.score, doc.text);
        println!();
    }
    println!("{}", result.answer);
    println!();
    println!(
        "tokens: prompt={} answer={} total={}",
        result.metadata.prompt_tokens,
        result.metadata.answer_tokens,
        result.metadata.total_tokens
    );
    Ok(())
}
