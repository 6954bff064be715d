//! Rust RAG Engine CLI
//!
//! Chunk documents, search an in-memory index and answer questions with
//! retrieved context.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_rag_engine::{
    chunker::Chunker,
    config::Config,
    document::{Document, load_corpus, sample_documents},
    embedding,
    eval::{EvaluationAggregator, EvaluationHistory, TokenOverlapScorer},
    llm::LlmClient,
    pipeline::RagPipeline,
    retrieval::{BuildOptions, RetrievalEngine, SearchResult},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Rust RAG Engine - chunk, embed, retrieve and generate
#[derive(Parser)]
#[command(name = "rag-engine")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Retrieval settings shared by the index-building commands.
#[derive(Args, Clone)]
struct RetrievalArgs {
    /// Document file or corpus directory (defaults to the built-in samples)
    #[arg(short, long)]
    corpus: Option<PathBuf>,

    /// Words per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Words shared by consecutive chunks
    #[arg(long)]
    overlap: Option<usize>,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    top_k: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Split documents into overlapping chunks and print them
    Chunk {
        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build an index and return the most similar chunks for a query
    Search {
        /// The search query
        query: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from retrieved context using the LLM
    Ask {
        /// The question
        query: String,

        #[command(flatten)]
        retrieval: RetrievalArgs,

        /// Score the answer with the evaluation metrics
        #[arg(long)]
        evaluate: bool,

        /// Reference answer used when scoring
        #[arg(long, requires = "evaluate")]
        ground_truth: Option<String>,
    },

    /// Test LLM connection
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Chunk { retrieval, json } => cmd_chunk(retrieval, json),
        Commands::Search {
            query,
            retrieval,
            json,
        } => cmd_search(query, retrieval, json).await,
        Commands::Ask {
            query,
            retrieval,
            evaluate,
            ground_truth,
        } => cmd_ask(query, retrieval, evaluate, ground_truth).await,
        Commands::Test => cmd_test().await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load configuration and apply command-line overrides.
fn load_config(args: &RetrievalArgs) -> Result<Config> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(chunk_size) = args.chunk_size {
        config.retrieval.chunk_size = chunk_size;
    }
    if let Some(overlap) = args.overlap {
        config.retrieval.overlap = overlap;
    }
    if let Some(top_k) = args.top_k {
        config.retrieval.top_k = top_k;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn load_documents(corpus: Option<&Path>) -> Result<Vec<Document>> {
    match corpus {
        None => Ok(sample_documents()),
        Some(path) if path.is_dir() => load_corpus(path)
            .with_context(|| format!("Failed to load corpus from {}", path.display())),
        Some(path) => Ok(vec![
            Document::from_text_file(path).context("Failed to load document")?,
        ]),
    }
}

async fn build_engine(config: &Config, documents: &[Document]) -> Result<Arc<RetrievalEngine>> {
    let embedder =
        embedding::from_config(&config.embedding).context("Failed to create embedder")?;
    let options = BuildOptions {
        concurrency: config.retrieval.embed_concurrency,
        embed_timeout: Some(config.retrieval.embed_timeout()),
    };
    let engine = RetrievalEngine::new(embedder, config.retrieval.chunk_config(), options)?;

    let start = Instant::now();
    let index = engine
        .build(documents)
        .await
        .context("Failed to build index")?;
    println!(
        "Indexed {} documents into {} chunks in {:.2?}",
        index.document_count(),
        index.len(),
        start.elapsed()
    );

    Ok(Arc::new(engine))
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No chunks indexed.");
        return;
    }

    println!("{}", "─".repeat(60));
    for result in results {
        println!(
            "{:>2}. {} [{}] score {:.4}",
            result.rank,
            result.chunk.source,
            result.chunk_id(),
            result.similarity_score
        );
        println!("    {}", preview(&result.chunk.text, 200));
    }
    println!("{}", "─".repeat(60));
}

fn cmd_chunk(args: RetrievalArgs, json: bool) -> Result<()> {
    let config = load_config(&args)?;
    let documents = load_documents(args.corpus.as_deref())?;
    let chunker = Chunker::new(config.retrieval.chunk_config())?;
    let chunks = chunker.chunk_all(&documents);

    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    println!(
        "{} documents, {} chunks (size {}, overlap {})",
        documents.len(),
        chunks.len(),
        config.retrieval.chunk_size,
        config.retrieval.overlap
    );
    for chunk in &chunks {
        println!(
            "  {:<10} {} words [{}..{}) from {}",
            chunk.chunk_id,
            chunk.word_count,
            chunk.start_word_index,
            chunk.end_word_index,
            chunk.parent_document_id
        );
    }

    Ok(())
}

async fn cmd_search(query: String, args: RetrievalArgs, json: bool) -> Result<()> {
    let config = load_config(&args)?;
    let documents = load_documents(args.corpus.as_deref())?;
    let engine = build_engine(&config, &documents).await?;

    let start = Instant::now();
    let results = engine
        .search(&query, config.retrieval.top_k)
        .await
        .context("Search failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        println!("Searching for: \"{}\"\n", query);
        print_results(&results);
        println!("Found {} results in {:.2?}", results.len(), start.elapsed());
    }

    Ok(())
}

async fn cmd_ask(
    query: String,
    args: RetrievalArgs,
    evaluate: bool,
    ground_truth: Option<String>,
) -> Result<()> {
    let config = load_config(&args)?;
    config.validate_llm().context("Invalid LLM configuration")?;

    let documents = load_documents(args.corpus.as_deref())?;
    let engine = build_engine(&config, &documents).await?;
    let generator = Arc::new(LlmClient::new(config.llm.clone()));
    let pipeline = RagPipeline::new(engine, generator, config.retrieval.top_k)
        .with_generate_timeout(config.retrieval.generate_timeout());

    println!("Question: {}", query);
    println!("Using model: {}\n", config.llm.model);

    let answer = pipeline
        .answer(&query)
        .await
        .context("Failed to answer question")?;

    println!("{}\n", answer.response);
    println!("Sources:");
    print_results(&answer.sources);
    println!("Answered in {}ms", answer.elapsed_ms);

    if evaluate {
        let history = Arc::new(EvaluationHistory::from_capacity(
            config.evaluation.history_capacity,
        )?);
        let aggregator = EvaluationAggregator::with_default_evaluators(
            Arc::new(TokenOverlapScorer),
            config.evaluation.relevance_threshold,
            history,
        )?;
        let summary = aggregator.run(&[answer.to_test_case(ground_truth)]);

        println!("\nEvaluation:");
        for (metric, stats) in &summary.per_metric {
            println!("  {:<20} {:.3}", metric, stats.mean);
        }
        if let Some(overall) = summary.overall_score {
            println!("  {:<20} {:.3}", "overall", overall);
        }
    }

    Ok(())
}

async fn cmd_test() -> Result<()> {
    println!("Testing LLM connection...\n");

    let config = Config::load().context("Failed to load configuration")?;

    println!("Configuration:");
    println!("  API Base:  {}", config.llm.api_base);
    println!("  Model:     {}", config.llm.model);
    let key_prefix: String = config.llm.api_key.chars().take(8).collect();
    println!("  API Key:   {}...", key_prefix);
    println!();

    if let Err(e) = config.validate_llm() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.llm);

    println!("Sending test request...");
    match client.test_connection().await {
        Ok(()) => println!("Connection successful!"),
        Err(e) => println!("Connection failed: {}", e),
    }

    Ok(())
}
