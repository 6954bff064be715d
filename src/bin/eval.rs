//! Evaluation CLI binary for scoring RAG answers.
//!
//! Usage:
//!   eval sample              # Run on the built-in benchmark set
//!   eval custom <path>       # Run on a custom JSON test set
//!   eval export <path>       # Write the benchmark set as JSON
//!   eval pipeline [path]     # Answer the set's queries with the LLM, then score
//!
//! Options:
//!   --max-items <N>          # Limit number of test cases
//!   --threshold <X>          # Relevance threshold for precision@k
//!   --concurrent             # Evaluate test cases in parallel
//!   --output <path>          # Save the summary as JSON
//!   --report <path>          # Save the markdown report

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_rag_engine::config::Config;
use rust_rag_engine::document::{Document, load_corpus, sample_documents};
use rust_rag_engine::embedding;
use rust_rag_engine::eval::{
    EvaluationAggregator, EvaluationHistory, EvaluationReport, EvaluationSummary, TestSet,
    TokenOverlapScorer, sample_test_set,
};
use rust_rag_engine::llm::LlmClient;
use rust_rag_engine::pipeline::{BatchQuery, RagPipeline};
use rust_rag_engine::retrieval::{BuildOptions, RetrievalEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eval")]
#[command(about = "Evaluate retrieval and generation quality", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Maximum number of test cases to evaluate
    #[arg(long, global = true)]
    max_items: Option<usize>,

    /// Relevance at or above which a retrieved chunk counts as a hit
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Evaluate test cases in parallel
    #[arg(long, global = true)]
    concurrent: bool,

    /// Save the summary to a JSON file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Save the markdown report to a file
    #[arg(long, global = true)]
    report: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run on the built-in benchmark set
    Sample,

    /// Run on a custom JSON test set
    Custom {
        /// Path to the test set JSON file
        path: PathBuf,
    },

    /// Write the built-in benchmark set as JSON (a template for custom sets)
    Export {
        /// Output file
        #[arg(default_value = "data/benchmark.json")]
        path: PathBuf,
    },

    /// Answer a test set's queries through retrieval and the LLM, then score them
    Pipeline {
        /// Test set whose queries and ground truths are replayed (defaults to the benchmark set)
        path: Option<PathBuf>,

        /// Document file or corpus directory (defaults to the built-in samples)
        #[arg(short, long)]
        corpus: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();

    let test_set = match &cli.command {
        Commands::Export { path } => return export(path),
        Commands::Sample | Commands::Pipeline { path: None, .. } => {
            println!("Using built-in benchmark set...");
            sample_test_set()
        }
        Commands::Custom { path }
        | Commands::Pipeline {
            path: Some(path), ..
        } => {
            println!("Loading test set from {:?}...", path);
            TestSet::load_json(path).context("Failed to load test set")?
        }
    };
    let test_set = match cli.max_items {
        Some(n) => test_set.take(n),
        None => test_set,
    };
    println!("Test set: {} ({} cases)", test_set.name, test_set.len());

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(threshold) = cli.threshold {
        config.evaluation.relevance_threshold = threshold;
    }
    config
        .validate_evaluation()
        .context("Invalid evaluation configuration")?;

    let history = Arc::new(EvaluationHistory::from_capacity(
        config.evaluation.history_capacity,
    )?);
    let aggregator = EvaluationAggregator::with_default_evaluators(
        Arc::new(TokenOverlapScorer),
        config.evaluation.relevance_threshold,
        history,
    )?;

    let summary = match &cli.command {
        Commands::Pipeline { corpus, .. } => {
            run_pipeline(&config, corpus.as_deref(), &test_set, &aggregator).await?
        }
        _ if cli.concurrent => aggregator.run_concurrent(&test_set.test_cases).await?,
        _ => aggregator.run(&test_set.test_cases),
    };

    let report = EvaluationReport::from_summary(&summary);
    let markdown = report.render_markdown();
    println!("\n{}", markdown);

    if let Some(output_path) = cli.output {
        summary
            .save_json(&output_path)
            .context("Failed to save summary")?;
        println!("Summary saved to {:?}", output_path);
    }

    if let Some(report_path) = cli.report {
        std::fs::write(&report_path, &markdown)
            .with_context(|| format!("Failed to write report to {:?}", report_path))?;
        println!("Report saved to {:?}", report_path);
    }

    Ok(())
}

/// Build an index over the corpus and answer every query with the LLM.
async fn run_pipeline(
    config: &Config,
    corpus: Option<&Path>,
    test_set: &TestSet,
    aggregator: &EvaluationAggregator,
) -> Result<EvaluationSummary> {
    config.validate().context("Invalid configuration")?;
    config.validate_llm().context("Invalid LLM configuration")?;

    let documents = match corpus {
        None => sample_documents(),
        Some(path) if path.is_dir() => load_corpus(path)
            .with_context(|| format!("Failed to load corpus from {}", path.display()))?,
        Some(path) => vec![Document::from_text_file(path).context("Failed to load document")?],
    };

    let embedder =
        embedding::from_config(&config.embedding).context("Failed to create embedder")?;
    let options = BuildOptions {
        concurrency: config.retrieval.embed_concurrency,
        embed_timeout: Some(config.retrieval.embed_timeout()),
    };
    let engine = RetrievalEngine::new(embedder, config.retrieval.chunk_config(), options)?;
    let index = engine
        .build(&documents)
        .await
        .context("Failed to build index")?;
    println!(
        "Indexed {} documents into {} chunks",
        index.document_count(),
        index.len()
    );

    let generator = Arc::new(LlmClient::new(config.llm.clone()));
    let pipeline = RagPipeline::new(Arc::new(engine), generator, config.retrieval.top_k)
        .with_generate_timeout(config.retrieval.generate_timeout());

    println!("Answering {} queries with {}...", test_set.len(), config.llm.model);
    let evaluation = pipeline
        .evaluate(&BatchQuery::from_test_set(test_set), aggregator)
        .await
        .context("Pipeline evaluation failed")?;

    if let Some(avg) = evaluation.avg_response_ms {
        println!("Average response time: {:.0}ms", avg);
    }

    Ok(evaluation.summary)
}

fn export(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }

    let set = sample_test_set();
    set.save_json(path).context("Failed to write test set")?;
    println!("Wrote {} test cases to {:?}", set.len(), path);
    println!("\nTo run evaluation:");
    println!("  eval custom {:?}", path);

    Ok(())
}
