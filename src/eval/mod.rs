//! Evaluation of retrieval and generation quality.
//!
//! This module provides:
//! - Test sets of query / response / context triples (JSON or built-in)
//! - Metric evaluators driven by an injectable relevance scorer
//! - An aggregator producing per-metric statistics and an overall score
//! - A run history and a markdown report

pub mod aggregator;
pub mod dataset;
pub mod history;
pub mod metrics;
pub mod report;
pub mod scoring;

pub use aggregator::{EvaluationAggregator, EvaluationSummary, MetricStats, TestCaseResult};
pub use dataset::{TestCase, TestSet, sample_test_set};
pub use history::EvaluationHistory;
pub use metrics::{
    AnswerRelevance, ContextRelevance, EvaluationResult, Evaluator, Faithfulness,
    GenerationQuality, RetrievalAccuracy, default_evaluators,
};
pub use report::{EvaluationReport, MetricRanking};
pub use scoring::{RelevanceScorer, TokenOverlapScorer};
