//! Batch evaluation and summary statistics.

use super::dataset::TestCase;
use super::history::EvaluationHistory;
use super::metrics::{EvaluationResult, Evaluator, default_evaluators};
use super::scoring::{RelevanceScorer, mean};
use crate::error::{RagError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Distribution of one metric's scores across a test set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Mean of the middle two for even counts.
    pub median: f64,
}

impl MetricStats {
    /// `None` for an empty slice.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }

        let mean = mean(scores);
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;

        let mut sorted = scores.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            mean,
            std: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median,
        })
    }
}

/// Every metric's result for one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    /// Position of the case in the input batch.
    pub test_case_id: usize,
    pub query: String,
    /// In evaluator order.
    pub results: Vec<EvaluationResult>,
}

impl TestCaseResult {
    pub fn result(&self, metric_name: &str) -> Option<&EvaluationResult> {
        self.results.iter().find(|r| r.metric_name == metric_name)
    }
}

/// Outcome of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    /// Mean of the per-metric means; `None` when nothing was evaluated.
    pub overall_score: Option<f64>,
    pub per_metric: BTreeMap<String, MetricStats>,
    pub individual_results: Vec<TestCaseResult>,
    pub test_set_size: usize,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationSummary {
    /// Summary of a run over zero test cases.
    pub fn empty() -> Self {
        Self {
            overall_score: None,
            per_metric: BTreeMap::new(),
            individual_results: Vec::new(),
            test_set_size: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| RagError::Serialization(e.to_string()))
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?).map_err(|e| RagError::io(path, e))
    }
}

/// Runs a fixed set of evaluators over test sets and records each run.
pub struct EvaluationAggregator {
    evaluators: Vec<Arc<dyn Evaluator>>,
    history: Arc<EvaluationHistory>,
}

impl EvaluationAggregator {
    /// Rejects an empty evaluator list and duplicate metric names.
    pub fn new(evaluators: Vec<Arc<dyn Evaluator>>, history: Arc<EvaluationHistory>) -> Result<Self> {
        if evaluators.is_empty() {
            return Err(RagError::invalid_config(
                "evaluators",
                0,
                "at least one evaluator",
            ));
        }
        let mut seen = HashSet::new();
        for evaluator in &evaluators {
            if !seen.insert(evaluator.name().to_string()) {
                return Err(RagError::invalid_config(
                    "evaluators",
                    evaluator.name(),
                    "unique metric names",
                ));
            }
        }
        Ok(Self {
            evaluators,
            history,
        })
    }

    /// The five standard evaluators over `scorer`.
    pub fn with_default_evaluators(
        scorer: Arc<dyn RelevanceScorer>,
        relevance_threshold: f64,
        history: Arc<EvaluationHistory>,
    ) -> Result<Self> {
        Self::new(default_evaluators(scorer, relevance_threshold), history)
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.evaluators.iter().map(|e| e.name()).collect()
    }

    pub fn history(&self) -> &Arc<EvaluationHistory> {
        &self.history
    }

    fn evaluate_case(
        evaluators: &[Arc<dyn Evaluator>],
        test_case_id: usize,
        case: &TestCase,
    ) -> TestCaseResult {
        TestCaseResult {
            test_case_id,
            query: case.query.clone(),
            results: evaluators
                .iter()
                .map(|evaluator| {
                    let mut result = evaluator.evaluate(case);
                    if result.metric_name != evaluator.name() {
                        warn!(
                            evaluator = evaluator.name(),
                            emitted = %result.metric_name,
                            "result renamed to its evaluator's metric name"
                        );
                        result.metric_name = evaluator.name().to_string();
                    }
                    result
                })
                .collect(),
        }
    }

    /// Evaluate every case with every evaluator, in order.
    pub fn run(&self, test_cases: &[TestCase]) -> EvaluationSummary {
        let start = Instant::now();
        let results = test_cases
            .iter()
            .enumerate()
            .map(|(i, case)| {
                debug!(case = i + 1, total = test_cases.len(), "evaluating test case");
                Self::evaluate_case(&self.evaluators, i, case)
            })
            .collect();
        self.finish(results, start)
    }

    /// Like [`run`](Self::run), with cases spread over the blocking pool.
    ///
    /// Produces the same summary as `run` for the same input.
    pub async fn run_concurrent(&self, test_cases: &[TestCase]) -> Result<EvaluationSummary> {
        let start = Instant::now();
        let mut tasks = JoinSet::new();
        for (i, case) in test_cases.iter().cloned().enumerate() {
            let evaluators = self.evaluators.clone();
            tasks.spawn_blocking(move || Self::evaluate_case(&evaluators, i, &case));
        }

        let mut results = Vec::with_capacity(test_cases.len());
        while let Some(joined) = tasks.join_next().await {
            results.push(joined.map_err(|e| RagError::Evaluation(e.to_string()))?);
        }
        results.sort_by_key(|r: &TestCaseResult| r.test_case_id);

        Ok(self.finish(results, start))
    }

    fn finish(&self, results: Vec<TestCaseResult>, start: Instant) -> EvaluationSummary {
        let summary = self.summarize(results);
        info!(
            test_cases = summary.test_set_size,
            overall_score = summary.overall_score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "evaluation complete"
        );
        self.history.record(summary.clone());
        summary
    }

    fn summarize(&self, individual_results: Vec<TestCaseResult>) -> EvaluationSummary {
        if individual_results.is_empty() {
            return EvaluationSummary::empty();
        }

        let mut scores: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for case in &individual_results {
            for result in &case.results {
                scores
                    .entry(result.metric_name.clone())
                    .or_default()
                    .push(result.score);
            }
        }

        let per_metric: BTreeMap<String, MetricStats> = scores
            .into_iter()
            .filter_map(|(name, values)| MetricStats::from_scores(&values).map(|s| (name, s)))
            .collect();

        let means: Vec<f64> = per_metric.values().map(|s| s.mean).collect();
        let overall_score = (!means.is_empty()).then(|| mean(&means));

        EvaluationSummary {
            overall_score,
            per_metric,
            test_set_size: individual_results.len(),
            individual_results,
            timestamp: Utc::now(),
        }
    }
}
