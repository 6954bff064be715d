//! Metric evaluators.
//!
//! Each evaluator scores one [`TestCase`] along a single axis and returns an
//! [`EvaluationResult`] whose score is the mean of its sub-scores. Relevance
//! judgements are delegated to an injected [`RelevanceScorer`], so runs are
//! deterministic and tests can pin scores exactly.

use super::dataset::TestCase;
use super::scoring::{
    RelevanceScorer, clamp_unit, content_terms, is_stopword, jaccard, mean, sentences, words,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const RETRIEVAL_ACCURACY: &str = "retrieval_accuracy";
pub const GENERATION_QUALITY: &str = "generation_quality";
pub const FAITHFULNESS: &str = "faithfulness";
pub const CONTEXT_RELEVANCE: &str = "context_relevance";
pub const ANSWER_RELEVANCE: &str = "answer_relevance";

/// One metric's verdict on one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub metric_name: String,
    /// Always within `[0, 1]`.
    pub score: f64,
    pub details: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl EvaluationResult {
    /// Build a result, clamping `score` into `[0, 1]`.
    pub fn new(metric_name: impl Into<String>, score: f64, details: BTreeMap<String, Value>) -> Self {
        Self {
            metric_name: metric_name.into(),
            score: clamp_unit(score),
            details,
            timestamp: Utc::now(),
        }
    }

    /// Numeric detail by key.
    pub fn detail_f64(&self, key: &str) -> Option<f64> {
        self.details.get(key).and_then(Value::as_f64)
    }
}

/// Scores a test case along one named axis.
pub trait Evaluator: Send + Sync {
    /// Metric name; unique within an aggregator.
    fn name(&self) -> &str;

    fn evaluate(&self, case: &TestCase) -> EvaluationResult;
}

fn details<const N: usize>(entries: [(&str, Value); N]) -> BTreeMap<String, Value> {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// The five standard evaluators sharing one scorer.
pub fn default_evaluators(
    scorer: Arc<dyn RelevanceScorer>,
    relevance_threshold: f64,
) -> Vec<Arc<dyn Evaluator>> {
    vec![
        Arc::new(RetrievalAccuracy::new(scorer.clone()).with_threshold(relevance_threshold)),
        Arc::new(GenerationQuality::new(scorer.clone())),
        Arc::new(Faithfulness::new(scorer.clone())),
        Arc::new(ContextRelevance::new(scorer.clone())),
        Arc::new(AnswerRelevance::new(scorer)),
    ]
}

/// How relevant the retrieved chunks are to the query (and ground truth).
pub struct RetrievalAccuracy {
    scorer: Arc<dyn RelevanceScorer>,
    threshold: f64,
}

impl RetrievalAccuracy {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self {
            scorer,
            threshold: 0.5,
        }
    }

    /// Relevance at or above which a chunk counts towards `precision_at_k`.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Evaluator for RetrievalAccuracy {
    fn name(&self) -> &str {
        RETRIEVAL_ACCURACY
    }

    fn evaluate(&self, case: &TestCase) -> EvaluationResult {
        let scores: Vec<f64> = case
            .context
            .iter()
            .map(|chunk| {
                let to_query = clamp_unit(self.scorer.relevance(&case.query, chunk));
                match &case.ground_truth {
                    Some(truth) => (to_query + clamp_unit(self.scorer.relevance(truth, chunk))) / 2.0,
                    None => to_query,
                }
            })
            .collect();

        let avg = mean(&scores);
        let precision = if scores.is_empty() {
            0.0
        } else {
            scores.iter().filter(|&&s| s >= self.threshold).count() as f64 / scores.len() as f64
        };

        EvaluationResult::new(
            RETRIEVAL_ACCURACY,
            avg,
            details([
                ("individual_scores", json!(scores)),
                ("num_retrieved", json!(scores.len())),
                ("avg_relevance", json!(avg)),
                ("precision_at_k", json!(precision)),
            ]),
        )
    }
}

/// Coherence, relevance, fluency and informativeness of the response.
pub struct GenerationQuality {
    scorer: Arc<dyn RelevanceScorer>,
}

impl GenerationQuality {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }
}

/// Share of adjacent sentence pairs with a content term in common.
fn coherence(response: &str) -> f64 {
    let terms: Vec<_> = sentences(response).into_iter().map(content_terms).collect();
    match terms.len() {
        0 => 0.0,
        1 => 1.0,
        n => {
            let linked = terms
                .windows(2)
                .filter(|pair| !pair[0].is_disjoint(&pair[1]))
                .count();
            linked as f64 / (n - 1) as f64
        }
    }
}

fn distinct_word_ratio(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let distinct: BTreeSet<&String> = tokens.iter().collect();
    distinct.len() as f64 / tokens.len() as f64
}

/// Chunks whose first five words appear verbatim in the response.
fn context_utilization(context: &[String], response_tokens: &[String]) -> usize {
    let response = format!(" {} ", response_tokens.join(" "));
    context
        .iter()
        .filter(|chunk| {
            let lead: Vec<String> = words(chunk).into_iter().take(5).collect();
            !lead.is_empty() && response.contains(&format!(" {} ", lead.join(" ")))
        })
        .count()
}

impl Evaluator for GenerationQuality {
    fn name(&self) -> &str {
        GENERATION_QUALITY
    }

    fn evaluate(&self, case: &TestCase) -> EvaluationResult {
        let response_tokens = words(&case.response);

        let coherence = coherence(&case.response);
        let query_relevance = clamp_unit(self.scorer.relevance(&case.query, &case.response));
        let fluency = distinct_word_ratio(&response_tokens);

        let response_terms = content_terms(&case.response);
        let query_terms = content_terms(&case.query);
        let informativeness = if response_terms.is_empty() {
            0.0
        } else {
            response_terms.difference(&query_terms).count() as f64 / response_terms.len() as f64
        };

        let score = mean(&[coherence, query_relevance, fluency, informativeness]);

        EvaluationResult::new(
            GENERATION_QUALITY,
            score,
            details([
                ("coherence", json!(coherence)),
                ("query_relevance", json!(query_relevance)),
                ("fluency", json!(fluency)),
                ("informativeness", json!(informativeness)),
                ("response_length", json!(response_tokens.len())),
                (
                    "context_utilization",
                    json!(context_utilization(&case.context, &response_tokens)),
                ),
            ]),
        )
    }
}

/// Whether the response stays within what the context supports.
pub struct Faithfulness {
    scorer: Arc<dyn RelevanceScorer>,
}

impl Faithfulness {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }
}

impl Evaluator for Faithfulness {
    fn name(&self) -> &str {
        FAITHFULNESS
    }

    fn evaluate(&self, case: &TestCase) -> EvaluationResult {
        let context_terms: BTreeSet<String> = case
            .context
            .iter()
            .flat_map(|chunk| content_terms(chunk))
            .collect();
        let response_terms = content_terms(&case.response);
        let has_context = !case.context.is_empty();

        let hallucination = if response_terms.is_empty() {
            0.0
        } else {
            response_terms.difference(&context_terms).count() as f64 / response_terms.len() as f64
        };
        let grounded = if has_context { 1.0 - hallucination } else { 0.0 };

        let coverage: Vec<f64> = case
            .context
            .iter()
            .map(|chunk| clamp_unit(self.scorer.relevance(chunk, &case.response)))
            .collect();
        let context_coverage = mean(&coverage);

        let factual_consistency = match &case.ground_truth {
            Some(truth) => clamp_unit(self.scorer.relevance(truth, &case.response)),
            None => supported_sentence_ratio(&case.response, &context_terms),
        };

        let score = mean(&[grounded, context_coverage, factual_consistency]);
        let context_length: usize = case.context.iter().map(|c| words(c).len()).sum();

        EvaluationResult::new(
            FAITHFULNESS,
            score,
            details([
                ("hallucination_score", json!(hallucination)),
                ("context_coverage", json!(context_coverage)),
                ("factual_consistency", json!(factual_consistency)),
                ("context_length", json!(context_length)),
                (
                    "response_context_overlap",
                    json!(jaccard(&response_terms, &context_terms)),
                ),
            ]),
        )
    }
}

/// Sentences with at least half their content terms present in the context.
///
/// Sentences without content terms are ignored; none left scores 0.
fn supported_sentence_ratio(
    response: &str,
    context_terms: &BTreeSet<String>,
) -> f64 {
    let mut judged = 0usize;
    let mut supported = 0usize;
    for sentence in sentences(response) {
        let terms = content_terms(sentence);
        if terms.is_empty() {
            continue;
        }
        judged += 1;
        let present = terms.iter().filter(|t| context_terms.contains(*t)).count();
        if present * 2 >= terms.len() {
            supported += 1;
        }
    }
    if judged == 0 {
        0.0
    } else {
        supported as f64 / judged as f64
    }
}

/// How relevant each retrieved chunk is to the query.
pub struct ContextRelevance {
    scorer: Arc<dyn RelevanceScorer>,
}

impl ContextRelevance {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }
}

impl Evaluator for ContextRelevance {
    fn name(&self) -> &str {
        CONTEXT_RELEVANCE
    }

    fn evaluate(&self, case: &TestCase) -> EvaluationResult {
        let scores: Vec<f64> = case
            .context
            .iter()
            .map(|chunk| clamp_unit(self.scorer.relevance(&case.query, chunk)))
            .collect();

        let avg = mean(&scores);
        let (min, max) = if scores.is_empty() {
            (0.0, 0.0)
        } else {
            scores
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &s| {
                    (lo.min(s), hi.max(s))
                })
        };
        let variance = mean(&scores.iter().map(|s| (s - avg).powi(2)).collect::<Vec<_>>());

        EvaluationResult::new(
            CONTEXT_RELEVANCE,
            avg,
            details([
                ("individual_relevance", json!(scores)),
                ("avg_relevance", json!(avg)),
                ("min_relevance", json!(min)),
                ("max_relevance", json!(max)),
                ("relevance_variance", json!(variance)),
                ("num_contexts", json!(scores.len())),
            ]),
        )
    }
}

/// Whether the response answers the query directly and completely.
pub struct AnswerRelevance {
    scorer: Arc<dyn RelevanceScorer>,
}

impl AnswerRelevance {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }
}

impl Evaluator for AnswerRelevance {
    fn name(&self) -> &str {
        ANSWER_RELEVANCE
    }

    fn evaluate(&self, case: &TestCase) -> EvaluationResult {
        let query_tokens = words(&case.query);
        let response_tokens = words(&case.response);
        let query_terms = content_terms(&case.query);
        let response_terms = content_terms(&case.response);

        let direct_relevance = clamp_unit(self.scorer.relevance(&case.query, &case.response));

        let completeness = match &case.ground_truth {
            Some(truth) => clamp_unit(self.scorer.relevance(truth, &case.response)),
            None if query_terms.is_empty() => 0.0,
            None => (response_terms.len() as f64 / (2 * query_terms.len()) as f64).min(1.0),
        };

        let specificity = if response_tokens.is_empty() {
            0.0
        } else {
            response_tokens.iter().filter(|w| !is_stopword(w)).count() as f64
                / response_tokens.len() as f64
        };

        let score = mean(&[direct_relevance, completeness, specificity]);

        EvaluationResult::new(
            ANSWER_RELEVANCE,
            score,
            details([
                ("direct_relevance", json!(direct_relevance)),
                ("completeness", json!(completeness)),
                ("specificity", json!(specificity)),
                ("query_length", json!(query_tokens.len())),
                ("response_length", json!(response_tokens.len())),
                ("keyword_overlap", json!(jaccard(&query_terms, &response_terms))),
            ]),
        )
    }
}
