//! Query → retrieve → generate orchestration.

use crate::error::{RagError, Result};
use crate::eval::{EvaluationAggregator, EvaluationSummary, TestCase, TestSet};
use crate::llm::Generator;
use crate::retrieval::{RetrievalEngine, SearchResult, bounded};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A generated answer with the chunks it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub query: String,
    pub response: String,
    pub sources: Vec<SearchResult>,
    /// The context block handed to the generator.
    pub context: String,
    pub elapsed_ms: u64,
}

impl RagAnswer {
    /// Chunk texts in rank order.
    pub fn context_passages(&self) -> Vec<String> {
        self.sources.iter().map(|r| r.chunk.text.clone()).collect()
    }

    /// Turn this answer into an evaluation test case.
    pub fn to_test_case(&self, ground_truth: Option<String>) -> TestCase {
        TestCase {
            query: self.query.clone(),
            response: self.response.clone(),
            context: self.context_passages(),
            ground_truth,
        }
    }
}

/// A query to replay through the pipeline, with an optional reference answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchQuery {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<String>,
}

impl BatchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ground_truth: None,
        }
    }

    pub fn with_ground_truth(mut self, ground_truth: impl Into<String>) -> Self {
        self.ground_truth = Some(ground_truth.into());
        self
    }

    /// Queries and ground truths of a test set; recorded responses are ignored.
    pub fn from_test_set(set: &TestSet) -> Vec<Self> {
        set.test_cases
            .iter()
            .map(|case| Self {
                query: case.query.clone(),
                ground_truth: case.ground_truth.clone(),
            })
            .collect()
    }
}

/// Answers to a batch of queries and their scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvaluation {
    pub answers: Vec<RagAnswer>,
    pub summary: EvaluationSummary,
    /// Mean of the answers' `elapsed_ms`; `None` for an empty batch.
    pub avg_response_ms: Option<f64>,
}

/// Render results as `Source: …\nContent: …` blocks separated by blank lines.
pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("Source: {}\nContent: {}", r.chunk.source, r.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Retrieval engine plus generator.
pub struct RagPipeline {
    engine: Arc<RetrievalEngine>,
    generator: Arc<dyn Generator>,
    top_k: usize,
    generate_timeout: Option<Duration>,
}

impl RagPipeline {
    pub fn new(engine: Arc<RetrievalEngine>, generator: Arc<dyn Generator>, top_k: usize) -> Self {
        Self {
            engine,
            generator,
            top_k,
            generate_timeout: None,
        }
    }

    /// Bound each generator call.
    pub fn with_generate_timeout(mut self, timeout: Duration) -> Self {
        self.generate_timeout = Some(timeout);
        self
    }

    pub fn engine(&self) -> &Arc<RetrievalEngine> {
        &self.engine
    }

    /// Retrieve context for `query` and generate a grounded answer.
    pub async fn answer(&self, query: &str) -> Result<RagAnswer> {
        let start = Instant::now();
        let sources = self.engine.search(query, self.top_k).await?;
        let passages: Vec<String> = sources.iter().map(|r| r.chunk.text.clone()).collect();

        let response = bounded(
            self.generate_timeout,
            self.generator.generate(query, &passages),
            RagError::generator_timeout,
        )
        .await?;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(query, sources = sources.len(), elapsed_ms, "answer generated");

        Ok(RagAnswer {
            query: query.to_string(),
            response,
            context: format_context(&sources),
            sources,
            elapsed_ms,
        })
    }

    /// Answer every query in order, then score the answers with `aggregator`.
    ///
    /// Stops at the first query that fails to retrieve or generate.
    pub async fn evaluate(
        &self,
        queries: &[BatchQuery],
        aggregator: &EvaluationAggregator,
    ) -> Result<PipelineEvaluation> {
        let mut answers = Vec::with_capacity(queries.len());
        let mut test_cases = Vec::with_capacity(queries.len());
        for (i, batch_query) in queries.iter().enumerate() {
            debug!(query = i + 1, total = queries.len(), "answering batch query");
            let answer = self.answer(&batch_query.query).await?;
            test_cases.push(answer.to_test_case(batch_query.ground_truth.clone()));
            answers.push(answer);
        }

        let summary = aggregator.run(&test_cases);
        let avg_response_ms = (!answers.is_empty()).then(|| {
            answers.iter().map(|a| a.elapsed_ms as f64).sum::<f64>() / answers.len() as f64
        });
        info!(
            queries = answers.len(),
            overall_score = summary.overall_score,
            avg_response_ms,
            "pipeline evaluation complete"
        );

        Ok(PipelineEvaluation {
            answers,
            summary,
            avg_response_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkConfig;
    use crate::document::sample_documents;
    use crate::embedding::HashingEmbedder;
    use crate::eval::metrics::FAITHFULNESS;
    use crate::eval::{EvaluationHistory, TokenOverlapScorer, sample_test_set};
    use crate::retrieval::BuildOptions;
    use async_trait::async_trait;

    /// Echoes the first passage back.
    struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, _query: &str, context: &[String]) -> Result<String> {
            Ok(context.first().cloned().unwrap_or_default())
        }
    }

    struct StalledGenerator;

    #[async_trait]
    impl Generator for StalledGenerator {
        async fn generate(&self, _query: &str, _context: &[String]) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
    }

    async fn built_engine() -> Arc<RetrievalEngine> {
        let engine = RetrievalEngine::new(
            Arc::new(HashingEmbedder::new(512).unwrap()),
            ChunkConfig::default(),
            BuildOptions::default(),
        )
        .unwrap();
        engine.build(&sample_documents()).await.unwrap();
        Arc::new(engine)
    }

    #[tokio::test]
    async fn test_answer_is_grounded_in_top_chunk() {
        let pipeline = RagPipeline::new(built_engine().await, Arc::new(EchoGenerator), 2);
        let answer = pipeline
            .answer("How does prompt engineering craft effective prompts?")
            .await
            .unwrap();

        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].chunk.parent_document_id, "doc_3");
        assert_eq!(answer.response, answer.sources[0].chunk.text);
        assert!(answer.context.starts_with("Source: prompt-engineering.txt\nContent: "));

        let case = answer.to_test_case(Some("truth".to_string()));
        assert_eq!(case.context.len(), 2);
        assert_eq!(case.ground_truth.as_deref(), Some("truth"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generator_timeout() {
        let pipeline = RagPipeline::new(built_engine().await, Arc::new(StalledGenerator), 1)
            .with_generate_timeout(Duration::from_millis(50));

        let err = pipeline.answer("What is RAG?").await.unwrap_err();
        assert!(matches!(err, RagError::GeneratorFailure(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn test_evaluate_batch() {
        let pipeline = RagPipeline::new(built_engine().await, Arc::new(EchoGenerator), 2);
        let history = Arc::new(EvaluationHistory::new());
        let aggregator = EvaluationAggregator::with_default_evaluators(
            Arc::new(TokenOverlapScorer),
            0.5,
            history.clone(),
        )
        .unwrap();
        let queries = vec![
            BatchQuery::new("How does prompt engineering craft effective prompts?"),
            BatchQuery::new("What is RAG?").with_ground_truth("RAG grounds answers in documents."),
        ];

        let evaluation = pipeline.evaluate(&queries, &aggregator).await.unwrap();

        assert_eq!(evaluation.answers.len(), 2);
        assert_eq!(evaluation.summary.test_set_size, 2);
        assert_eq!(evaluation.summary.per_metric.len(), 5);
        assert_eq!(evaluation.summary.individual_results[1].query, "What is RAG?");
        assert_eq!(history.len(), 1);

        // Echoed answers are the top chunk, so they are fully grounded.
        let faithfulness = evaluation.summary.individual_results[0]
            .result(FAITHFULNESS)
            .unwrap();
        assert_eq!(faithfulness.detail_f64("hallucination_score"), Some(0.0));

        let expected = evaluation
            .answers
            .iter()
            .map(|a| a.elapsed_ms as f64)
            .sum::<f64>()
            / 2.0;
        assert_eq!(evaluation.avg_response_ms, Some(expected));
    }

    #[tokio::test]
    async fn test_evaluate_empty_batch() {
        let pipeline = RagPipeline::new(built_engine().await, Arc::new(EchoGenerator), 2);
        let aggregator = EvaluationAggregator::with_default_evaluators(
            Arc::new(TokenOverlapScorer),
            0.5,
            Arc::new(EvaluationHistory::new()),
        )
        .unwrap();

        let evaluation = pipeline.evaluate(&[], &aggregator).await.unwrap();
        assert!(evaluation.answers.is_empty());
        assert_eq!(evaluation.avg_response_ms, None);
        assert_eq!(evaluation.summary.overall_score, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evaluate_stops_at_failed_query() {
        let pipeline = RagPipeline::new(built_engine().await, Arc::new(StalledGenerator), 1)
            .with_generate_timeout(Duration::from_millis(50));
        let history = Arc::new(EvaluationHistory::new());
        let aggregator = EvaluationAggregator::with_default_evaluators(
            Arc::new(TokenOverlapScorer),
            0.5,
            history.clone(),
        )
        .unwrap();

        let err = pipeline
            .evaluate(&[BatchQuery::new("What is RAG?")], &aggregator)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::GeneratorFailure(_)));
        assert!(history.is_empty());
    }

    #[test]
    fn test_batch_queries_from_test_set() {
        let set = sample_test_set();
        let queries = BatchQuery::from_test_set(&set);
        assert_eq!(queries.len(), set.len());
        assert_eq!(queries[0].query, set.test_cases[0].query);
        assert_eq!(queries[0].ground_truth, set.test_cases[0].ground_truth);
    }

    #[test]
    fn test_format_context_empty() {
        assert_eq!(format_context(&[]), "");
    }
}
