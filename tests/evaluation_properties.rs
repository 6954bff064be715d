//! Property tests for evaluation aggregation.

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;
use rust_rag_engine::eval::{
    EvaluationAggregator, EvaluationHistory, EvaluationResult, Evaluator, TestCase,
    TokenOverlapScorer, default_evaluators,
};

/// Reads its score from the test case's response, offset per metric.
struct ResponseScore {
    name: &'static str,
    offset: f64,
}

impl Evaluator for ResponseScore {
    fn name(&self) -> &str {
        self.name
    }

    fn evaluate(&self, case: &TestCase) -> EvaluationResult {
        let base: f64 = case.response.parse().unwrap_or(0.0);
        EvaluationResult::new(self.name, (base + self.offset) % 1.0, BTreeMap::new())
    }
}

fn aggregator() -> EvaluationAggregator {
    let evaluators: Vec<Arc<dyn Evaluator>> = vec![
        Arc::new(ResponseScore { name: "a", offset: 0.0 }),
        Arc::new(ResponseScore { name: "b", offset: 0.25 }),
        Arc::new(ResponseScore { name: "c", offset: 0.5 }),
    ];
    EvaluationAggregator::new(evaluators, Arc::new(EvaluationHistory::new())).unwrap()
}

fn arb_case() -> impl Strategy<Value = TestCase> {
    (0.0f64..1.0).prop_map(|score| TestCase::new("q", score.to_string(), Vec::new()))
}

mod prop_overall_score {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn overall_is_mean_of_metric_means(
            cases in proptest::collection::vec(arb_case(), 1..25),
        ) {
            let summary = aggregator().run(&cases);

            prop_assert_eq!(summary.test_set_size, cases.len());
            prop_assert_eq!(summary.per_metric.len(), 3);

            let means: Vec<f64> = summary.per_metric.values().map(|s| s.mean).collect();
            let expected = means.iter().sum::<f64>() / means.len() as f64;
            prop_assert!((summary.overall_score.unwrap() - expected).abs() < 1e-9);

            for stats in summary.per_metric.values() {
                prop_assert!(stats.min <= stats.median && stats.median <= stats.max);
                prop_assert!(stats.min - 1e-12 <= stats.mean && stats.mean <= stats.max + 1e-12);
                prop_assert!(stats.std >= 0.0);
            }
        }

        #[test]
        fn concurrent_run_matches_sequential(
            cases in proptest::collection::vec(arb_case(), 0..12),
        ) {
            let aggregator = aggregator();
            let sequential = aggregator.run(&cases);
            let concurrent = tokio_test::block_on(aggregator.run_concurrent(&cases)).unwrap();

            prop_assert_eq!(sequential.per_metric, concurrent.per_metric);
            prop_assert_eq!(sequential.overall_score, concurrent.overall_score);
            prop_assert_eq!(aggregator.history().len(), 2);
        }
    }
}

mod prop_default_evaluators {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn scores_stay_in_unit_range(
            query in "[a-z ]{0,40}",
            response in "[a-z .!?]{0,120}",
            context in proptest::collection::vec("[a-z .]{0,60}", 0..4),
            ground_truth in proptest::option::of("[a-z ]{0,40}"),
        ) {
            let case = TestCase {
                query,
                response,
                context,
                ground_truth,
            };
            for evaluator in default_evaluators(Arc::new(TokenOverlapScorer), 0.5) {
                let result = evaluator.evaluate(&case);
                prop_assert!((0.0..=1.0).contains(&result.score), "{}", result.metric_name);
            }
        }
    }
}
