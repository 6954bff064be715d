//! Human-readable reports over an evaluation summary.

use super::aggregator::{EvaluationSummary, MetricStats};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write;

/// A metric and its mean, as ranked in a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRanking {
    pub metric_name: String,
    pub mean: f64,
}

/// Strongest and weakest metrics of a run, with the full breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub overall_score: Option<f64>,
    pub test_set_size: usize,
    pub timestamp: DateTime<Utc>,
    /// Metrics by name.
    pub metrics: Vec<(String, MetricStats)>,
    /// Top two by mean, highest first.
    pub strengths: Vec<MetricRanking>,
    /// Bottom two by mean, lowest first.
    pub improvements: Vec<MetricRanking>,
}

fn title_case(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

impl EvaluationReport {
    pub fn from_summary(summary: &EvaluationSummary) -> Self {
        let metrics: Vec<(String, MetricStats)> = summary
            .per_metric
            .iter()
            .map(|(name, stats)| (name.clone(), *stats))
            .collect();

        let rankings: Vec<MetricRanking> = metrics
            .iter()
            .map(|(name, stats)| MetricRanking {
                metric_name: name.clone(),
                mean: stats.mean,
            })
            .collect();

        let mut strengths = rankings.clone();
        strengths.sort_by(|a, b| {
            b.mean
                .total_cmp(&a.mean)
                .then_with(|| a.metric_name.cmp(&b.metric_name))
        });
        strengths.truncate(2);

        let mut improvements = rankings;
        improvements.sort_by(|a, b| {
            a.mean
                .total_cmp(&b.mean)
                .then_with(|| a.metric_name.cmp(&b.metric_name))
        });
        improvements.truncate(2);

        Self {
            overall_score: summary.overall_score,
            test_set_size: summary.test_set_size,
            timestamp: summary.timestamp,
            metrics,
            strengths,
            improvements,
        }
    }

    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        let overall = self
            .overall_score
            .map(percent)
            .unwrap_or_else(|| "n/a".to_string());

        // Writing to a String cannot fail.
        let _ = writeln!(out, "# RAG Pipeline Evaluation Report\n");
        let _ = writeln!(out, "## Overall Performance");
        let _ = writeln!(out, "- **Overall Score**: {}", overall);
        let _ = writeln!(out, "- **Test Set Size**: {} queries", self.test_set_size);
        let _ = writeln!(
            out,
            "- **Evaluation Date**: {}\n",
            self.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );

        let _ = writeln!(out, "## Metric Breakdown\n");
        for (name, stats) in &self.metrics {
            let _ = writeln!(out, "### {}", title_case(name));
            let _ = writeln!(out, "- **Mean Score**: {}", percent(stats.mean));
            let _ = writeln!(out, "- **Standard Deviation**: {:.3}", stats.std);
            let _ = writeln!(
                out,
                "- **Range**: {} - {}",
                percent(stats.min),
                percent(stats.max)
            );
            let _ = writeln!(out, "- **Median**: {}\n", percent(stats.median));
        }

        let _ = writeln!(out, "## Performance Analysis\n");
        let _ = writeln!(out, "### Strengths");
        for metric in &self.strengths {
            let _ = writeln!(
                out,
                "- **{}**: {:.1}%",
                title_case(&metric.metric_name),
                metric.mean * 100.0
            );
        }
        let _ = writeln!(out, "\n### Areas for Improvement");
        for metric in &self.improvements {
            let _ = writeln!(
                out,
                "- **{}**: {:.1}%",
                title_case(&metric.metric_name),
                metric.mean * 100.0
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn stats(mean: f64) -> MetricStats {
        MetricStats {
            mean,
            std: 0.0,
            min: mean,
            max: mean,
            median: mean,
        }
    }

    fn summary(means: &[(&str, f64)]) -> EvaluationSummary {
        let per_metric: BTreeMap<String, MetricStats> = means
            .iter()
            .map(|(name, mean)| (name.to_string(), stats(*mean)))
            .collect();
        EvaluationSummary {
            overall_score: Some(0.5),
            per_metric,
            test_set_size: 3,
            ..EvaluationSummary::empty()
        }
    }

    fn names(rankings: &[MetricRanking]) -> Vec<&str> {
        rankings.iter().map(|r| r.metric_name.as_str()).collect()
    }

    #[test]
    fn test_rankings() {
        let report = EvaluationReport::from_summary(&summary(&[
            ("answer_relevance", 0.7),
            ("context_relevance", 0.2),
            ("faithfulness", 0.9),
            ("generation_quality", 0.5),
        ]));
        assert_eq!(names(&report.strengths), vec!["faithfulness", "answer_relevance"]);
        assert_eq!(names(&report.improvements), vec!["context_relevance", "generation_quality"]);
    }

    #[test]
    fn test_ties_break_by_name() {
        let report = EvaluationReport::from_summary(&summary(&[
            ("zeta", 0.5),
            ("alpha", 0.5),
            ("mid", 0.5),
        ]));
        assert_eq!(names(&report.strengths), vec!["alpha", "mid"]);
        assert_eq!(names(&report.improvements), vec!["alpha", "mid"]);
    }

    #[test]
    fn test_render_markdown() {
        let report = EvaluationReport::from_summary(&summary(&[("faithfulness", 0.9)]));
        let markdown = report.render_markdown();

        assert!(markdown.starts_with("# RAG Pipeline Evaluation Report"));
        assert!(markdown.contains("- **Overall Score**: 50.00%"));
        assert!(markdown.contains("### Faithfulness"));
        assert!(markdown.contains("- **Mean Score**: 90.00%"));
        assert!(markdown.contains("- **Test Set Size**: 3 queries"));
    }

    #[test]
    fn test_empty_summary() {
        let report = EvaluationReport::from_summary(&EvaluationSummary::empty());
        assert!(report.strengths.is_empty());
        assert!(report.render_markdown().contains("n/a"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("retrieval_accuracy"), "Retrieval Accuracy");
        assert_eq!(title_case("faithfulness"), "Faithfulness");
    }
}
