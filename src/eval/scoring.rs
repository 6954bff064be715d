//! Relevance scoring and the lexical helpers the evaluators share.

use std::collections::BTreeSet;

/// Scores how well `candidate` covers `reference`, in `[0, 1]`.
pub trait RelevanceScorer: Send + Sync {
    fn relevance(&self, reference: &str, candidate: &str) -> f64;
}

impl<F> RelevanceScorer for F
where
    F: Fn(&str, &str) -> f64 + Send + Sync,
{
    fn relevance(&self, reference: &str, candidate: &str) -> f64 {
        self(reference, candidate)
    }
}

/// Fraction of the reference's distinct content terms found in the candidate.
///
/// An empty reference (no content terms) scores 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlapScorer;

impl RelevanceScorer for TokenOverlapScorer {
    fn relevance(&self, reference: &str, candidate: &str) -> f64 {
        let reference = content_terms(reference);
        if reference.is_empty() {
            return 0.0;
        }
        let candidate = content_terms(candidate);
        let found = reference.iter().filter(|t| candidate.contains(*t)).count();
        found as f64 / reference.len() as f64
    }
}

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "before", "being", "between", "both", "but", "by", "can", "could", "did", "do", "does",
    "doing", "during", "each", "for", "from", "had", "has", "have", "having", "he", "her",
    "here", "hers", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just",
    "may", "me", "might", "more", "most", "my", "no", "nor", "not", "of", "on", "once", "only",
    "or", "other", "our", "out", "over", "own", "same", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your",
];

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Lowercased alphanumeric tokens, in order, duplicates kept.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Distinct non-stopword tokens.
pub fn content_terms(text: &str) -> BTreeSet<String> {
    words(text)
        .into_iter()
        .filter(|w| !is_stopword(w))
        .collect()
}

/// Sentences split on `.`, `!` and `?`; blank fragments dropped.
pub fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

/// Intersection over union; two empty sets score 0.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Clamp into `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_and_terms() {
        assert_eq!(
            words("Llama 3 is state-of-the-art!"),
            vec!["llama", "3", "is", "state", "of", "the", "art"]
        );
        let terms = content_terms("The RAG process and the RAG pipeline");
        assert_eq!(
            terms.into_iter().collect::<Vec<_>>(),
            vec!["pipeline", "process", "rag"]
        );
    }

    #[test]
    fn test_token_overlap_scorer() {
        let scorer = TokenOverlapScorer;
        assert_eq!(scorer.relevance("vector databases", "Vector databases store data."), 1.0);
        assert_eq!(scorer.relevance("vector databases", "Databases are useful."), 0.5);
        assert_eq!(scorer.relevance("the of and", "anything"), 0.0);
        assert_eq!(scorer.relevance("", "anything"), 0.0);
    }

    #[test]
    fn test_closure_scorer() {
        let scorer = |_: &str, _: &str| 0.25;
        assert_eq!(scorer.relevance("a", "b"), 0.25);
    }

    #[test]
    fn test_sentences() {
        assert_eq!(
            sentences("First one. Second one! Third?  ..."),
            vec!["First one", "Second one", "Third"]
        );
        assert!(sentences("").is_empty());
    }

    #[test]
    fn test_jaccard() {
        let a = content_terms("vector search");
        let b = content_terms("vector store");
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }

    #[test]
    fn test_mean_and_clamp() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[0.5, 1.0]), 0.75);
        assert_eq!(clamp_unit(1.5), 1.0);
        assert_eq!(clamp_unit(-0.1), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
    }
}
