//! Top-k cosine search over an [`EmbeddingStore`].
//!
//! Vectors are expected to be unit length already, so the score is a plain
//! dot product. Selection keeps a bounded min-heap of `k` candidates, giving
//! O(n log k) per query.

use crate::error::{RagError, Result};
use crate::store::EmbeddingStore;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// A store position with its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredPosition {
    pub position: usize,
    pub score: f32,
}

impl Eq for ScoredPosition {}

impl PartialOrd for ScoredPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredPosition {
    /// Greater means ranked earlier: higher score, then lower position.
    fn cmp(&self, other: &Self) -> Ordering {
        compare_scores(self.score, other.score).then_with(|| other.position.cmp(&self.position))
    }
}

/// Total order on scores where NaN sorts below every number.
fn compare_scores(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Read-only similarity view over a store.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityIndex<'a> {
    store: &'a EmbeddingStore,
}

impl<'a> SimilarityIndex<'a> {
    pub fn new(store: &'a EmbeddingStore) -> Self {
        Self { store }
    }

    /// The `k` best positions for `query`, best first.
    ///
    /// Equal scores are ordered by insertion position. Asking for more than
    /// the store holds returns everything; an empty store returns nothing.
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPosition>> {
        if k == 0 {
            return Err(RagError::invalid_config("k", 0, "k > 0"));
        }
        let Some(dimension) = self.store.dimension() else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let bound = k.min(self.store.size());
        let mut heap: BinaryHeap<Reverse<ScoredPosition>> = BinaryHeap::with_capacity(bound + 1);

        for (position, entry) in self.store.get_all().iter().enumerate() {
            let candidate = ScoredPosition {
                position,
                score: dot(query, &entry.vector),
            };

            if heap.len() < bound {
                heap.push(Reverse(candidate));
            } else if let Some(Reverse(worst)) = heap.peek() {
                if candidate > *worst {
                    heap.pop();
                    heap.push(Reverse(candidate));
                }
            }
        }

        // Ascending in Reverse is descending in rank.
        Ok(heap.into_sorted_vec().into_iter().map(|Reverse(s)| s).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::normalized;

    fn store_of(vectors: &[Vec<f32>]) -> EmbeddingStore {
        let mut store = EmbeddingStore::new();
        for (i, v) in vectors.iter().enumerate() {
            store.insert(format!("chunk_{}", i), normalized(v.clone())).unwrap();
        }
        store
    }

    #[test]
    fn test_reference_vectors() {
        let store = store_of(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]]);
        let index = SimilarityIndex::new(&store);

        let top = index.top_k(&[1.0, 0.0], 2).unwrap();
        let positions: Vec<_> = top.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 2]);

        let all = index.top_k(&[1.0, 0.0], 3).unwrap();
        let positions: Vec<_> = all.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0, 2, 1]);
        assert!((all[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
    }

    #[test]
    fn test_ties_break_on_lower_position() {
        let store = store_of(&[
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
        ]);
        let index = SimilarityIndex::new(&store);

        let top = index.top_k(&[1.0, 0.0], 3).unwrap();
        let positions: Vec<_> = top.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![1, 3, 0]);
    }

    #[test]
    fn test_k_larger_than_store_returns_all() {
        let store = store_of(&[vec![1.0, 0.0], vec![0.5, 0.5]]);
        let top = SimilarityIndex::new(&store).top_k(&[1.0, 0.0], 10).unwrap();
        assert_eq!(top.len(), 2);
        assert!(top[0].score >= top[1].score);
    }

    #[test]
    fn test_empty_store_returns_empty() {
        let store = EmbeddingStore::new();
        let top = SimilarityIndex::new(&store).top_k(&[1.0, 0.0], 3).unwrap();
        assert!(top.is_empty());
    }

    #[test]
    fn test_invalid_queries() {
        let store = store_of(&[vec![1.0, 0.0]]);
        let index = SimilarityIndex::new(&store);

        assert!(matches!(
            index.top_k(&[1.0, 0.0], 0),
            Err(RagError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            index.top_k(&[1.0, 0.0, 0.0], 1),
            Err(RagError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_nan_scores_sort_last() {
        let mut store = EmbeddingStore::new();
        store.insert("nan", vec![f32::NAN, 0.0]).unwrap();
        store.insert("low", vec![-1.0, 0.0]).unwrap();
        let top = SimilarityIndex::new(&store).top_k(&[1.0, 0.0], 2).unwrap();
        assert_eq!(top[0].position, 1);
        assert!(top[1].score.is_nan());
    }
}
