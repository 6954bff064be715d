//! Append-only storage of chunk embeddings.

use crate::error::{RagError, Result};

/// One stored vector and the chunk it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub chunk_id: String,
    pub vector: Vec<f32>,
}

impl Embedding {
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Insertion-ordered `chunk_id -> vector` collection with a fixed dimension.
///
/// The first insertion establishes the dimension. Positions are stable, so
/// the similarity index can report positions and callers map them back to
/// chunk records kept alongside.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingStore {
    entries: Vec<Embedding>,
    dimension: Option<usize>,
}

impl EmbeddingStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with room for `capacity` vectors.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            dimension: None,
        }
    }

    /// Append a vector, returning its position.
    pub fn insert(&mut self, chunk_id: impl Into<String>, vector: Vec<f32>) -> Result<usize> {
        match self.dimension {
            Some(expected) if vector.len() != expected => {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            None if vector.is_empty() => {
                return Err(RagError::DimensionMismatch {
                    expected: 1,
                    actual: 0,
                });
            }
            None => self.dimension = Some(vector.len()),
            Some(_) => {}
        }

        self.entries.push(Embedding {
            chunk_id: chunk_id.into(),
            vector,
        });
        Ok(self.entries.len() - 1)
    }

    /// All embeddings in insertion order.
    pub fn get_all(&self) -> &[Embedding] {
        &self.entries
    }

    pub fn get(&self, position: usize) -> Option<&Embedding> {
        self.entries.get(position)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The established dimension, if anything has been inserted.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

/// Scale `vector` to unit length in place. A zero vector is left as is.
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Owned variant of [`normalize`].
pub fn normalized(mut vector: Vec<f32>) -> Vec<f32> {
    normalize(&mut vector);
    vector
}

/// Cosine similarity of unnormalized vectors; mismatched lengths score 0.
#[cfg(test)]
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
