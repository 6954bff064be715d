//! Record of completed evaluation runs.

use super::aggregator::EvaluationSummary;
use crate::error::{RagError, Result};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Append-only log of evaluation summaries, shared between aggregators.
///
/// With a capacity set, recording past it drops the oldest entry.
#[derive(Debug, Default)]
pub struct EvaluationHistory {
    capacity: Option<usize>,
    entries: Mutex<VecDeque<EvaluationSummary>>,
}

impl EvaluationHistory {
    /// Unbounded history.
    pub fn new() -> Self {
        Self::default()
    }

    /// History keeping at most `capacity` runs.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RagError::invalid_config(
                "history_capacity",
                capacity,
                "history_capacity > 0",
            ));
        }
        Ok(Self {
            capacity: Some(capacity),
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        })
    }

    /// From an optional capacity, as held in configuration.
    pub fn from_capacity(capacity: Option<usize>) -> Result<Self> {
        match capacity {
            Some(n) => Self::with_capacity(n),
            None => Ok(Self::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<EvaluationSummary>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn record(&self, summary: EvaluationSummary) {
        let mut entries = self.entries();
        if let Some(capacity) = self.capacity {
            while entries.len() >= capacity {
                entries.pop_front();
            }
        }
        entries.push_back(summary);
    }

    /// All retained runs, oldest first.
    pub fn snapshot(&self) -> Vec<EvaluationSummary> {
        self.entries().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<EvaluationSummary> {
        self.entries().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}
