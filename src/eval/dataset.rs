//! Evaluation test sets.
//!
//! Accepts either a bare JSON array of test cases or a named object:
//!
//! ```json
//! {
//!   "name": "my_set",
//!   "test_cases": [
//!     {
//!       "query": "What is RAG?",
//!       "response": "RAG combines retrieval with generation.",
//!       "context": ["RAG retrieves documents before generating."],
//!       "ground_truth": "RAG is retrieval plus generation."
//!     }
//!   ]
//! }
//! ```

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One query with the answer under evaluation and the context it used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub query: String,
    pub response: String,
    /// Retrieved passages, in rank order.
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_truth: Option<String>,
}

impl TestCase {
    pub fn new(
        query: impl Into<String>,
        response: impl Into<String>,
        context: Vec<String>,
    ) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
            context,
            ground_truth: None,
        }
    }

    pub fn with_ground_truth(mut self, ground_truth: impl Into<String>) -> Self {
        self.ground_truth = Some(ground_truth.into());
        self
    }
}

/// A named, ordered collection of test cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSet {
    pub name: String,
    pub test_cases: Vec<TestCase>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TestSetFile {
    Named(TestSet),
    Bare(Vec<TestCase>),
}

impl TestSet {
    /// Create a new empty test set.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            test_cases: Vec::new(),
        }
    }

    pub fn add(&mut self, case: TestCase) {
        self.test_cases.push(case);
    }

    pub fn len(&self) -> usize {
        self.test_cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.test_cases.is_empty()
    }

    /// Get a subset of cases (for quick runs).
    pub fn take(&self, n: usize) -> Self {
        Self {
            name: self.name.clone(),
            test_cases: self.test_cases.iter().take(n).cloned().collect(),
        }
    }

    /// Parse JSON; a bare array is named `default_name`.
    pub fn from_json(content: &str, default_name: &str) -> Result<Self> {
        let parsed: TestSetFile = serde_json::from_str(content)
            .map_err(|e| RagError::Serialization(format!("invalid test set JSON: {}", e)))?;

        Ok(match parsed {
            TestSetFile::Named(set) => set,
            TestSetFile::Bare(test_cases) => Self {
                name: default_name.to_string(),
                test_cases,
            },
        })
    }

    /// Load from a JSON file; bare arrays take the file stem as their name.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("custom");
        Self::from_json(&content, stem)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RagError::Serialization(e.to_string()))?;
        fs::write(path, content).map_err(|e| RagError::io(path, e))
    }
}

/// The built-in benchmark: four RAG questions with context and ground truth.
pub fn sample_test_set() -> TestSet {
    let mut set = TestSet::new("benchmark");

    set.add(
        TestCase::new(
            "What is RAG and how does it work?",
            "RAG (Retrieval Augmented Generation) is a technique that combines information retrieval with text generation. It works by first retrieving relevant documents from a knowledge base, then using that context to generate more accurate and informed responses.",
            vec![
                "RAG combines retrieval systems with generative models to provide contextually accurate responses.".to_string(),
                "The RAG process involves document retrieval followed by context-aware generation.".to_string(),
                "Vector databases enable efficient similarity search for RAG implementations.".to_string(),
            ],
        )
        .with_ground_truth(
            "RAG is a hybrid approach combining retrieval and generation for better AI responses.",
        ),
    );

    set.add(
        TestCase::new(
            "How do vector databases work in RAG systems?",
            "Vector databases store high-dimensional embeddings that represent the semantic meaning of text chunks. In RAG systems, they enable fast similarity search to find the most relevant documents for a given query.",
            vec![
                "Vector databases store embeddings for efficient similarity search.".to_string(),
                "Embeddings capture semantic meaning of text in high-dimensional space.".to_string(),
                "Cosine similarity is commonly used for vector comparison in RAG.".to_string(),
            ],
        )
        .with_ground_truth(
            "Vector databases enable semantic search through embedding storage and similarity matching.",
        ),
    );

    set.add(
        TestCase::new(
            "What are the benefits of prompt engineering?",
            "Prompt engineering helps optimize AI model outputs by crafting effective input prompts. Benefits include improved response quality, better task completion, and more consistent results.",
            vec![
                "Prompt engineering involves crafting effective prompts for better AI responses.".to_string(),
                "Well-designed prompts lead to more accurate and relevant outputs.".to_string(),
                "Prompt templates can standardize and improve AI interactions.".to_string(),
            ],
        )
        .with_ground_truth(
            "Prompt engineering improves AI performance through optimized input design.",
        ),
    );

    set.add(
        TestCase::new(
            "How does Llama 3 compare to other language models?",
            "Llama 3 is a state-of-the-art open-source language model that offers competitive performance with commercial models. It excels at reasoning, code generation, and following instructions while being freely available.",
            vec![
                "Llama 3 is an open-source language model with strong performance.".to_string(),
                "The model excels at various NLP tasks including reasoning and code generation.".to_string(),
                "Llama 3 offers competitive performance compared to proprietary models.".to_string(),
            ],
        )
        .with_ground_truth(
            "Llama 3 provides competitive open-source alternative to commercial language models.",
        ),
    );

    set
}
