//! Overlapping word-window chunking.

use crate::document::Document;
use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Configuration for text chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Words per window.
    pub chunk_size: usize,
    /// Words shared between consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            overlap: 20,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Require `chunk_size > 0` and `overlap < chunk_size`.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::invalid_config("chunk_size", 0, "chunk_size > 0"));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::invalid_config(
                "overlap",
                self.overlap,
                format!("overlap < chunk_size ({})", self.chunk_size),
            ));
        }
        Ok(())
    }

    /// Distance in words between consecutive window starts.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// A window of words cut from one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `chunk_{n}`, unique within one chunking pass.
    pub chunk_id: String,
    pub parent_document_id: String,
    pub text: String,
    pub source: String,
    /// Index of the first word (inclusive).
    pub start_word_index: usize,
    /// Index one past the last word.
    pub end_word_index: usize,
    pub word_count: usize,
}

/// Splits documents into overlapping word windows.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkConfig,
}

impl Chunker {
    /// Create a chunker, rejecting an invalid window configuration.
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkConfig {
        self.config
    }

    /// Chunk a single document, numbering chunks from zero.
    ///
    /// Fails with [`RagError::EmptyInput`] when the document has no words.
    pub fn chunk(&self, document: &Document) -> Result<Vec<Chunk>> {
        if document.word_count() == 0 {
            return Err(RagError::EmptyInput(format!(
                "document '{}' has no words to chunk",
                document.id()
            )));
        }

        let mut next_id = 0;
        let mut chunks = Vec::new();
        self.chunk_into(document, &mut next_id, &mut chunks);
        Ok(chunks)
    }

    /// Chunk a whole document set in one pass.
    ///
    /// Chunk ids come from one counter shared across all documents. Documents
    /// without words contribute nothing.
    pub fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut next_id = 0;
        let mut chunks = Vec::new();

        for document in documents {
            if document.word_count() == 0 {
                warn!(document = document.id(), "skipping document with no words");
                continue;
            }
            self.chunk_into(document, &mut next_id, &mut chunks);
        }

        debug!(
            documents = documents.len(),
            chunks = chunks.len(),
            "chunking pass complete"
        );
        chunks
    }

    fn chunk_into(&self, document: &Document, next_id: &mut usize, out: &mut Vec<Chunk>) {
        let words: Vec<&str> = document.words().collect();
        let total = words.len();
        let step = self.config.step();

        let mut start = 0;
        while start < total {
            let end = (start + self.config.chunk_size).min(total);

            out.push(Chunk {
                chunk_id: format!("chunk_{}", *next_id),
                parent_document_id: document.id().to_string(),
                text: words[start..end].join(" "),
                source: document.source().to_string(),
                start_word_index: start,
                end_word_index: end,
                word_count: end - start,
            });

            *next_id += 1;
            start += step;
        }
    }
}
