//! Source documents for the retrieval engine.
//!
//! A document is loaded once and never mutated. The whitespace-normalized
//! text and its word count are derived at construction so every chunking
//! pass sees the same tokens.

use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Format the raw text was extracted from.
///
/// Parsing of these formats happens upstream; the engine only keeps the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Pdf,
    Markdown,
    Text,
    Html,
    Other,
}

impl MediaType {
    /// Infer the media type from a file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => MediaType::Pdf,
            Some("md") | Some("markdown") => MediaType::Markdown,
            Some("txt") | Some("text") => MediaType::Text,
            Some("html") | Some("htm") => MediaType::Html,
            _ => MediaType::Other,
        }
    }
}

/// The fields a document source supplies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub raw_text: String,
    pub source: String,
    pub media_type: MediaType,
}

/// A loaded document with its derived, normalized text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "DocumentRecord")]
pub struct Document {
    id: String,
    raw_text: String,
    source: String,
    media_type: MediaType,
    normalized_text: String,
    word_count: usize,
}

impl From<DocumentRecord> for Document {
    fn from(record: DocumentRecord) -> Self {
        Self::new(record.id, record.raw_text, record.source, record.media_type)
    }
}

impl Document {
    /// Create a document and derive its normalized text.
    pub fn new(
        id: impl Into<String>,
        raw_text: impl Into<String>,
        source: impl Into<String>,
        media_type: MediaType,
    ) -> Self {
        let raw_text = raw_text.into();
        let normalized_text = normalize_whitespace(&raw_text);
        let word_count = normalized_text.split(' ').filter(|w| !w.is_empty()).count();

        Self {
            id: id.into(),
            raw_text,
            source: source.into(),
            media_type,
            normalized_text,
            word_count,
        }
    }

    /// Create a plain-text document whose source is its id.
    pub fn from_text(id: impl Into<String>, content: impl Into<String>) -> Self {
        let id = id.into();
        let source = id.clone();
        Self::new(id, content, source, MediaType::Text)
    }

    /// Load a file as raw text. The id is the file stem, the source the path.
    pub fn from_text_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;

        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_string();

        Ok(Self::new(
            id,
            content,
            path.display().to_string(),
            MediaType::from_path(path),
        ))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Trimmed text with every whitespace run collapsed to a single space.
    pub fn normalized_text(&self) -> &str {
        &self.normalized_text
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Character count of the normalized text.
    pub fn char_count(&self) -> usize {
        self.normalized_text.chars().count()
    }

    /// The words of the normalized text, in order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.normalized_text.split(' ').filter(|w| !w.is_empty())
    }
}

/// Trim and collapse whitespace runs to one space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extensions picked up when walking a corpus directory.
const CORPUS_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "html", "htm"];

/// Load every text-like file under `dir` (recursively), sorted by path.
///
/// Document ids are the paths relative to `dir`, so two files with the same
/// stem in different folders stay distinct.
pub fn load_corpus(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(RagError::InvalidCorpusPath(dir.to_path_buf()));
    }

    let mut documents = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            RagError::io(path, source)
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let wanted = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| CORPUS_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !wanted {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        let id = path
            .strip_prefix(dir)
            .unwrap_or(path)
            .display()
            .to_string();

        debug!(document = %id, bytes = content.len(), "loaded corpus file");
        documents.push(Document::new(
            id,
            content,
            path.display().to_string(),
            MediaType::from_path(path),
        ));
    }

    if documents.is_empty() {
        return Err(RagError::EmptyCorpus(dir.to_path_buf()));
    }

    Ok(documents)
}

/// Four short reference documents on RAG topics, for demos and tests.
pub fn sample_documents() -> Vec<Document> {
    vec![
        Document::new(
            "doc_1",
            "RAG (Retrieval Augmented Generation) combines retrieval systems with generative models to provide contextually accurate responses.",
            "rag-guide.pdf",
            MediaType::Pdf,
        ),
        Document::new(
            "doc_2",
            "Vector databases store high-dimensional embeddings that capture semantic meaning of text for efficient similarity search.",
            "vector-db-tutorial.md",
            MediaType::Markdown,
        ),
        Document::new(
            "doc_3",
            "Prompt engineering involves crafting effective prompts to elicit desired responses from language models.",
            "prompt-engineering.txt",
            MediaType::Text,
        ),
        Document::new(
            "doc_4",
            "Llama 3 is a state-of-the-art open-source language model that excels at various NLP tasks including text generation and reasoning.",
            "llama3-overview.html",
            MediaType::Html,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalization_is_derived_once() {
        let doc = Document::from_text("d", "  Hello\n\n world,\tthis   is a test.  ");
        assert_eq!(doc.normalized_text(), "Hello world, this is a test.");
        assert_eq!(doc.word_count(), 6);
        assert_eq!(doc.raw_text(), "  Hello\n\n world,\tthis   is a test.  ");
        assert_eq!(doc.source(), "d");
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::from_text("empty", " \n\t ");
        assert_eq!(doc.normalized_text(), "");
        assert_eq!(doc.word_count(), 0);
        assert_eq!(doc.words().count(), 0);
    }

    #[test]
    fn test_media_type_from_path() {
        assert_eq!(MediaType::from_path(Path::new("a.PDF")), MediaType::Pdf);
        assert_eq!(MediaType::from_path(Path::new("a.md")), MediaType::Markdown);
        assert_eq!(MediaType::from_path(Path::new("a.htm")), MediaType::Html);
        assert_eq!(MediaType::from_path(Path::new("a.txt")), MediaType::Text);
        assert_eq!(MediaType::from_path(Path::new("a")), MediaType::Other);
    }

    #[test]
    fn test_deserialize_derives_fields() {
        let json = r#"{"id":"x","raw_text":"a  b\nc","source":"x.md","media_type":"markdown"}"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.normalized_text(), "a b c");
        assert_eq!(doc.word_count(), 3);
        assert_eq!(doc.media_type(), MediaType::Markdown);
    }

    #[test]
    fn test_load_corpus() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "second file").unwrap();
        std::fs::write(dir.path().join("a.md"), "# first file").unwrap();
        std::fs::write(dir.path().join("nested/c.html"), "<p>third</p>").unwrap();
        std::fs::write(dir.path().join("image.png"), "not text").unwrap();

        let docs = load_corpus(dir.path()).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id().to_string()).collect();
        assert_eq!(docs.len(), 3);
        assert_eq!(ids[0], "a.md");
        assert_eq!(ids[1], "b.txt");
        assert_eq!(docs[2].media_type(), MediaType::Html);
    }

    #[test]
    fn test_load_corpus_errors() {
        assert!(matches!(
            load_corpus(Path::new("/nonexistent/corpus")),
            Err(RagError::InvalidCorpusPath(_))
        ));

        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_corpus(dir.path()),
            Err(RagError::EmptyCorpus(_))
        ));
    }

    #[test]
    fn test_sample_documents() {
        let docs = sample_documents();
        assert_eq!(docs.len(), 4);
        assert!(docs.iter().all(|d| d.word_count() > 0));
    }
}
