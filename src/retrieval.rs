//! Build-then-serve retrieval over chunked, embedded documents.
//!
//! [`RetrievalIndex`] is an immutable handle produced by one build.
//! [`RetrievalEngine`] owns the current handle and swaps in a fresh one on
//! every rebuild, so concurrent searches always see a complete index.

use crate::chunker::{Chunk, ChunkConfig, Chunker};
use crate::document::Document;
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::similarity::SimilarityIndex;
use crate::store::{EmbeddingStore, normalized};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How embedding calls are issued during a build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Maximum embedder calls in flight.
    pub concurrency: usize,
    /// Per-call deadline; `None` waits indefinitely.
    pub embed_timeout: Option<Duration>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            embed_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// A retrieved chunk with its score and 1-based rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub similarity_score: f32,
    pub rank: usize,
}

impl SearchResult {
    pub fn chunk_id(&self) -> &str {
        &self.chunk.chunk_id
    }
}

/// Run `fut`, mapping expiry of `timeout` to `on_timeout`.
pub(crate) async fn bounded<T, F>(
    timeout: Option<Duration>,
    fut: F,
    on_timeout: fn(Duration) -> RagError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| on_timeout(limit))?,
        None => fut.await,
    }
}

async fn embed_normalized(
    embedder: &dyn Embedder,
    text: &str,
    timeout: Option<Duration>,
) -> Result<Vec<f32>> {
    let vector = bounded(timeout, embedder.embed(text), RagError::embedder_timeout).await?;
    Ok(normalized(vector))
}

/// An immutable index: chunks, their unit vectors, and build metadata.
#[derive(Debug)]
pub struct RetrievalIndex {
    chunk_config: ChunkConfig,
    store: EmbeddingStore,
    /// Store position -> chunk record.
    chunks: Vec<Chunk>,
    document_count: usize,
    built_at: DateTime<Utc>,
}

impl RetrievalIndex {
    /// Chunk `documents`, embed every chunk and index the vectors.
    ///
    /// An empty document set yields a valid, empty index.
    pub async fn build(
        documents: &[Document],
        chunk_config: ChunkConfig,
        embedder: &dyn Embedder,
        options: &BuildOptions,
    ) -> Result<Self> {
        if options.concurrency == 0 {
            return Err(RagError::invalid_config("concurrency", 0, "concurrency > 0"));
        }
        let start = Instant::now();
        let chunker = Chunker::new(chunk_config)?;
        let chunks = chunker.chunk_all(documents);

        // `buffered` yields in input order, so vector i belongs to chunk i.
        let vectors: Vec<Vec<f32>> = stream::iter(chunks.iter())
            .map(|chunk| embed_normalized(embedder, &chunk.text, options.embed_timeout))
            .buffered(options.concurrency)
            .try_collect()
            .await?;

        let mut store = EmbeddingStore::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            store.insert(chunk.chunk_id.clone(), vector)?;
        }

        info!(
            embedder = embedder.name(),
            documents = documents.len(),
            chunks = chunks.len(),
            dimension = store.dimension().unwrap_or(0),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "retrieval index built"
        );

        Ok(Self {
            chunk_config,
            store,
            chunks,
            document_count: documents.len(),
            built_at: Utc::now(),
        })
    }

    /// Embed `query` and return the `top_k` most similar chunks.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        embedder: &dyn Embedder,
        timeout: Option<Duration>,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(RagError::invalid_config("top_k", 0, "top_k > 0"));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = embed_normalized(embedder, query, timeout).await?;
        let results = self.search_vector(&query_vector, top_k)?;

        debug!(
            query,
            top_k,
            returned = results.len(),
            best = results.first().map(|r| r.similarity_score),
            "search complete"
        );
        Ok(results)
    }

    /// Rank chunks against an already-normalized query vector.
    pub fn search_vector(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let scored = SimilarityIndex::new(&self.store).top_k(query_vector, top_k)?;

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, hit)| SearchResult {
                chunk: self.chunks[hit.position].clone(),
                similarity_score: hit.score,
                rank: i + 1,
            })
            .collect())
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks in store order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn dimension(&self) -> Option<usize> {
        self.store.dimension()
    }

    pub fn chunk_config(&self) -> ChunkConfig {
        self.chunk_config
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

/// Holds the live index and the embedder used to build and query it.
pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
    chunk_config: ChunkConfig,
    options: BuildOptions,
    current: RwLock<Option<Arc<RetrievalIndex>>>,
}

impl RetrievalEngine {
    /// Create an engine with no index; rejects an invalid chunk configuration.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        chunk_config: ChunkConfig,
        options: BuildOptions,
    ) -> Result<Self> {
        chunk_config.validate()?;
        Ok(Self {
            embedder,
            chunk_config,
            options,
            current: RwLock::new(None),
        })
    }

    /// Build a new index from `documents` and make it the live one.
    ///
    /// Searches running during the build keep using the previous index.
    pub async fn build(&self, documents: &[Document]) -> Result<Arc<RetrievalIndex>> {
        let index = Arc::new(
            RetrievalIndex::build(
                documents,
                self.chunk_config,
                self.embedder.as_ref(),
                &self.options,
            )
            .await?,
        );

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Search the live index. Fails with [`RagError::IndexNotBuilt`] before the first build.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let index = self.index().ok_or(RagError::IndexNotBuilt)?;
        index
            .search(
                query,
                top_k,
                self.embedder.as_ref(),
                self.options.embed_timeout,
            )
            .await
    }

    /// Snapshot of the live index, if one has been built.
    pub fn index(&self) -> Option<Arc<RetrievalIndex>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_built(&self) -> bool {
        self.index().is_some()
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::sample_documents;
    use crate::embedding::HashingEmbedder;
    use async_trait::async_trait;

    /// Maps known texts to fixed vectors; anything else embeds to `[0, 0]`.
    struct TableEmbedder(Vec<(&'static str, Vec<f32>)>);

    #[async_trait]
    impl Embedder for TableEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(self
                .0
                .iter()
                .find(|(t, _)| *t == text)
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| vec![0.0, 0.0]))
        }
    }

    struct SlowEmbedder;

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![1.0])
        }
    }

    struct RaggedEmbedder;

    #[async_trait]
    impl Embedder for RaggedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0; text.len()])
        }
    }

    fn hashing_engine() -> RetrievalEngine {
        RetrievalEngine::new(
            Arc::new(HashingEmbedder::new(512).unwrap()),
            ChunkConfig::new(100, 20),
            BuildOptions::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_before_build_fails() {
        let engine = hashing_engine();
        assert!(!engine.is_built());
        assert!(matches!(
            engine.search("anything", 3).await,
            Err(RagError::IndexNotBuilt)
        ));
    }

    #[tokio::test]
    async fn test_empty_build_searches_empty() {
        let engine = hashing_engine();
        let index = engine.build(&[]).await.unwrap();
        assert!(index.is_empty());
        assert!(engine.search("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_ranks_are_dense_and_sorted() {
        let engine = hashing_engine();
        engine.build(&sample_documents()).await.unwrap();

        let results = engine
            .search("How do vector databases store embeddings?", 3)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.parent_document_id, "doc_2");
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.rank, i + 1);
        }
        for pair in results.windows(2) {
            assert!(pair[0].similarity_score >= pair[1].similarity_score);
        }
    }

    #[tokio::test]
    async fn test_search_resolves_positions_to_chunks() {
        let embedder = TableEmbedder(vec![
            ("alpha", vec![1.0, 0.0]),
            ("beta", vec![0.0, 1.0]),
            ("gamma", vec![0.7, 0.7]),
            ("query", vec![2.0, 0.0]),
        ]);
        let docs = vec![
            Document::from_text("a", "alpha"),
            Document::from_text("b", "beta"),
            Document::from_text("c", "gamma"),
        ];
        let index = RetrievalIndex::build(
            &docs,
            ChunkConfig::new(5, 1),
            &embedder,
            &BuildOptions::default(),
        )
        .await
        .unwrap();

        let results = index.search("query", 5, &embedder, None).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.chunk_id()).collect();
        assert_eq!(ids, vec!["chunk_0", "chunk_2", "chunk_1"]);
        assert!((results[0].similarity_score - 1.0).abs() < 1e-6);
        assert_eq!(results[1].chunk.text, "gamma");
    }

    #[tokio::test]
    async fn test_rebuild_swaps_index() {
        let engine = hashing_engine();
        let first = engine.build(&sample_documents()).await.unwrap();
        let second = engine
            .build(&[Document::from_text("only", "a single tiny document")])
            .await
            .unwrap();

        assert_eq!(first.len(), 4);
        assert_eq!(second.len(), 1);
        assert_eq!(engine.index().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_embedder_timeout_surfaces() {
        let options = BuildOptions {
            concurrency: 2,
            embed_timeout: Some(Duration::from_millis(100)),
        };
        let result = RetrievalIndex::build(
            &sample_documents(),
            ChunkConfig::default(),
            &SlowEmbedder,
            &options,
        )
        .await;

        assert!(matches!(result, Err(RagError::EmbedderFailure(ref m)) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn test_inconsistent_embedder_dimension_fails_build() {
        let result = RetrievalIndex::build(
            &sample_documents(),
            ChunkConfig::default(),
            &RaggedEmbedder,
            &BuildOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(RagError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_invalid_chunk_config_rejected() {
        let result = RetrievalEngine::new(
            Arc::new(HashingEmbedder::new(8).unwrap()),
            ChunkConfig::new(10, 10),
            BuildOptions::default(),
        );
        assert!(result.is_err());
    }
}
