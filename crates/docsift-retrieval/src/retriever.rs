//! One-stop facade over indexing and search for a single document.

use std::sync::Arc;

use docsift_core::{DocsiftConfig, DocsiftError, IndexMode, RetrievalConfig, ScoredResult};

use crate::capability::LazyEmbedder;
use crate::embedding::{EmbeddingBackend, HttpEmbedder};
use crate::events::IndexObserver;
use crate::index::{read_index, IndexBuilder, SharedIndex};
use crate::search::SearchEngine;

/// Indexes one document at a time and answers ranked queries against it.
///
/// `index_document`, `clear` and `search` take `&self` and may be called
/// from concurrent tasks. A `clear` issued while indexing is in flight
/// wins: the in-flight run discards its results. Searches running during
/// a rebuild see whatever the index held at the moment they started,
/// possibly nothing; callers that need read-after-index ordering must
/// await `index_document` before searching.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use docsift_core::DocsiftConfig;
/// use docsift_retrieval::events::NoopObserver;
/// use docsift_retrieval::Retriever;
///
/// # async fn example() -> docsift_core::Result<()> {
/// let retriever = Retriever::from_config(&DocsiftConfig::default(), Arc::new(NoopObserver))?;
/// retriever.index_document("Mitochondria produce ATP. Ribosomes build proteins.").await?;
/// let hits = retriever.search_default("what makes ATP?").await?;
/// println!("{}", hits[0].text);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Retriever {
    index: SharedIndex,
    embedder: Arc<LazyEmbedder>,
    builder: IndexBuilder,
    engine: SearchEngine,
    top_k: usize,
}

impl Retriever {
    /// Build a retriever around an existing embedder.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::InvalidConfiguration`] if `config` is invalid.
    pub fn new(
        embedder: Arc<LazyEmbedder>,
        observer: Arc<dyn IndexObserver>,
        config: RetrievalConfig,
    ) -> Result<Self, DocsiftError> {
        let index = SharedIndex::default();
        let top_k = config.top_k;
        let builder = IndexBuilder::new(Arc::clone(&index), Arc::clone(&embedder), observer, config)?;
        let engine = SearchEngine::new(Arc::clone(&index), Arc::clone(&embedder));
        Ok(Self {
            index,
            embedder,
            builder,
            engine,
            top_k,
        })
    }

    /// Build a retriever backed by an [`HttpEmbedder`] configured from `config`.
    ///
    /// Nothing is contacted here; the embedding endpoint is first contacted on use.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::InvalidConfiguration`] if the retrieval
    /// settings are invalid.
    pub fn from_config(
        config: &DocsiftConfig,
        observer: Arc<dyn IndexObserver>,
    ) -> Result<Self, DocsiftError> {
        let backend: Arc<dyn EmbeddingBackend> = Arc::new(HttpEmbedder::with_config(&config.embedding));
        let embedder = Arc::new(LazyEmbedder::with_config(backend, &config.embedding));
        Self::new(embedder, observer, config.retrieval.clone())
    }

    /// Set up the embedding capability ahead of the first document.
    ///
    /// Optional: indexing initializes on demand.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::CapabilityUnavailable`] if setup fails.
    pub async fn initialize(&self) -> Result<(), DocsiftError> {
        self.embedder.initialize().await
    }

    /// Replace the index with the chunks of `text`. See
    /// [`IndexBuilder::index_document`].
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::InvalidConfiguration`] on bad chunk settings.
    pub async fn index_document(&self, text: &str) -> Result<usize, DocsiftError> {
        self.builder.index_document(text).await
    }

    /// Rank the indexed chunks against `query`, returning at most `top_k`.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::EmptyIndex`] if no document is indexed, or
    /// [`DocsiftError::DimensionMismatch`] on inconsistent vectors.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredResult>, DocsiftError> {
        self.engine.search(query, top_k).await
    }

    /// [`Retriever::search`] with the configured `top_k`.
    ///
    /// # Errors
    ///
    /// Same as [`Retriever::search`].
    pub async fn search_default(&self, query: &str) -> Result<Vec<ScoredResult>, DocsiftError> {
        self.search(query, self.top_k).await
    }

    /// Best chunks to send as answer context for `question`.
    ///
    /// Never fails: an empty index or a search error yields no context, so
    /// the question can still be answered without it.
    pub async fn context_for(&self, question: &str) -> Vec<ScoredResult> {
        match self.search_default(question).await {
            Ok(results) => results,
            Err(DocsiftError::EmptyIndex) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "search failed; answering without context");
                Vec::new()
            }
        }
    }

    /// Empty the index. Any indexing run in flight discards its results.
    pub fn clear(&self) {
        self.builder.clear();
    }

    /// Number of chunks currently indexed.
    pub fn chunk_count(&self) -> usize {
        read_index(&self.index).len()
    }

    /// Whether a document is indexed.
    pub fn is_indexed(&self) -> bool {
        !read_index(&self.index).is_empty()
    }

    /// How the current index was built.
    pub fn mode(&self) -> IndexMode {
        read_index(&self.index).mode()
    }

    /// Texts of all indexed chunks, in document order.
    pub fn chunk_texts(&self) -> Vec<String> {
        read_index(&self.index)
            .chunks()
            .iter()
            .map(|c| c.text.clone())
            .collect()
    }

    /// The shared embedder, for inspecting its state.
    pub fn embedder(&self) -> &Arc<LazyEmbedder> {
        &self.embedder
    }

    /// Configured default result count.
    pub fn top_k(&self) -> usize {
        self.top_k
    }
}
