//! The in-memory chunk index and the builder that fills it.
//!
//! Indexing chunks the document, then either embeds every chunk in
//! sequential batches (each batch's calls in flight together) or, if the
//! embedding capability can't be set up, keeps all chunks without vectors
//! for keyword search. Per-chunk embedding failures drop that chunk only.
//!
//! Every run is tagged with the index generation it started from. A run
//! commits only if no `clear` or newer run bumped the generation meanwhile,
//! so a stale run can never overwrite a cleared index.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use docsift_core::{Chunk, DocsiftError, IndexMode, RetrievalConfig};
use futures::future::join_all;

use crate::capability::LazyEmbedder;
use crate::chunker::chunk_text;
use crate::events::{IndexEvent, IndexObserver, Notifier};

/// Status text emitted when indexing falls back to keyword search.
pub const KEYWORD_FALLBACK_STATUS: &str = "Embedding model unavailable; using keyword search";

/// An ordered set of chunks sharing one [`IndexMode`].
///
/// Chunks are stored as an immutable snapshot; indexing replaces the whole
/// snapshot rather than editing it.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    chunks: Arc<[Chunk]>,
    mode: IndexMode,
    generation: u64,
}

impl Default for DocumentIndex {
    fn default() -> Self {
        Self {
            chunks: Arc::from(Vec::new()),
            mode: IndexMode::Empty,
            generation: 0,
        }
    }
}

impl DocumentIndex {
    /// Chunks in document order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Cheap shared handle to the current chunk snapshot.
    pub fn snapshot(&self) -> Arc<[Chunk]> {
        Arc::clone(&self.chunks)
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// How the current chunks were built.
    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Bumped by every `clear` and every indexing run.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether at least one chunk carries an embedding.
    pub fn has_embeddings(&self) -> bool {
        self.chunks.iter().any(Chunk::has_embedding)
    }

    fn reset(&mut self) -> u64 {
        self.generation += 1;
        self.chunks = Arc::from(Vec::new());
        self.mode = IndexMode::Empty;
        self.generation
    }
}

/// An index shared between one builder and any number of readers.
pub type SharedIndex = Arc<RwLock<DocumentIndex>>;

pub(crate) fn read_index(index: &RwLock<DocumentIndex>) -> RwLockReadGuard<'_, DocumentIndex> {
    index.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_index(index: &RwLock<DocumentIndex>) -> RwLockWriteGuard<'_, DocumentIndex> {
    index.write().unwrap_or_else(PoisonError::into_inner)
}

/// Chunks and embeds documents into a [`SharedIndex`].
pub struct IndexBuilder {
    index: SharedIndex,
    embedder: Arc<LazyEmbedder>,
    notifier: Notifier,
    config: RetrievalConfig,
}

impl std::fmt::Debug for IndexBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuilder")
            .field("embedder", &self.embedder)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IndexBuilder {
    /// Create a builder writing into `index`.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::InvalidConfiguration`] if `config` fails
    /// [`RetrievalConfig::validate`].
    pub fn new(
        index: SharedIndex,
        embedder: Arc<LazyEmbedder>,
        observer: Arc<dyn IndexObserver>,
        config: RetrievalConfig,
    ) -> Result<Self, DocsiftError> {
        config.validate()?;
        Ok(Self {
            index,
            embedder,
            notifier: Notifier::new(observer),
            config,
        })
    }

    /// Replace the index contents with the chunks of `text`.
    ///
    /// Emits, in order: a "Chunking text..." status, `on_chunking_complete`,
    /// then per-batch status and `on_progress` (semantic path) or the keyword
    /// fallback status, and finally `on_indexing_complete`.
    ///
    /// Returns the number of chunks committed, which is `0` if the index was
    /// cleared or re-indexed while this run was in flight.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::InvalidConfiguration`] if chunking is
    /// misconfigured. Embedding problems never surface here.
    pub async fn index_document(&self, text: &str) -> Result<usize, DocsiftError> {
        self.notifier.status("Chunking text...");
        let texts = chunk_text(text, self.config.chunk_size, self.config.overlap)
            .inspect_err(|e| self.notifier.status(format!("Indexing failed: {e}")))?;

        let generation = write_index(&self.index).reset();
        tracing::debug!(generation, chunks = texts.len(), "chunking complete");
        self.notifier.emit(IndexEvent::ChunkingComplete {
            chunk_count: texts.len(),
        });

        let (chunks, mode) = if texts.is_empty() {
            (Vec::new(), IndexMode::Empty)
        } else {
            match self.embedder.initialize().await {
                Ok(()) => {
                    let chunks = self.embed_batches(&texts).await;
                    let mode = if chunks.is_empty() {
                        IndexMode::Empty
                    } else {
                        IndexMode::Semantic
                    };
                    (chunks, mode)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "embedding unavailable, indexing for keyword search");
                    self.notifier.status(KEYWORD_FALLBACK_STATUS);
                    (keyword_chunks(texts), IndexMode::Keyword)
                }
            }
        };

        let count = chunks.len();
        if !self.commit(generation, chunks, mode) {
            tracing::warn!(generation, "index changed during indexing; discarding results");
            self.notifier
                .status("Indexing discarded: the index was cleared or replaced");
            return Ok(0);
        }

        tracing::info!(chunks = count, %mode, "document indexed");
        self.notifier.status(format!("Indexed {count} chunks"));
        self.notifier.emit(IndexEvent::IndexingComplete { final_count: count });
        Ok(count)
    }

    /// Empty the index and clear the status. Any run in flight will discard
    /// its results instead of committing them.
    pub fn clear(&self) {
        let generation = write_index(&self.index).reset();
        tracing::debug!(generation, "index cleared");
        self.notifier.status("");
    }

    async fn embed_batches(&self, texts: &[String]) -> Vec<Chunk> {
        let total = texts.len();
        let batch_size = self.config.batch_size;
        let batch_count = total.div_ceil(batch_size);

        let mut kept: Vec<Chunk> = Vec::with_capacity(total);
        let mut dimensions: Option<usize> = None;

        for (batch_index, batch) in texts.chunks(batch_size).enumerate() {
            let offset = batch_index * batch_size;
            self.notifier.status(format!(
                "Embedding batch {}/{batch_count} ({}-{}/{total})",
                batch_index + 1,
                offset + 1,
                offset + batch.len(),
            ));

            // join_all yields results in input order, not completion order.
            let results = join_all(batch.iter().map(|text| self.embedder.embed(text))).await;

            for (position, (text, result)) in batch.iter().zip(results).enumerate() {
                let index = offset + position;
                match result {
                    Ok(vector) => {
                        let expected = *dimensions.get_or_insert(vector.len());
                        if vector.len() != expected {
                            tracing::warn!(
                                chunk = index,
                                expected,
                                actual = vector.len(),
                                "dropping chunk with inconsistent embedding size"
                            );
                            continue;
                        }
                        kept.push(Chunk {
                            text: text.clone(),
                            embedding: Some(vector),
                            index,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(chunk = index, error = %e, "failed to embed chunk; dropping it");
                    }
                }
            }

            self.notifier.emit(IndexEvent::Progress {
                indexed: kept.len(),
                total,
            });
            tokio::task::yield_now().await;
        }

        kept
    }

    fn commit(&self, generation: u64, chunks: Vec<Chunk>, mode: IndexMode) -> bool {
        let mut index = write_index(&self.index);
        if index.generation != generation {
            return false;
        }
        index.chunks = Arc::from(chunks);
        index.mode = mode;
        true
    }
}

fn keyword_chunks(texts: Vec<String>) -> Vec<Chunk> {
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            text,
            embedding: None,
            index,
        })
        .collect()
}
