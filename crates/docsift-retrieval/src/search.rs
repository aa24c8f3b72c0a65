//! Query-time ranking over a [`SharedIndex`].
//!
//! Semantic search runs when the index carries embeddings and the
//! embedding capability is ready; otherwise, or if embedding the query
//! fails, the query is answered with keyword scoring for that call only.

use std::sync::Arc;

use docsift_core::{Chunk, DocsiftError, ScoredResult};

use crate::capability::LazyEmbedder;
use crate::index::{read_index, SharedIndex};
use crate::keyword::keyword_rank;
use crate::similarity::cosine_similarity;

/// Read-only search over an index built by [`crate::index::IndexBuilder`].
///
/// Callers must serialize `search` against `index_document`/`clear`
/// themselves if they need a search to observe a particular indexing run;
/// concurrent calls are memory-safe but may see the index empty mid-rebuild.
pub struct SearchEngine {
    index: SharedIndex,
    embedder: Arc<LazyEmbedder>,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("embedder", &self.embedder)
            .finish_non_exhaustive()
    }
}

impl SearchEngine {
    /// Create an engine reading `index`.
    pub fn new(index: SharedIndex, embedder: Arc<LazyEmbedder>) -> Self {
        Self { index, embedder }
    }

    /// Return up to `top_k` chunks ranked against `query`.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::EmptyIndex`] if nothing is indexed, or
    /// [`DocsiftError::DimensionMismatch`] if the query vector and a chunk
    /// vector differ in length (a model/version inconsistency).
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredResult>, DocsiftError> {
        let (chunks, semantic) = {
            let index = read_index(&self.index);
            if index.is_empty() {
                return Err(DocsiftError::EmptyIndex);
            }
            (index.snapshot(), index.has_embeddings())
        };

        // A blank query has no tokens and no phrase; it never reaches the embedder.
        if semantic && self.embedder.is_ready() && !query.trim().is_empty() {
            match self.embedder.embed(query).await {
                Ok(query_embedding) => {
                    tracing::debug!(top_k, "semantic search");
                    return semantic_rank(&query_embedding, &chunks, top_k);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "query embedding failed; using keyword search for this query");
                }
            }
        }

        tracing::debug!(top_k, "keyword search");
        Ok(keyword_rank(query, &chunks, top_k))
    }
}

/// Rank embedded chunks by cosine similarity to `query_embedding`, best first.
///
/// Chunks without an embedding are skipped.
///
/// # Errors
///
/// Returns [`DocsiftError::DimensionMismatch`] if any chunk vector differs in
/// length from `query_embedding`.
///
/// # Examples
///
/// ```
/// use docsift_core::Chunk;
/// use docsift_retrieval::search::semantic_rank;
///
/// let chunks = vec![
///     Chunk { text: "east".into(), embedding: Some(vec![1.0, 0.0]), index: 0 },
///     Chunk { text: "north".into(), embedding: Some(vec![0.0, 1.0]), index: 1 },
/// ];
/// let hits = semantic_rank(&[0.1, 0.9], &chunks, 5).unwrap();
/// assert_eq!(hits.len(), 2);
/// assert_eq!(hits[0].text, "north");
/// ```
pub fn semantic_rank(
    query_embedding: &[f32],
    chunks: &[Chunk],
    top_k: usize,
) -> Result<Vec<ScoredResult>, DocsiftError> {
    let mut scored: Vec<(f64, &Chunk)> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        if let Some(embedding) = &chunk.embedding {
            scored.push((cosine_similarity(query_embedding, embedding)?, chunk));
        }
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    Ok(scored
        .into_iter()
        .map(|(score, chunk)| ScoredResult {
            text: chunk.text.clone(),
            score,
        })
        .collect())
}
