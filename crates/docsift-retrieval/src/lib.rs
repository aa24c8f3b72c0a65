//! Chunking, embedding, indexing and ranked search over a single document.
//!
//! The pieces, bottom-up:
//! - [`chunker`]: fixed-size character windows with overlap
//! - [`embedding`]: the [`EmbeddingBackend`] seam and an HTTP client for it
//! - [`capability`]: [`LazyEmbedder`], once-only backend setup with a timeout
//! - [`index`]: [`IndexBuilder`], batched embedding with keyword fallback
//! - [`search`], [`similarity`], [`keyword`]: ranking
//! - [`events`]: progress notifications
//!
//! Most callers only need [`Retriever`].

pub mod capability;
pub mod chunker;
pub mod embedding;
pub mod events;
pub mod index;
pub mod keyword;
pub mod retriever;
pub mod search;
pub mod similarity;

pub use capability::{CapabilityState, LazyEmbedder};
pub use embedding::{EmbeddingBackend, HttpEmbedder};
pub use events::{ChannelObserver, IndexEvent, IndexObserver, NoopObserver};
pub use index::{DocumentIndex, IndexBuilder, SharedIndex};
pub use retriever::Retriever;
pub use search::SearchEngine;
