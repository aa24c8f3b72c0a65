//! Core types, configuration, and error handling for docsift.
//!
//! This crate provides the shared foundation used by the other docsift crates:
//! - [`DocsiftError`]: unified error type using `thiserror`
//! - [`DocsiftConfig`]: configuration loaded from `.docsift.toml`
//! - Shared types: [`Chunk`], [`ScoredResult`], [`IndexMode`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{AnswerConfig, DocsiftConfig, EmbeddingConfig, RetrievalConfig};
pub use error::DocsiftError;
pub use types::{Chunk, IndexMode, OutputFormat, ScoredResult};

/// A convenience `Result` type for docsift operations.
pub type Result<T> = std::result::Result<T, DocsiftError>;
