//! Client for the external answer endpoint and summary preparation.
//!
//! Retrieval never calls this crate; the CLI passes search results here.

pub mod client;
pub mod summary;

pub use client::{AnswerClient, AnswerRequest};
pub use summary::{estimate_tokens, prepare_document, truncate_to_token_limit};
