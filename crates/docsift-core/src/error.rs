use std::path::PathBuf;

/// Errors that can occur across the docsift crates.
///
/// Embedding trouble is mostly recovered inside the retrieval crate (chunks
/// are dropped, or the index switches to keyword mode), so only
/// [`DocsiftError::InvalidConfiguration`], [`DocsiftError::EmptyIndex`] and
/// [`DocsiftError::DimensionMismatch`] normally reach a retrieval caller.
/// The binary crate converts to `miette::Report` at the boundary.
///
/// # Examples
///
/// ```
/// use docsift_core::DocsiftError;
///
/// let err = DocsiftError::InvalidConfiguration("overlap must be smaller than chunk size".into());
/// assert!(err.to_string().contains("overlap"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DocsiftError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or inconsistent configuration (e.g. a non-positive chunk stride).
    #[error("invalid configuration: {0}")]
    #[diagnostic(help("check the [retrieval] section of .docsift.toml"))]
    InvalidConfiguration(String),

    /// The embedding capability could not be set up.
    #[error("embedding capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A single embedding call failed after the capability was set up.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Search was attempted before any document was indexed.
    #[error("no document indexed")]
    #[diagnostic(help("index a document before searching"))]
    EmptyIndex,

    /// Two vectors of different dimensionality were compared.
    #[error("vector dimension mismatch: {left} vs {right}")]
    DimensionMismatch {
        /// Length of the first vector.
        left: usize,
        /// Length of the second vector.
        right: usize,
    },

    /// Answer endpoint request or response error.
    #[error("answer error: {0}")]
    Answer(String),

    /// The document type cannot be turned into plain text here.
    #[error("unsupported document: {0}")]
    UnsupportedDocument(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl DocsiftError {
    /// Whether this error means the embedding capability itself is unusable,
    /// as opposed to a single failed call.
    ///
    /// # Examples
    ///
    /// ```
    /// use docsift_core::DocsiftError;
    ///
    /// assert!(DocsiftError::CapabilityUnavailable("timeout".into()).is_capability_error());
    /// assert!(!DocsiftError::Embedding("bad input".into()).is_capability_error());
    /// ```
    pub fn is_capability_error(&self) -> bool {
        matches!(self, DocsiftError::CapabilityUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DocsiftError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn invalid_configuration_displays_message() {
        let err = DocsiftError::InvalidConfiguration("bad stride".into());
        assert_eq!(err.to_string(), "invalid configuration: bad stride");
    }

    #[test]
    fn dimension_mismatch_shows_both_lengths() {
        let err = DocsiftError::DimensionMismatch { left: 2, right: 3 };
        assert_eq!(err.to_string(), "vector dimension mismatch: 2 vs 3");
    }

    #[test]
    fn capability_and_call_failures_are_distinguishable() {
        let setup = DocsiftError::CapabilityUnavailable("model load timed out".into());
        let call = DocsiftError::Embedding("HTTP 500".into());
        assert!(setup.is_capability_error());
        assert!(!call.is_capability_error());
        assert_ne!(setup.to_string(), call.to_string());
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = DocsiftError::FileNotFound(PathBuf::from("/tmp/missing.txt"));
        assert!(err.to_string().contains("/tmp/missing.txt"));
    }
}
