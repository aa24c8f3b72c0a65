//! Fixed-size, overlapping window chunking.
//!
//! Windows are measured in characters (Unicode scalar values), never bytes,
//! so a window boundary can't split a multi-byte character.

use docsift_core::DocsiftError;

/// A raw window over the source text, in character offsets.
///
/// # Examples
///
/// ```
/// use docsift_retrieval::chunker::ChunkSpan;
///
/// let span = ChunkSpan { start: 1600, end: 3600 };
/// assert_eq!(span.len(), 2000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// First character of the window (inclusive).
    pub start: usize,
    /// One past the last character of the window.
    pub end: usize,
}

impl ChunkSpan {
    /// Number of characters in the window before trimming.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the window covers no characters.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Reject window settings whose stride is not positive.
///
/// # Errors
///
/// Returns [`DocsiftError::InvalidConfiguration`] if `size` is zero or
/// `overlap >= size`.
fn check_window(size: usize, overlap: usize) -> Result<usize, DocsiftError> {
    if size == 0 {
        return Err(DocsiftError::InvalidConfiguration(
            "chunk size must be greater than zero".into(),
        ));
    }
    if overlap >= size {
        return Err(DocsiftError::InvalidConfiguration(format!(
            "overlap ({overlap}) must be smaller than chunk size ({size})"
        )));
    }
    Ok(size - overlap)
}

/// Compute the raw windows `[offset, offset + size)` for `text`, advancing
/// by `size - overlap` while the offset is inside the text.
///
/// # Errors
///
/// Returns [`DocsiftError::InvalidConfiguration`] if the stride is not positive.
///
/// # Examples
///
/// ```
/// use docsift_retrieval::chunker::chunk_spans;
///
/// let text = "a".repeat(5000);
/// let spans = chunk_spans(&text, 2000, 400).unwrap();
/// let starts: Vec<usize> = spans.iter().map(|s| s.start).collect();
/// assert_eq!(starts, vec![0, 1600, 3200, 4800]);
/// ```
pub fn chunk_spans(text: &str, size: usize, overlap: usize) -> Result<Vec<ChunkSpan>, DocsiftError> {
    let stride = check_window(size, overlap)?;
    let total = text.chars().count();

    let mut spans = Vec::with_capacity(total / stride + 1);
    let mut start = 0;
    while start < total {
        let end = start.saturating_add(size).min(total);
        spans.push(ChunkSpan { start, end });
        start += stride;
    }

    Ok(spans)
}

/// Split `text` into overlapping windows, trimmed, with blank windows skipped.
///
/// Output order follows document order; the last chunk may be shorter than
/// `size`.
///
/// # Errors
///
/// Returns [`DocsiftError::InvalidConfiguration`] if `overlap >= size` or
/// `size == 0`.
///
/// # Examples
///
/// ```
/// use docsift_retrieval::chunker::chunk_text;
///
/// let chunks = chunk_text("alpha beta gamma delta", 11, 5).unwrap();
/// assert_eq!(chunks[0], "alpha beta");
/// assert!(chunks.iter().all(|c| !c.is_empty()));
///
/// assert!(chunk_text("anything", 10, 10).is_err());
/// ```
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Result<Vec<String>, DocsiftError> {
    let spans = chunk_spans(text, size, overlap)?;

    // Byte offset of every character boundary, plus the end of the text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();

    let chunks = spans
        .iter()
        .map(|span| text[boundaries[span.start]..boundaries[span.end]].trim())
        .filter(|chunk| !chunk.is_empty())
        .map(str::to_string)
        .collect();

    Ok(chunks)
}
