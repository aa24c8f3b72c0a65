//! Preparing a whole document for a single summary request.
//!
//! Token counts are estimated at four characters per token, which is close
//! enough to keep a request inside the answer model's context window.

/// Token budget for the document text of one summary request.
pub const DEFAULT_SUMMARY_TOKENS: usize = 5000;

/// Question sent along with the document when summarizing.
pub const SUMMARY_QUESTION: &str =
    "Please provide a comprehensive summary of this document. Focus on the main points and key information.";

const CHARS_PER_TOKEN: usize = 4;

/// Rough token count for `text`.
///
/// # Examples
///
/// ```
/// use docsift_answer::summary::estimate_tokens;
///
/// assert_eq!(estimate_tokens(""), 0);
/// assert_eq!(estimate_tokens("abcde"), 2);
/// ```
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Shorten `text` to roughly `max_tokens` tokens.
///
/// Text already within budget is returned unchanged. Otherwise the text is
/// cut to `max_tokens * 4` characters, backed up to the last sentence end or
/// newline if that keeps more than 80% of the budget, and suffixed with `...`.
///
/// # Examples
///
/// ```
/// use docsift_answer::summary::truncate_to_token_limit;
///
/// let text = "Alpha beta. Gamma delta epsilon";
/// assert_eq!(truncate_to_token_limit(text, 10), text);
/// assert_eq!(truncate_to_token_limit(text, 3), "Alpha beta....");
/// ```
pub fn truncate_to_token_limit(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    let end = match text.char_indices().nth(max_chars) {
        Some((byte, _)) => byte,
        None => return text.to_string(),
    };
    let truncated = &text[..end];

    if let Some(cut) = truncated.rfind(['.', '\n']) {
        let cut_chars = truncated[..cut].chars().count();
        if cut_chars * 5 > max_chars * 4 {
            return format!("{}...", &truncated[..=cut]);
        }
    }
    format!("{truncated}...")
}

/// Join chunk texts with blank lines and fit them to `max_tokens`.
///
/// Returns the prepared text and whether it had to be shortened.
pub fn prepare_document(chunks: &[String], max_tokens: usize) -> (String, bool) {
    let joined = chunks.join("\n\n");
    if estimate_tokens(&joined) > max_tokens {
        tracing::info!(
            estimated = estimate_tokens(&joined),
            max_tokens,
            "document exceeds summary budget; truncating"
        );
        (truncate_to_token_limit(&joined, max_tokens), true)
    } else {
        (joined, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcdefghi"), 3);
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn cuts_at_late_sentence_boundary() {
        // limit 40 chars; the period at index 35 is past 80%
        let text = format!("{}. {}", "a".repeat(35), "b".repeat(20));
        let out = truncate_to_token_limit(&text, 10);
        assert_eq!(out, format!("{}....", "a".repeat(35)));
    }

    #[test]
    fn early_boundary_is_ignored() {
        let text = format!("Hi.\n{}", "c".repeat(60));
        let out = truncate_to_token_limit(&text, 10);
        assert_eq!(out.chars().count(), 43);
        assert!(out.ends_with("c..."));
    }

    #[test]
    fn newline_counts_as_boundary() {
        let text = format!("{}\n{}", "d".repeat(38), "e".repeat(10));
        let out = truncate_to_token_limit(&text, 10);
        assert_eq!(out, format!("{}\n...", "d".repeat(38)));
    }

    #[test]
    fn multibyte_text_is_cut_on_char_boundaries() {
        let text = "ü".repeat(50);
        let out = truncate_to_token_limit(&text, 5);
        assert_eq!(out, format!("{}...", "ü".repeat(20)));
    }

    #[test]
    fn prepare_document_joins_and_reports_truncation() {
        let chunks = vec!["first".to_string(), "second".to_string()];
        assert_eq!(
            prepare_document(&chunks, DEFAULT_SUMMARY_TOKENS),
            ("first\n\nsecond".to_string(), false)
        );

        let long = vec!["x".repeat(30)];
        let (text, truncated) = prepare_document(&long, 5);
        assert!(truncated);
        assert_eq!(text, format!("{}...", "x".repeat(20)));
    }
}
