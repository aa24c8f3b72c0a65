//! Keyword relevance scoring, used when no embeddings are available.
//!
//! A chunk scores one point per case-insensitive occurrence of each query
//! token longer than two characters, plus [`PHRASE_BONUS`] if it contains the
//! whole query as a contiguous substring.

use docsift_core::{Chunk, ScoredResult};
use regex::{Regex, RegexBuilder};

/// Tokens must have more than this many characters to count.
pub const MIN_TOKEN_LEN: usize = 2;

/// Flat bonus for a chunk containing the full query.
pub const PHRASE_BONUS: u64 = 10;

/// A query prepared for keyword scoring.
///
/// # Examples
///
/// ```
/// use docsift_retrieval::keyword::KeywordQuery;
///
/// let query = KeywordQuery::new("Solar Panels");
/// assert_eq!(query.tokens(), &["solar".to_string(), "panels".to_string()]);
/// assert_eq!(query.score("solar panels and more solar"), 2 + 1 + 10);
/// ```
#[derive(Debug, Clone)]
pub struct KeywordQuery {
    tokens: Vec<String>,
    patterns: Vec<Regex>,
    phrase: String,
}

impl KeywordQuery {
    /// Lowercase and tokenize `query`, dropping tokens of two characters or fewer.
    pub fn new(query: &str) -> Self {
        // Untrimmed: surrounding spaces are part of the phrase.
        let phrase = query.to_lowercase();
        let tokens: Vec<String> = phrase
            .split_whitespace()
            .filter(|token| token.chars().count() > MIN_TOKEN_LEN)
            .map(str::to_string)
            .collect();

        // Tokens are matched literally; `escape` keeps punctuation like "c++" valid.
        let patterns = tokens
            .iter()
            .filter_map(|token| {
                RegexBuilder::new(&regex::escape(token))
                    .case_insensitive(true)
                    .build()
                    .ok()
            })
            .collect();

        Self {
            tokens,
            patterns,
            phrase,
        }
    }

    /// Tokens that take part in scoring.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Score one piece of text.
    pub fn score(&self, text: &str) -> u64 {
        let hits: usize = self
            .patterns
            .iter()
            .map(|pattern| pattern.find_iter(text).count())
            .sum();

        let bonus = if !self.phrase.trim().is_empty() && text.to_lowercase().contains(&self.phrase) {
            PHRASE_BONUS
        } else {
            0
        };

        hits as u64 + bonus
    }
}

/// Rank `chunks` against `query` by keyword score, best first.
///
/// Ties keep document order. When nothing matches at all, the first `top_k`
/// chunks are returned in document order with score 0 so the caller still
/// gets some document context.
///
/// # Examples
///
/// ```
/// use docsift_core::Chunk;
/// use docsift_retrieval::keyword::keyword_rank;
///
/// let chunks: Vec<Chunk> = ["apples", "pears", "plums"]
///     .iter()
///     .enumerate()
///     .map(|(index, text)| Chunk { text: text.to_string(), embedding: None, index })
///     .collect();
///
/// let hits = keyword_rank("pears", &chunks, 1);
/// assert_eq!(hits[0].text, "pears");
///
/// let fallback = keyword_rank("zz", &chunks, 2);
/// assert_eq!(fallback.len(), 2);
/// assert_eq!(fallback[0].text, "apples");
/// ```
pub fn keyword_rank(query: &str, chunks: &[Chunk], top_k: usize) -> Vec<ScoredResult> {
    let query = KeywordQuery::new(query);

    let mut scored: Vec<(u64, &Chunk)> = chunks
        .iter()
        .map(|chunk| (query.score(&chunk.text), chunk))
        .collect();

    if scored.iter().any(|(score, _)| *score > 0) {
        // Stable, so equal scores stay in document order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
    }

    scored
        .into_iter()
        .take(top_k)
        .map(|(score, chunk)| ScoredResult {
            text: chunk.text.clone(),
            score: score as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                text: (*text).to_string(),
                embedding: None,
                index,
            })
            .collect()
    }

    #[test]
    fn short_tokens_are_ignored() {
        let query = KeywordQuery::new("an ox is big");
        assert_eq!(query.tokens(), &["big".to_string()]);
    }

    #[test]
    fn counts_every_occurrence_case_insensitively() {
        let query = KeywordQuery::new("energy");
        assert_eq!(query.score("Energy, ENERGY and energy"), 3 + PHRASE_BONUS);
    }

    #[test]
    fn phrase_match_ranks_first() {
        let index = chunks(&[
            "The water cycle moves water around the planet.",
            "Plants perform photosynthesis using light energy from the sun.",
            "Cells need energy. Light comes from many sources.",
        ]);

        let hits = keyword_rank("light energy", &index, 3);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, index[1].text);
        // one "light" + one "energy" + phrase bonus
        assert!(hits[0].score >= 12.0);
        assert_eq!(hits[1].text, index[2].text);
        assert_eq!(hits[1].score, 2.0);
    }

    #[test]
    fn zero_matches_fall_back_to_document_order() {
        let index = chunks(&["first", "second", "third", "fourth"]);
        let hits = keyword_rank("is it ok", &index, 3);
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn blank_query_matches_nothing() {
        let query = KeywordQuery::new("   \t ");
        assert!(query.tokens().is_empty());
        assert_eq!(query.score("any text at all"), 0);

        let hits = keyword_rank("   ", &chunks(&["a", "b"]), 5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "a");
    }

    #[test]
    fn phrase_keeps_surrounding_spaces() {
        let query = KeywordQuery::new(" Energy ");
        assert_eq!(query.tokens(), &["energy".to_string()]);
        assert_eq!(query.score("energy"), 1);
        assert_eq!(query.score("solar energy source"), 1 + PHRASE_BONUS);
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let query = KeywordQuery::new("c++ (draft)");
        assert_eq!(query.score("we use c++ here"), 1);
        assert_eq!(query.score("see the (draft) notes"), 1);
    }

    #[test]
    fn ties_keep_document_order() {
        let index = chunks(&["one match", "another match", "no hit"]);
        let hits = keyword_rank("match", &index, 2);
        assert_eq!(hits[0].text, "one match");
        assert_eq!(hits[1].text, "another match");
    }

    #[test]
    fn top_k_limits_results() {
        let index = chunks(&["alpha", "alpha", "alpha"]);
        assert_eq!(keyword_rank("alpha", &index, 2).len(), 2);
        assert!(keyword_rank("alpha", &index, 0).is_empty());
    }
}
