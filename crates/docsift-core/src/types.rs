use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A contiguous, trimmed window of the source document.
///
/// `index` is the ordinal the chunker assigned; it reflects document position
/// and is kept even when neighbouring chunks are dropped.
///
/// # Examples
///
/// ```
/// use docsift_core::Chunk;
///
/// let chunk = Chunk {
///     text: "Photosynthesis converts light into chemical energy.".into(),
///     embedding: None,
///     index: 0,
/// };
/// assert!(!chunk.has_embedding());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Trimmed chunk text.
    pub text: String,
    /// Embedding vector, absent in keyword mode.
    pub embedding: Option<Vec<f32>>,
    /// Ordinal position assigned by the chunker.
    pub index: usize,
}

impl Chunk {
    /// Whether this chunk carries an embedding.
    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// A ranked search hit handed to the answer stage.
///
/// In semantic mode `score` is a cosine similarity; in keyword mode it is a
/// whole-number match count plus phrase bonus. Scores from the two modes
/// are not comparable.
///
/// # Examples
///
/// ```
/// use docsift_core::ScoredResult;
///
/// let hit = ScoredResult { text: "chunk text".into(), score: 0.82 };
/// let json = serde_json::to_value(&hit).unwrap();
/// assert_eq!(json["text"], "chunk text");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    /// Chunk text.
    pub text: String,
    /// Relevance score.
    pub score: f64,
}

/// How an index was built, and therefore how it is searched.
///
/// # Examples
///
/// ```
/// use docsift_core::IndexMode;
///
/// assert_eq!(IndexMode::Keyword.to_string(), "keyword");
/// assert_eq!(IndexMode::default(), IndexMode::Empty);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Nothing indexed.
    #[default]
    Empty,
    /// Every chunk carries an embedding of the same dimensionality.
    Semantic,
    /// No chunk carries an embedding.
    Keyword,
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexMode::Empty => write!(f, "empty"),
            IndexMode::Semantic => write!(f, "semantic"),
            IndexMode::Keyword => write!(f, "keyword"),
        }
    }
}

/// Output format for CLI results.
///
/// # Examples
///
/// ```
/// use docsift_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn chunk_serializes_camel_case_with_null_embedding() {
        let chunk = Chunk {
            text: "hello".into(),
            embedding: None,
            index: 2,
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert_eq!(json["index"], 2);
        assert!(json["embedding"].is_null());
    }

    #[test]
    fn index_mode_display() {
        assert_eq!(IndexMode::Empty.to_string(), "empty");
        assert_eq!(IndexMode::Semantic.to_string(), "semantic");
        assert_eq!(IndexMode::Keyword.to_string(), "keyword");
    }

    #[test]
    fn scored_result_round_trips_through_json() {
        let hit = ScoredResult {
            text: "a".into(),
            score: 12.0,
        };
        let back: ScoredResult =
            serde_json::from_str(&serde_json::to_string(&hit).unwrap()).unwrap();
        assert_eq!(back, hit);
    }
}
