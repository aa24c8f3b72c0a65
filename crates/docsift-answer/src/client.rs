use std::time::Duration;

use docsift_core::{AnswerConfig, DocsiftError, ScoredResult};
use serde::Serialize;

use crate::summary::SUMMARY_QUESTION;

/// Reply text the answer server uses when the model produced nothing.
const NO_RESPONSE: &str = "No response";

/// Body posted to the answer endpoint.
///
/// # Examples
///
/// ```
/// use docsift_answer::client::AnswerRequest;
/// use docsift_core::ScoredResult;
///
/// let hits = vec![ScoredResult { text: "Cells divide by mitosis.".into(), score: 0.92 }];
/// let request = AnswerRequest::new("How do cells divide?", &hits, "confused", 600);
/// let json = serde_json::to_value(&request).unwrap();
/// assert_eq!(json["topChunks"][0], "Cells divide by mitosis.");
/// assert_eq!(json["emotion"], "confused");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRequest {
    /// The user's question.
    pub question: String,
    /// Supporting context, best match first. Scores are not sent.
    #[serde(rename = "topChunks")]
    pub top_chunks: Vec<String>,
    /// Mood label used to adjust the answer's tone.
    pub emotion: String,
    /// Generation budget.
    pub max_tokens: u32,
}

impl AnswerRequest {
    /// Build a request from ranked search results.
    pub fn new(question: &str, context: &[ScoredResult], mood: &str, max_tokens: u32) -> Self {
        Self {
            question: question.to_string(),
            top_chunks: context.iter().map(|r| r.text.clone()).collect(),
            emotion: mood.to_string(),
            max_tokens,
        }
    }
}

/// Client for the external answer endpoint.
///
/// # Examples
///
/// ```
/// use docsift_core::AnswerConfig;
/// use docsift_answer::client::AnswerClient;
///
/// let client = AnswerClient::new(&AnswerConfig::default()).unwrap();
/// assert_eq!(client.url(), "http://localhost:3000/api/answer");
/// ```
#[derive(Debug)]
pub struct AnswerClient {
    client: reqwest::Client,
    config: AnswerConfig,
}

impl AnswerClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Answer`] if the HTTP client cannot be built.
    pub fn new(config: &AnswerConfig) -> Result<Self, DocsiftError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocsiftError::Answer(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Full URL requests are posted to.
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.endpoint.trim_start_matches('/')
        )
    }

    /// Ask `question` with `context` as supporting material.
    ///
    /// `mood` falls back to the configured default when `None`; the token
    /// budget always comes from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::Answer`] on HTTP errors, unparseable
    /// responses, or an empty answer.
    pub async fn ask(
        &self,
        question: &str,
        context: &[ScoredResult],
        mood: Option<&str>,
    ) -> Result<String, DocsiftError> {
        let mood = mood.unwrap_or(&self.config.mood);
        let request = AnswerRequest::new(question, context, mood, self.config.max_tokens);
        self.send(&request).await
    }

    /// Ask for a summary of `document`, sent as the only context chunk.
    ///
    /// Callers should fit `document` to the model first, see
    /// [`crate::summary::prepare_document`].
    ///
    /// # Errors
    ///
    /// Same as [`AnswerClient::ask`].
    pub async fn summarize(&self, document: &str, mood: Option<&str>) -> Result<String, DocsiftError> {
        let request = AnswerRequest {
            question: SUMMARY_QUESTION.to_string(),
            top_chunks: vec![document.to_string()],
            emotion: mood.unwrap_or(&self.config.mood).to_string(),
            max_tokens: self.config.max_tokens,
        };
        self.send(&request).await
    }

    /// Post a prepared request.
    ///
    /// # Errors
    ///
    /// Same as [`AnswerClient::ask`].
    pub async fn send(&self, request: &AnswerRequest) -> Result<String, DocsiftError> {
        let url = self.url();
        tracing::debug!(%url, chunks = request.top_chunks.len(), "requesting answer");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| DocsiftError::Answer(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(DocsiftError::Answer(format!(
                "answer API error {status}: {body_text}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DocsiftError::Answer(format!("failed to parse response: {e}")))?;

        extract_answer(&body)
    }
}

/// Pull `choices[0].message.content` out of a response body.
fn extract_answer(body: &serde_json::Value) -> Result<String, DocsiftError> {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| DocsiftError::Answer(format!("unexpected response structure: {body}")))?;

    let content = content.trim();
    if content.is_empty() || content == NO_RESPONSE {
        return Err(DocsiftError::Answer("no valid response from the answer API".into()));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + length {
                        break;
                    }
                }
            }
            let reply = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    fn config(base_url: String) -> AnswerConfig {
        AnswerConfig {
            base_url,
            timeout_secs: 5,
            ..AnswerConfig::default()
        }
    }

    fn hits() -> Vec<ScoredResult> {
        vec![
            ScoredResult {
                text: "Photosynthesis happens in chloroplasts.".into(),
                score: 13.0,
            },
            ScoredResult {
                text: "Leaves are green.".into(),
                score: 1.0,
            },
        ]
    }

    #[test]
    fn request_strips_scores() {
        let request = AnswerRequest::new("where?", &hits(), "happy", 300);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "question": "where?",
                "topChunks": ["Photosynthesis happens in chloroplasts.", "Leaves are green."],
                "emotion": "happy",
                "max_tokens": 300,
            })
        );
    }

    #[test]
    fn url_joins_base_and_endpoint() {
        let client = AnswerClient::new(&config("http://tutor.local:3000/".into())).unwrap();
        assert_eq!(client.url(), "http://tutor.local:3000/api/answer");
    }

    #[test]
    fn extract_answer_reads_first_choice() {
        let body = serde_json::json!({"choices": [{"message": {"content": " Chloroplasts. "}}]});
        assert_eq!(extract_answer(&body).unwrap(), "Chloroplasts.");
    }

    #[test]
    fn extract_answer_rejects_placeholders() {
        for content in ["", "No response"] {
            let body = serde_json::json!({"choices": [{"message": {"content": content}}]});
            assert!(matches!(extract_answer(&body), Err(DocsiftError::Answer(_))));
        }
        let err = extract_answer(&serde_json::json!({"error": "x"})).unwrap_err();
        assert!(err.to_string().contains("unexpected response structure"));
    }

    #[tokio::test]
    async fn ask_posts_context_and_returns_content() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"content":"In the chloroplasts."}}]}"#,
        )
        .await;
        let client = AnswerClient::new(&config(base)).unwrap();

        let answer = client.ask("Where does photosynthesis happen?", &hits(), None).await.unwrap();
        assert_eq!(answer, "In the chloroplasts.");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/answer"));
        assert!(raw.contains(r#""emotion":"neutral""#));
        assert!(raw.contains(r#""max_tokens":600"#));
        assert!(!raw.contains("13.0"));
    }

    #[tokio::test]
    async fn summarize_sends_document_as_single_chunk() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"content":"A short summary."}}]}"#,
        )
        .await;
        let client = AnswerClient::new(&config(base)).unwrap();

        let summary = client.summarize("Chapter one.\n\nChapter two.", Some("happy")).await.unwrap();
        assert_eq!(summary, "A short summary.");

        let raw = server.await.unwrap();
        let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["question"], SUMMARY_QUESTION);
        assert_eq!(json["topChunks"], serde_json::json!(["Chapter one.\n\nChapter two."]));
        assert_eq!(json["emotion"], "happy");
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let (base, server) = serve_once("500 Internal Server Error", r#"{"error":"Groq API error"}"#).await;
        let client = AnswerClient::new(&config(base)).unwrap();

        let err = client.ask("q", &[], Some("sad")).await.unwrap_err();
        assert!(matches!(err, DocsiftError::Answer(_)));
        assert!(err.to_string().contains("500"), "{err}");
        server.await.unwrap();
    }
}
