use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use docsift_core::{DocsiftError, IndexMode, RetrievalConfig};
use docsift_retrieval::chunker::chunk_spans;
use docsift_retrieval::similarity::cosine_similarity;
use docsift_retrieval::{
    ChannelObserver, EmbeddingBackend, IndexEvent, LazyEmbedder, NoopObserver, Retriever,
};

/// Bag-of-letters embedding: stable, cheap, and good enough to rank.
struct LetterBackend {
    online: AtomicBool,
}

impl LetterBackend {
    fn online() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(true),
        })
    }

    fn offline() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for LetterBackend {
    fn name(&self) -> &str {
        "letters"
    }

    async fn initialize(&self) -> Result<(), DocsiftError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DocsiftError::CapabilityUnavailable("no model".into()))
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DocsiftError> {
        let mut v = vec![0.0f32; 26];
        for b in text.bytes().filter(u8::is_ascii_alphabetic) {
            v[usize::from(b.to_ascii_lowercase() - b'a')] += 1.0;
        }
        Ok(v)
    }
}

fn retriever(backend: Arc<LetterBackend>, chunk_size: usize) -> Retriever {
    let config = RetrievalConfig {
        chunk_size,
        overlap: 0,
        top_k: 3,
        batch_size: 5,
    };
    Retriever::new(Arc::new(LazyEmbedder::new(backend)), Arc::new(NoopObserver), config).unwrap()
}

/// Three 40-char chunks; only the second holds "solar panels" as a phrase.
fn three_chunk_document() -> String {
    [
        "Wind turbines spin in coastal regions.",
        "Solar panels convert light; panels age.",
        "Panels of judges rate solar art shows.",
    ]
    .iter()
    .map(|s| format!("{s:<40}"))
    .collect()
}

#[test]
fn chunk_layout_matches_window_arithmetic() {
    let text = "a".repeat(5000);
    let spans = chunk_spans(&text, 2000, 400).unwrap();
    let starts: Vec<usize> = spans.iter().map(|s| s.start).collect();
    let lens: Vec<usize> = spans.iter().map(|s| s.len()).collect();
    assert_eq!(starts, vec![0, 1600, 3200, 4800]);
    assert_eq!(lens, vec![2000, 2000, 1800, 200]);
}

#[test]
fn cosine_is_symmetric_and_checks_dimensions() {
    let a = [0.3, -1.2, 4.0];
    let b = [2.0, 0.5, -0.7];
    assert_eq!(cosine_similarity(&a, &b).unwrap(), cosine_similarity(&b, &a).unwrap());
    assert!(matches!(
        cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]),
        Err(DocsiftError::DimensionMismatch { left: 2, right: 3 })
    ));
}

#[tokio::test]
async fn never_indexed_search_is_empty_index() {
    let retriever = retriever(LetterBackend::online(), 100);
    let err = retriever.search("anything", 3).await.unwrap_err();
    assert!(matches!(err, DocsiftError::EmptyIndex));
}

#[tokio::test]
async fn semantic_search_caps_results_at_chunk_count() {
    let retriever = retriever(LetterBackend::online(), 40);
    let text = format!("{:<40}{:<40}", "Alpha beta gamma.", "Delta epsilon zeta.");
    assert_eq!(retriever.index_document(&text).await.unwrap(), 2);
    assert_eq!(retriever.mode(), IndexMode::Semantic);

    let hits = retriever.search("gamma", 3).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn keyword_mode_puts_phrase_chunk_first() {
    let retriever = retriever(LetterBackend::offline(), 40);
    assert_eq!(retriever.index_document(&three_chunk_document()).await.unwrap(), 3);
    assert_eq!(retriever.mode(), IndexMode::Keyword);

    let hits = retriever.search("solar panels", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].text, "Solar panels convert light; panels age.");
    // one "solar", two "panels", plus the phrase bonus
    assert_eq!(hits[0].score, 13.0);
    assert_eq!(hits[1].score, 2.0);
}

#[tokio::test]
async fn zero_match_query_returns_first_chunks_in_order() {
    let retriever = retriever(LetterBackend::offline(), 40);
    retriever.index_document(&three_chunk_document()).await.unwrap();

    let hits = retriever.search("is it ok", 2).await.unwrap();
    let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "Wind turbines spin in coastal regions.",
            "Solar panels convert light; panels age.",
        ]
    );
    assert!(hits.iter().all(|h| h.score == 0.0));
}

#[tokio::test]
async fn indexing_twice_gives_identical_chunks() {
    let retriever = retriever(LetterBackend::online(), 40);
    let text = three_chunk_document();

    retriever.index_document(&text).await.unwrap();
    let first = retriever.chunk_texts();
    retriever.index_document(&text).await.unwrap();
    let second = retriever.chunk_texts();
    retriever.clear();
    retriever.index_document(&text).await.unwrap();
    let third = retriever.chunk_texts();

    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[tokio::test]
async fn channel_subscriber_sees_ordered_lifecycle() {
    let (observer, mut rx) = ChannelObserver::channel(64);
    let config = RetrievalConfig {
        chunk_size: 40,
        overlap: 0,
        ..RetrievalConfig::default()
    };
    let retriever = Retriever::new(
        Arc::new(LazyEmbedder::new(LetterBackend::online())),
        Arc::new(observer),
        config,
    )
    .unwrap();

    retriever.index_document(&three_chunk_document()).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            IndexEvent::StatusUpdate {
                message: "Chunking text...".into()
            },
            IndexEvent::ChunkingComplete { chunk_count: 3 },
            IndexEvent::StatusUpdate {
                message: "Embedding batch 1/1 (1-3/3)".into()
            },
            IndexEvent::Progress { indexed: 3, total: 3 },
            IndexEvent::StatusUpdate {
                message: "Indexed 3 chunks".into()
            },
            IndexEvent::IndexingComplete { final_count: 3 },
        ]
    );
}
