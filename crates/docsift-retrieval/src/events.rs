//! Status and progress notifications emitted while indexing.
//!
//! Consumers either implement [`IndexObserver`] directly or subscribe to a
//! bounded channel through [`ChannelObserver`]. Notifications are
//! fire-and-forget: a panicking observer is logged and ignored, and a full
//! channel drops the event rather than stalling the indexer.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

/// Callbacks invoked by the index builder. All methods default to no-ops.
pub trait IndexObserver: Send + Sync {
    /// Free-form status text for display. An empty message clears the status.
    fn on_status_update(&self, _message: &str) {}

    /// The document was split into `chunk_count` chunks.
    fn on_chunking_complete(&self, _chunk_count: usize) {}

    /// `indexed` of `total` chunks have been embedded and kept so far.
    fn on_progress(&self, _indexed: usize, _total: usize) {}

    /// Indexing finished with `final_count` chunks in the index.
    fn on_indexing_complete(&self, _final_count: usize) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl IndexObserver for NoopObserver {}

/// One notification, as delivered through a channel.
///
/// # Examples
///
/// ```
/// use docsift_retrieval::events::IndexEvent;
///
/// let event = IndexEvent::Progress { indexed: 5, total: 12 };
/// let json = serde_json::to_value(&event).unwrap();
/// assert_eq!(json["event"], "progress");
/// assert_eq!(json["total"], 12);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum IndexEvent {
    /// See [`IndexObserver::on_status_update`].
    StatusUpdate {
        /// Status text.
        message: String,
    },
    /// See [`IndexObserver::on_chunking_complete`].
    #[serde(rename_all = "camelCase")]
    ChunkingComplete {
        /// Number of chunks produced.
        chunk_count: usize,
    },
    /// See [`IndexObserver::on_progress`].
    Progress {
        /// Chunks kept so far.
        indexed: usize,
        /// Chunks produced by the chunker.
        total: usize,
    },
    /// See [`IndexObserver::on_indexing_complete`].
    #[serde(rename_all = "camelCase")]
    IndexingComplete {
        /// Chunks in the finished index.
        final_count: usize,
    },
}

impl IndexEvent {
    /// Invoke the matching callback on `observer`.
    pub fn dispatch(&self, observer: &dyn IndexObserver) {
        match self {
            IndexEvent::StatusUpdate { message } => observer.on_status_update(message),
            IndexEvent::ChunkingComplete { chunk_count } => {
                observer.on_chunking_complete(*chunk_count);
            }
            IndexEvent::Progress { indexed, total } => observer.on_progress(*indexed, *total),
            IndexEvent::IndexingComplete { final_count } => {
                observer.on_indexing_complete(*final_count);
            }
        }
    }
}

/// Forwards notifications into a bounded channel.
///
/// # Examples
///
/// ```
/// use docsift_retrieval::events::{ChannelObserver, IndexEvent, IndexObserver};
///
/// let (observer, mut rx) = ChannelObserver::channel(8);
/// observer.on_chunking_complete(4);
/// assert_eq!(rx.try_recv().unwrap(), IndexEvent::ChunkingComplete { chunk_count: 4 });
/// ```
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::Sender<IndexEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<IndexEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    fn send(&self, event: IndexEvent) {
        if let Err(e) = self.sender.try_send(event) {
            tracing::warn!("dropping index event: {e}");
        }
    }
}

impl IndexObserver for ChannelObserver {
    fn on_status_update(&self, message: &str) {
        self.send(IndexEvent::StatusUpdate {
            message: message.to_string(),
        });
    }

    fn on_chunking_complete(&self, chunk_count: usize) {
        self.send(IndexEvent::ChunkingComplete { chunk_count });
    }

    fn on_progress(&self, indexed: usize, total: usize) {
        self.send(IndexEvent::Progress { indexed, total });
    }

    fn on_indexing_complete(&self, final_count: usize) {
        self.send(IndexEvent::IndexingComplete { final_count });
    }
}

/// Delivers events to an observer, containing any panic it raises.
#[derive(Clone)]
pub(crate) struct Notifier {
    observer: Arc<dyn IndexObserver>,
}

impl Notifier {
    pub(crate) fn new(observer: Arc<dyn IndexObserver>) -> Self {
        Self { observer }
    }

    pub(crate) fn emit(&self, event: IndexEvent) {
        let observer = self.observer.as_ref();
        if catch_unwind(AssertUnwindSafe(|| event.dispatch(observer))).is_err() {
            tracing::warn!(?event, "index observer panicked; notification skipped");
        }
    }

    pub(crate) fn status(&self, message: impl Into<String>) {
        self.emit(IndexEvent::StatusUpdate {
            message: message.into(),
        });
    }
}
