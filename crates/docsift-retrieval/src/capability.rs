//! Lazy, once-only initialization of an embedding backend.
//!
//! [`LazyEmbedder`] moves through `Uninitialized -> Initializing -> Ready`
//! (or `Failed`). While initializing, every caller awaits the same shared
//! future, so the backend sees exactly one setup attempt no matter how many
//! callers race. A failure is sticky until [`LazyEmbedder::reset`].

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use docsift_core::{DocsiftError, EmbeddingConfig};
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::embedding::EmbeddingBackend;

/// Default bound on backend setup.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

type InitFuture = Shared<BoxFuture<'static, Result<(), String>>>;

enum State {
    Uninitialized,
    Initializing { epoch: u64, future: InitFuture },
    Ready,
    Failed(String),
}

/// Observable lifecycle of a [`LazyEmbedder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityState {
    /// Setup has not been attempted.
    Uninitialized,
    /// Setup is in flight.
    Initializing,
    /// Setup succeeded; `embed` calls go straight to the backend.
    Ready,
    /// Setup failed; calls fail fast until reset.
    Failed,
}

/// Reference-counted wrapper that initializes an [`EmbeddingBackend`] on first use.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use docsift_retrieval::capability::LazyEmbedder;
/// use docsift_retrieval::embedding::HttpEmbedder;
///
/// # async fn example() {
/// let backend = Arc::new(HttpEmbedder::new(Some("key".into()), "text-embedding-3-small"));
/// let embedder = LazyEmbedder::new(backend);
/// let vector = embedder.embed("what is osmosis?").await.unwrap();
/// assert!(embedder.is_ready());
/// # }
/// ```
pub struct LazyEmbedder {
    backend: Arc<dyn EmbeddingBackend>,
    state: Mutex<State>,
    init_timeout: Duration,
    next_epoch: AtomicU64,
    attempts: AtomicUsize,
}

impl std::fmt::Debug for LazyEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyEmbedder")
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .field("init_timeout", &self.init_timeout)
            .finish_non_exhaustive()
    }
}

impl LazyEmbedder {
    /// Wrap `backend` with the default 30 second setup bound.
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self::with_timeout(backend, DEFAULT_INIT_TIMEOUT)
    }

    /// Wrap `backend` with a custom setup bound.
    pub fn with_timeout(backend: Arc<dyn EmbeddingBackend>, init_timeout: Duration) -> Self {
        Self {
            backend,
            state: Mutex::new(State::Uninitialized),
            init_timeout,
            next_epoch: AtomicU64::new(0),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Wrap `backend` using `init_timeout_secs` from `config`.
    pub fn with_config(backend: Arc<dyn EmbeddingBackend>, config: &EmbeddingConfig) -> Self {
        Self::with_timeout(backend, Duration::from_secs(config.init_timeout_secs))
    }

    /// Name of the wrapped backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CapabilityState {
        match &*self.lock_state() {
            State::Uninitialized => CapabilityState::Uninitialized,
            State::Initializing { .. } => CapabilityState::Initializing,
            State::Ready => CapabilityState::Ready,
            State::Failed(_) => CapabilityState::Failed,
        }
    }

    /// Whether setup has completed successfully.
    pub fn is_ready(&self) -> bool {
        self.state() == CapabilityState::Ready
    }

    /// Number of setup attempts issued to the backend so far.
    pub fn init_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Run backend setup once, or join the setup already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::CapabilityUnavailable`] if setup fails, times
    /// out, or failed earlier and has not been reset.
    pub async fn initialize(&self) -> Result<(), DocsiftError> {
        let (epoch, future) = {
            let mut state = self.lock_state();
            match &*state {
                State::Ready => return Ok(()),
                State::Failed(reason) => {
                    return Err(DocsiftError::CapabilityUnavailable(reason.clone()))
                }
                State::Initializing { epoch, future } => (*epoch, future.clone()),
                State::Uninitialized => {
                    let epoch = self.next_epoch.fetch_add(1, Ordering::SeqCst);
                    let future = self.start_setup();
                    *state = State::Initializing {
                        epoch,
                        future: future.clone(),
                    };
                    (epoch, future)
                }
            }
        };

        let outcome = future.await;

        {
            let mut state = self.lock_state();
            let current = matches!(&*state, State::Initializing { epoch: e, .. } if *e == epoch);
            if current {
                *state = match &outcome {
                    Ok(()) => {
                        tracing::info!(backend = self.backend.name(), "embedding capability ready");
                        State::Ready
                    }
                    Err(reason) => {
                        tracing::warn!(backend = self.backend.name(), %reason, "embedding capability unavailable");
                        State::Failed(reason.clone())
                    }
                };
            }
        }

        outcome.map_err(DocsiftError::CapabilityUnavailable)
    }

    /// Embed `text`, initializing the backend first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DocsiftError::CapabilityUnavailable`] if setup fails, or the
    /// backend's [`DocsiftError::Embedding`] if this call fails.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, DocsiftError> {
        self.initialize().await?;
        self.backend.embed(text).await
    }

    /// Forget a completed or failed setup so the next call tries again.
    ///
    /// A setup already in flight keeps running for its current waiters but
    /// no longer updates the state.
    pub fn reset(&self) {
        *self.lock_state() = State::Uninitialized;
    }

    fn start_setup(&self) -> InitFuture {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let backend = Arc::clone(&self.backend);
        let limit = self.init_timeout;

        async move {
            match tokio::time::timeout(limit, backend.initialize()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(DocsiftError::CapabilityUnavailable(reason))) => Err(reason),
                Ok(Err(other)) => Err(other.to_string()),
                Err(_) => Err(format!(
                    "initialization timed out after {}ms",
                    limit.as_millis()
                )),
            }
        }
        .boxed()
        .shared()
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
