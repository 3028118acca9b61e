//! Cancellation context shared between the caller and a supervised run

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Why a context ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// The caller cancelled the context explicitly
    Cancelled,
    /// An externally scheduled deadline elapsed
    DeadlineExceeded,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Cancelled => write!(f, "context cancelled"),
            CancelCause::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

/// Read-only cancellation capability observed by a supervised run.
///
/// The "done" notification fires at most once and stays fired; the cause is
/// meaningful once it has. Implemented by [`CancelContext`]; test code can
/// substitute its own implementation.
#[async_trait]
pub trait Cancellation: Send + Sync {
    /// Resolves once the context is cancelled. Permanent: later calls resolve
    /// immediately.
    async fn done(&self);

    /// The recorded cancellation cause.
    fn cause(&self) -> CancelCause;
}

/// Cancellable context backed by a [`CancellationToken`].
///
/// Clones share state, so one handle can be held by the caller (to cancel)
/// while another is observed by a supervised run. Cancellation is idempotent
/// and the first recorded cause wins.
#[derive(Debug, Clone, Default)]
pub struct CancelContext {
    token: CancellationToken,
    cause: Arc<OnceLock<CancelCause>>,
}

impl CancelContext {
    /// Create a new, not-yet-cancelled context
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the context with the given cause.
    ///
    /// Safe to call more than once; only the first cause is kept.
    pub fn cancel(&self, cause: CancelCause) {
        let _ = self.cause.set(cause);
        self.token.cancel();
    }

    /// Whether the context has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// The recorded cancellation cause
    pub fn cause(&self) -> CancelCause {
        self.cause.get().copied().unwrap_or(CancelCause::Cancelled)
    }
}

#[async_trait]
impl Cancellation for CancelContext {
    async fn done(&self) {
        self.cancelled().await
    }

    fn cause(&self) -> CancelCause {
        CancelContext::cause(self)
    }
}
