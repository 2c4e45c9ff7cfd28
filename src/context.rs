//! Cancellable execution contexts
//!
//! A [`Context`] tells a retry loop when to stop waiting. It completes either
//! because someone called [`Context::cancel`] or because its deadline passed,
//! and it remembers which of the two happened as a [`CancelReason`].
//!
//! Contexts are cheap to clone; clones share the same cancellation state.
//!
//! # Examples
//!
//! ```
//! use undertow::{CancelReason, Context};
//!
//! let ctx = Context::background();
//! assert!(!ctx.is_done());
//!
//! ctx.cancel();
//! assert_eq!(ctx.cause(), Some(CancelReason::Cancelled));
//! ```
//!
//! ## Deadlines
//!
//! ```
//! use std::time::Duration;
//! use undertow::{CancelReason, Context};
//!
//! # tokio_test::block_on(async {
//! let ctx = Context::with_timeout(Duration::from_millis(5));
//! assert_eq!(ctx.done().await, CancelReason::DeadlineExceeded);
//! # });
//! ```

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`Context`] completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// [`Context::cancel`] was called on this context or an ancestor.
    Cancelled,
    /// The context's deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "context cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

impl std::error::Error for CancelReason {}

/// A cancellation signal with an optional deadline.
///
/// When a context is both cancelled and expired, [`Context::cause`] reports
/// [`CancelReason::Cancelled`].
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context with no deadline that only completes when cancelled.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child context.
    ///
    /// The child completes when the parent does, but cancelling the child
    /// leaves the parent untouched.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derive a child context that additionally expires after `timeout`.
    ///
    /// The effective deadline is the earlier of the parent's and the new one.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let own = Instant::now() + timeout;
        Self {
            token: self.token.child_token(),
            deadline: Some(match self.deadline {
                Some(parent) => parent.min(own),
                None => own,
            }),
        }
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context has completed, or `None` while it is still live.
    pub fn cause(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Returns true once the context is cancelled or expired.
    pub fn is_done(&self) -> bool {
        self.cause().is_some()
    }

    /// Wait until the context completes and report why.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
