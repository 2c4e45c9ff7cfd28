//! Error types for retry operations.

use std::fmt;
use std::time::Duration;

use crate::context::CancelReason;

/// Terminal failure of a retried operation.
///
/// Exactly one of three things ends a retry loop without a value, and each
/// gets its own variant so callers can react differently:
///
/// - [`RetryError::Permanent`]: the operation failed with an error that is not
///   worth retrying. The error is returned untouched.
/// - [`RetryError::Exhausted`]: every permitted attempt failed transiently.
/// - [`RetryError::Cancelled`]: the context completed before the loop did.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use undertow::{retry, Context, RetryError, RetryPolicy};
///
/// # tokio_test::block_on(async {
/// let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5), 0.0)
///     .unwrap();
///
/// let result = retry(&Context::background(), policy, || async {
///     Err::<(), _>("connection reset by peer")
/// })
/// .await;
///
/// match result {
///     Err(RetryError::Exhausted(exhausted)) => {
///         assert_eq!(exhausted.attempts, 3);
///         assert_eq!(exhausted.last_error, "connection reset by peer");
///     }
///     other => panic!("expected exhaustion, got {:?}", other),
/// }
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The operation's own error, classified as not retryable.
    Permanent(E),
    /// All attempts failed transiently.
    Exhausted(RetryExhausted<E>),
    /// The context was cancelled or its deadline passed.
    Cancelled(CancelReason),
}

impl<E> RetryError<E> {
    /// Returns true if the operation failed permanently.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    /// Returns true if the retry budget ran out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }

    /// Returns true if the context stopped the loop.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The cancellation cause, if the loop was cancelled.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Self::Cancelled(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Number of attempts made, when known.
    ///
    /// Permanent failures and cancellation do not record a count.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Exhausted(exhausted) => Some(exhausted.attempts),
            _ => None,
        }
    }

    /// The operation's error, if the loop ended on one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Permanent(e) => Some(e),
            Self::Exhausted(exhausted) => Some(exhausted.last_error),
            Self::Cancelled(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent(e) => write!(f, "{}", e),
            Self::Exhausted(exhausted) => write!(f, "{}", exhausted),
            Self::Cancelled(reason) => write!(f, "{}", reason),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            // Display already forwards to the inner error; don't report it twice.
            Self::Permanent(e) => e.source(),
            Self::Exhausted(exhausted) => Some(exhausted),
            Self::Cancelled(reason) => Some(reason),
        }
    }
}

/// Returned when all retry attempts failed transiently.
///
/// Carries the error from the final attempt along with how many attempts
/// were made and how long the whole sequence took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// The error from the final attempt.
    pub last_error: E,
    /// Total number of attempts made.
    pub attempts: u32,
    /// Time from the first invocation until giving up.
    pub total_duration: Duration,
}

impl<E> RetryExhausted<E> {
    /// Create a new RetryExhausted error.
    pub fn new(last_error: E, attempts: u32, total_duration: Duration) -> Self {
        Self {
            last_error,
            attempts,
            total_duration,
        }
    }

    /// Extract the final error, discarding metadata.
    pub fn into_error(self) -> E {
        self.last_error
    }

    /// Get a reference to the final error.
    pub fn error(&self) -> &E {
        &self.last_error
    }
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gave up after {} attempts ({:?}): {}",
            self.attempts, self.total_duration, self.last_error
        )
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryExhausted<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.last_error)
    }
}

/// A [`RetryPolicy`](super::RetryPolicy) field was out of range.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// `max_attempts` was zero.
    ZeroAttempts,
    /// `base_delay` was zero.
    ZeroBaseDelay,
    /// `max_delay` was shorter than `base_delay`.
    MaxBelowBase {
        /// The configured base delay.
        base_delay: Duration,
        /// The configured cap.
        max_delay: Duration,
    },
    /// `jitter_fraction` was outside `[0, 1)` or not a number.
    JitterOutOfRange(f64),
    /// A delay loaded from configuration was negative, not a number or too
    /// large to represent.
    InvalidDelay(f64),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAttempts => write!(f, "max_attempts must be at least 1"),
            Self::ZeroBaseDelay => write!(f, "base_delay must be greater than zero"),
            Self::MaxBelowBase {
                base_delay,
                max_delay,
            } => write!(
                f,
                "max_delay ({:?}) must not be shorter than base_delay ({:?})",
                max_delay, base_delay
            ),
            Self::JitterOutOfRange(fraction) => write!(
                f,
                "jitter_fraction must be in [0, 1), got {}",
                fraction
            ),
            Self::InvalidDelay(millis) => write!(
                f,
                "delay must be a non-negative number of milliseconds, got {}",
                millis
            ),
        }
    }
}

impl std::error::Error for PolicyError {}

/// An HTTP response that came back with a non-success status.
///
/// HTTP clients can return this from a retried operation; the classifier
/// judges it by status code rather than by message text, so a 503 is
/// retried and a 404 fails fast.
///
/// ```rust
/// use undertow::{is_transient, StatusError};
///
/// assert!(is_transient(&StatusError::new(503)));
/// assert!(!is_transient(&StatusError::new(404)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    status: u16,
    context: Option<String>,
}

impl StatusError {
    /// Create an error for the given status code.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            context: None,
        }
    }

    /// Attach a short description of the request that failed.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{}: status code {}", context, self.status),
            None => write!(f, "status code {}", self.status),
        }
    }
}

impl std::error::Error for StatusError {}
