//! The retry loop.
//!
//! Every call shape funnels into one control flow:
//!
//! 1. stop with [`RetryError::Cancelled`] if the context is already done,
//! 2. invoke the operation once,
//! 3. return on success, or on a permanent failure (error untouched),
//! 4. after a transient failure, wait out the backoff delay while watching
//!    the context, unless that was the last permitted attempt,
//! 5. after `max_attempts` transient failures, return
//!    [`RetryError::Exhausted`].
//!
//! The operation is a factory of futures (`FnMut() -> Fut`), so every attempt
//! starts from scratch: a fresh request, a fresh connection.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use super::classify::Classify;
use super::error::{RetryError, RetryExhausted};
use super::policy::RetryPolicy;
use crate::context::{CancelReason, Context};

/// What a single attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// The operation returned a value.
    Success(T),
    /// The operation failed with an error worth retrying.
    TransientFailure(E),
    /// The operation failed with an error that retrying will not fix.
    PermanentFailure(E),
    /// The context completed before the operation could be invoked.
    Cancelled(CancelReason),
}

impl<T, E> Outcome<T, E> {
    /// Sort an operation's result using `is_transient` to split failures.
    pub fn from_result<P>(result: Result<T, E>, is_transient: P) -> Self
    where
        P: FnOnce(&E) -> bool,
    {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(error) if is_transient(&error) => Outcome::TransientFailure(error),
            Err(error) => Outcome::PermanentFailure(error),
        }
    }

    /// Returns true for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// Information about a failed attempt that is about to be retried, passed
/// to the hook of [`retry_with_hooks`].
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, E> {
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// The error from the failed attempt.
    pub error: &'a E,
    /// Delay before the next attempt.
    pub next_delay: Duration,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}

/// Retry an operation that produces no value.
///
/// Failures are classified through [`Classify`].
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::time::Duration;
/// use undertow::{retry, Context, RetryPolicy};
///
/// # tokio_test::block_on(async {
/// let counter = AtomicU32::new(0);
/// let calls = &counter;
/// let policy = RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(10), 0.0)
///     .unwrap();
///
/// let result = retry(&Context::background(), policy, move || async move {
///     if calls.fetch_add(1, Ordering::SeqCst) < 2 {
///         Err("i/o timeout")
///     } else {
///         Ok(())
///     }
/// })
/// .await;
///
/// assert!(result.is_ok());
/// assert_eq!(counter.load(Ordering::SeqCst), 3);
/// # });
/// ```
pub async fn retry<E, F, Fut>(
    ctx: &Context,
    policy: RetryPolicy,
    operation: F,
) -> Result<(), RetryError<E>>
where
    E: Classify,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    execute(ctx, policy, operation, E::is_transient, |_| {}).await
}

/// Retry an operation that produces a value of type `T`.
///
/// Failures are classified through [`Classify`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use undertow::{retry_with_result, Context, RetryError, RetryPolicy, StatusError};
///
/// # tokio_test::block_on(async {
/// let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10), 0.0)
///     .unwrap();
///
/// // 404 is permanent: one call, error returned as is.
/// let result: Result<String, _> = retry_with_result(&Context::background(), policy, || async {
///     Err(StatusError::new(404))
/// })
/// .await;
///
/// assert_eq!(result, Err(RetryError::Permanent(StatusError::new(404))));
/// # });
/// ```
pub async fn retry_with_result<T, E, F, Fut>(
    ctx: &Context,
    policy: RetryPolicy,
    operation: F,
) -> Result<T, RetryError<E>>
where
    E: Classify,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    execute(ctx, policy, operation, E::is_transient, |_| {}).await
}

/// Retry an operation that produces no value, retrying only when
/// `should_retry` returns true for the error.
pub async fn retry_if<E, F, Fut, P>(
    ctx: &Context,
    policy: RetryPolicy,
    operation: F,
    should_retry: P,
) -> Result<(), RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    P: Fn(&E) -> bool,
{
    execute(ctx, policy, operation, should_retry, |_| {}).await
}

/// Retry an operation that produces a value, retrying only when
/// `should_retry` returns true for the error.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use undertow::{retry_with_result_if, Context, RetryError, RetryPolicy};
///
/// #[derive(Debug, PartialEq)]
/// enum AppError { Busy, Invalid }
///
/// # tokio_test::block_on(async {
/// let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10), 0.0)
///     .unwrap();
///
/// let result: Result<u32, _> = retry_with_result_if(
///     &Context::background(),
///     policy,
///     || async { Err(AppError::Invalid) },
///     |err: &AppError| matches!(err, AppError::Busy),
/// )
/// .await;
///
/// assert_eq!(result, Err(RetryError::Permanent(AppError::Invalid)));
/// # });
/// ```
pub async fn retry_with_result_if<T, E, F, Fut, P>(
    ctx: &Context,
    policy: RetryPolicy,
    operation: F,
    should_retry: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    execute(ctx, policy, operation, should_retry, |_| {}).await
}

/// Retry with a hook that observes every failure about to be retried.
///
/// The hook runs after the delay is chosen and before the wait starts. It is
/// not called for the final failure, a permanent failure, or cancellation.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use undertow::{retry_with_hooks, Context, Classify, RetryPolicy};
///
/// # tokio_test::block_on(async {
/// let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10), 0.0)
///     .unwrap();
/// let mut seen = Vec::new();
///
/// let result: Result<(), _> = retry_with_hooks(
///     &Context::background(),
///     policy,
///     || async { Err("connection refused") },
///     |err: &&str| err.is_transient(),
///     |event| seen.push((event.attempt, event.next_delay)),
/// )
/// .await;
///
/// assert!(result.unwrap_err().is_exhausted());
/// assert_eq!(
///     seen,
///     vec![(1, Duration::from_millis(1)), (2, Duration::from_millis(2))]
/// );
/// # });
/// ```
pub async fn retry_with_hooks<T, E, F, Fut, P, H>(
    ctx: &Context,
    policy: RetryPolicy,
    operation: F,
    should_retry: P,
    on_retry: H,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    H: FnMut(&RetryEvent<'_, E>),
{
    execute(ctx, policy, operation, should_retry, on_retry).await
}

async fn execute<T, E, F, Fut, P, H>(
    ctx: &Context,
    policy: RetryPolicy,
    mut operation: F,
    should_retry: P,
    mut on_retry: H,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    H: FnMut(&RetryEvent<'_, E>),
{
    let start = Instant::now();
    let max_attempts = policy.max_attempts();
    let mut attempt = 0u32;

    loop {
        let outcome = match ctx.cause() {
            Some(reason) => Outcome::Cancelled(reason),
            None => Outcome::from_result(operation().await, &should_retry),
        };

        match outcome {
            Outcome::Success(value) => return Ok(value),
            Outcome::PermanentFailure(error) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt = attempt + 1, "permanent failure, not retrying");
                return Err(RetryError::Permanent(error));
            }
            Outcome::Cancelled(reason) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(attempt, %reason, "cancelled before attempt");
                return Err(RetryError::Cancelled(reason));
            }
            Outcome::TransientFailure(error) => {
                let attempts = attempt + 1;
                if attempts >= max_attempts {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(attempts, "retry budget exhausted");
                    return Err(RetryError::Exhausted(RetryExhausted::new(
                        error,
                        attempts,
                        start.elapsed(),
                    )));
                }

                let delay = policy.delay_for(attempt);
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    attempt = attempts,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "transient failure, retrying"
                );
                on_retry(&RetryEvent {
                    attempt: attempts,
                    error: &error,
                    next_delay: delay,
                    elapsed: start.elapsed(),
                });

                if let Some(reason) = wait(ctx, delay).await {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt = attempts, %reason, "cancelled during backoff");
                    return Err(RetryError::Cancelled(reason));
                }
                attempt = attempts;
            }
        }
    }
}

/// Sleep for `delay` unless the context completes first.
async fn wait(ctx: &Context, delay: Duration) -> Option<CancelReason> {
    tokio::select! {
        biased;
        reason = ctx.done() => Some(reason),
        _ = tokio::time::sleep(delay) => None,
    }
}
