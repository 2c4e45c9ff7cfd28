//! Retry execution: classify, back off, try again.
//!
//! The pieces, leaves first:
//!
//! - **Classifier** ([`is_transient`], [`is_transient_status`], [`Classify`]):
//!   decides whether a failure is worth another attempt.
//! - **Backoff** ([`RetryPolicy::delay_for`]): exponential delay, capped,
//!   with symmetric jitter.
//! - **Executor** ([`retry`], [`retry_with_result`] and the `_if` / `_hooks`
//!   variants): runs the loop, honouring a [`Context`](crate::Context).
//!
//! # Quick Start
//!
//! ```rust
//! use undertow::{retry_with_result, Context, RetryPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let policy = RetryPolicy::builder()
//!     .max_attempts(3)
//!     .base_delay(Duration::from_millis(10))
//!     .build()
//!     .unwrap();
//!
//! let value = retry_with_result(&Context::background(), policy, || async {
//!     Ok::<_, std::io::Error>(42)
//! })
//! .await
//! .unwrap();
//!
//! assert_eq!(value, 42);
//! # });
//! ```
//!
//! # Error Types
//!
//! - [`RetryError`]: terminal failure, one of permanent, exhausted or cancelled
//! - [`RetryExhausted`]: the last error plus attempt count, when the budget runs out
//! - [`PolicyError`]: an out-of-range policy value
//! - [`StatusError`]: a non-success HTTP status, classified by code

mod backoff;
mod classify;
mod error;
mod executor;
mod policy;

pub use backoff::apply_jitter;
pub use classify::{
    is_transient, is_transient_status, matches_transient_pattern, Classify, TRANSIENT_PATTERNS,
    TRANSIENT_STATUS_CODES,
};
pub use error::{PolicyError, RetryError, RetryExhausted, StatusError};
pub use executor::{
    retry, retry_if, retry_with_hooks, retry_with_result, retry_with_result_if, Outcome,
    RetryEvent,
};
pub use policy::{RetryPolicy, RetryPolicyBuilder};

#[cfg(test)]
mod tests;
