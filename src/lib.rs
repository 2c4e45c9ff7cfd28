//! # Undertow
//!
//! > *"What the wave drops, the undertow brings back"*
//!
//! A Rust library for retrying fallible async operations: exponential backoff
//! with jitter, transient/permanent failure classification, and cancellation.
//!
//! ## Philosophy
//!
//! - **Policies are data**: a [`RetryPolicy`] is validated once and never
//!   changes afterwards.
//! - **Fail fast on the unknown**: only failures that look like network
//!   hiccups are retried. Everything else is returned untouched after one
//!   attempt.
//! - **Three ways to stop**: a retry loop ends with a value, a permanent
//!   error, an exhausted budget or a cancelled [`Context`], and
//!   [`RetryError`] keeps the last three apart.
//!
//! ## Quick Example
//!
//! ```rust
//! use std::time::Duration;
//! use undertow::{retry_with_result, Context, RetryError, RetryPolicy, StatusError};
//!
//! async fn fetch_forecast() -> Result<String, StatusError> {
//!     Err(StatusError::new(503).with_context("weather API"))
//! }
//!
//! # tokio_test::block_on(async {
//! let ctx = Context::with_timeout(Duration::from_secs(10));
//! let policy = RetryPolicy::new(3, Duration::from_millis(5), Duration::from_millis(50), 0.25)
//!     .unwrap();
//!
//! match retry_with_result(&ctx, policy, fetch_forecast).await {
//!     Ok(forecast) => println!("{}", forecast),
//!     Err(RetryError::Exhausted(exhausted)) => {
//!         assert_eq!(exhausted.attempts, 3);
//!     }
//!     Err(other) => panic!("unexpected: {}", other),
//! }
//! # });
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod context;
pub mod retry;

// Re-exports
pub use context::{CancelReason, Context};
pub use retry::{
    is_transient, is_transient_status, retry, retry_if, retry_with_hooks, retry_with_result,
    retry_with_result_if, Classify, Outcome, PolicyError, RetryError, RetryEvent, RetryExhausted,
    RetryPolicy, RetryPolicyBuilder, StatusError,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{CancelReason, Context};
    pub use crate::retry::{
        retry, retry_if, retry_with_hooks, retry_with_result, retry_with_result_if, Classify,
        RetryError, RetryPolicy,
    };
}
