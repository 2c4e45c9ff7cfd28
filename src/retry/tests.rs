//! Executor flow tests.

use super::*;
use crate::context::{CancelReason, Context};
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_secs(1),
        Duration::from_secs(30),
        0.0,
    )
    .unwrap()
}

fn reset() -> io::Error {
    io::Error::from(io::ErrorKind::ConnectionReset)
}

fn invalid() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "malformed response body")
}

#[tokio::test(start_paused = true)]
async fn test_succeeds_on_third_attempt_after_backoff() {
    let attempts = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    let result = retry_with_result(&Context::background(), policy(3), {
        let attempts = attempts.clone();
        move || {
            let attempts = attempts.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(reset())
                } else {
                    Ok("forecast")
                }
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "forecast");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // 1s after the first failure, 2s after the second.
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_is_returned_unchanged() {
    let attempts = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    let result = retry(&Context::background(), policy(3), {
        let attempts = attempts.clone();
        move || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(invalid())
            }
        }
    })
    .await;

    match result {
        Err(RetryError::Permanent(e)) => {
            assert_eq!(e.kind(), io::ErrorKind::InvalidData);
            assert_eq!(e.to_string(), "malformed response body");
        }
        other => panic!("expected permanent failure, got {:?}", other),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_exhausts_after_max_attempts_without_trailing_wait() {
    let attempts = Arc::new(AtomicU32::new(0));
    let start = Instant::now();

    let result = retry(&Context::background(), policy(4), {
        let attempts = attempts.clone();
        move || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(reset())
            }
        }
    })
    .await;

    let exhausted = match result {
        Err(RetryError::Exhausted(exhausted)) => exhausted,
        other => panic!("expected exhaustion, got {:?}", other),
    };
    assert_eq!(exhausted.attempts, 4);
    assert_eq!(exhausted.last_error.kind(), io::ErrorKind::ConnectionReset);
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    // Waits follow attempts 1-3 only: 1 + 2 + 4.
    assert_eq!(start.elapsed(), Duration::from_secs(7));
    assert_eq!(exhausted.total_duration, Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_policy_never_waits() {
    let start = Instant::now();

    let result = retry(&Context::background(), policy(1), || async { Err(reset()) }).await;

    assert_eq!(result.unwrap_err().attempts(), Some(1));
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_success_on_first_attempt_does_not_wait() {
    let start = Instant::now();

    let result =
        retry_with_result(&Context::background(), policy(5), || async { Ok::<_, io::Error>(7) })
            .await;

    assert_eq!(result.unwrap(), 7);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_context_skips_invocation() {
    let attempts = Arc::new(AtomicU32::new(0));
    let ctx = Context::background();
    ctx.cancel();

    let result = retry(&ctx, policy(3), {
        let attempts = attempts.clone();
        move || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Ok::<_, io::Error>(())
            }
        }
    })
    .await;

    assert_eq!(
        result.unwrap_err().cancel_reason(),
        Some(CancelReason::Cancelled)
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_stops_before_next_attempt() {
    let attempts = Arc::new(AtomicU32::new(0));
    let ctx = Context::background();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        canceller.cancel();
    });

    let start = Instant::now();
    let result = retry(&ctx, policy(5), {
        let attempts = attempts.clone();
        move || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(reset())
            }
        }
    })
    .await;

    assert_eq!(
        result.unwrap_err().cancel_reason(),
        Some(CancelReason::Cancelled)
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(start.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_during_backoff_reports_deadline_exceeded() {
    let attempts = Arc::new(AtomicU32::new(0));
    // First wait is 1s, second 2s: the deadline lands inside the second.
    let ctx = Context::with_timeout(Duration::from_secs(2));

    let result = retry(&ctx, policy(5), {
        let attempts = attempts.clone();
        move || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(reset())
            }
        }
    })
    .await;

    assert_eq!(
        result.unwrap_err().cancel_reason(),
        Some(CancelReason::DeadlineExceeded)
    );
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_status_errors_follow_status_classification() {
    let attempts = Arc::new(AtomicU32::new(0));

    let result: Result<(), _> = retry_with_result(&Context::background(), policy(3), {
        let attempts = attempts.clone();
        move || {
            let attempts = attempts.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(StatusError::new(503))
                } else {
                    Err(StatusError::new(404))
                }
            }
        }
    })
    .await;

    assert_eq!(result, Err(RetryError::Permanent(StatusError::new(404))));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_if_uses_predicate() {
    #[derive(Debug, PartialEq, Clone)]
    enum TestError {
        Busy,
        Rejected,
    }

    let attempts = Arc::new(AtomicU32::new(0));

    let result = retry_if(
        &Context::background(),
        policy(5),
        {
            let attempts = attempts.clone();
            move || {
                let attempts = attempts.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(TestError::Busy)
                    } else {
                        Err(TestError::Rejected)
                    }
                }
            }
        },
        |err: &TestError| matches!(err, TestError::Busy),
    )
    .await;

    assert_eq!(result, Err(RetryError::Permanent(TestError::Rejected)));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_retry_with_result_if_returns_value() {
    let attempts = Arc::new(AtomicU32::new(0));

    let result = retry_with_result_if(
        &Context::background(),
        policy(3),
        {
            let attempts = attempts.clone();
            move || {
                let attempts = attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err("busy")
                    } else {
                        Ok(99u32)
                    }
                }
            }
        },
        |_: &&str| true,
    )
    .await;

    assert_eq!(result, Ok(99));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hooks_see_each_retry() {
    let mut events = Vec::new();

    let result: Result<(), _> = retry_with_hooks(
        &Context::background(),
        policy(3),
        || async { Err(reset()) },
        |err: &io::Error| err.is_transient(),
        |event| events.push((event.attempt, event.next_delay, event.elapsed)),
    )
    .await;

    assert!(result.unwrap_err().is_exhausted());
    assert_eq!(
        events,
        vec![
            (1, Duration::from_secs(1), Duration::ZERO),
            (2, Duration::from_secs(2), Duration::from_secs(1)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_hooks_not_called_for_permanent_failure() {
    let mut calls = 0;

    let result: Result<(), _> = retry_with_hooks(
        &Context::background(),
        policy(3),
        || async { Err(invalid()) },
        |err: &io::Error| err.is_transient(),
        |_| calls += 1,
    )
    .await;

    assert!(result.unwrap_err().is_permanent());
    assert_eq!(calls, 0);
}

#[tokio::test(start_paused = true)]
async fn test_jittered_waits_stay_in_bounds() {
    let policy = RetryPolicy::new(4, Duration::from_secs(1), Duration::from_secs(30), 0.5).unwrap();
    let start = Instant::now();

    let result = retry(&Context::background(), policy, || async { Err(reset()) }).await;

    assert!(result.unwrap_err().is_exhausted());
    // Un-jittered total is 1 + 2 + 4 = 7s; ±50% per wait.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(3_500), "{:?}", elapsed);
    assert!(elapsed <= Duration::from_millis(10_500), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_invocations_are_independent() {
    let ctx = Context::background();
    let first = retry_with_result(&ctx, policy(2), || async { Ok::<_, io::Error>(1) });
    let second = retry(&ctx, policy(2), || async { Err(invalid()) });

    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), 1);
    assert!(second.unwrap_err().is_permanent());
}

#[cfg(feature = "tracing")]
mod logging {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_logs_retries_and_exhaustion() {
        let result = retry(&Context::background(), policy(2), || async { Err(reset()) }).await;

        assert!(result.unwrap_err().is_exhausted());
        assert!(logs_contain("transient failure, retrying"));
        assert!(logs_contain("retry budget exhausted"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_logged_delay_saturates_instead_of_wrapping() {
        let huge = Duration::from_secs(u64::MAX);
        let policy = RetryPolicy::new(2, huge, huge, 0.0).unwrap();
        let ctx = Context::background();
        let canceller = ctx.clone();

        let result: Result<(), _> = retry_with_hooks(
            &ctx,
            policy,
            || async { Err(reset()) },
            |err: &io::Error| err.is_transient(),
            |_| canceller.cancel(),
        )
        .await;

        assert!(result.unwrap_err().is_cancelled());
        assert!(logs_contain("delay_ms=18446744073709551615"));
    }
}
