//! Retry Patterns Example
//!
//! Demonstrates the retry engine against a flaky, simulated upstream.
//! Shows practical patterns including:
//! - Retrying transient failures with exponential backoff
//! - Failing fast on permanent errors
//! - Conditional retry with a custom predicate
//! - Observing retries through a hook
//! - Bounding the whole sequence with a deadline

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use undertow::prelude::*;
use undertow::StatusError;

fn demo_policy() -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(4)
        .base_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(2))
        .jitter(0.25)
        .build()
        .expect("demo policy is valid")
}

// ==================== Basic Retry ====================

/// Example 1: transient failures, then success
async fn example_basic_retry() {
    println!("\n=== Example 1: Basic Retry ===");

    let attempts = Arc::new(AtomicU32::new(0));

    let result = retry_with_result(&Context::background(), demo_policy(), {
        let attempts = attempts.clone();
        move || {
            let attempts = attempts.clone();
            async move {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                println!("  Attempt {}", n + 1);
                if n < 2 {
                    Err(StatusError::new(503).with_context("forecast"))
                } else {
                    Ok("sunny, 21°C")
                }
            }
        }
    })
    .await;

    match result {
        Ok(forecast) => println!(
            "Success after {} attempts: {}",
            attempts.load(Ordering::SeqCst),
            forecast
        ),
        Err(e) => println!("Failed: {}", e),
    }
}

// ==================== Backoff ====================

/// Example 2: how the delay grows
fn example_backoff_schedule() {
    println!("\n=== Example 2: Backoff Schedule ===");

    let policy = demo_policy();
    for attempt in 0..6 {
        println!(
            "  after attempt {}: base {:?}, jittered {:?}",
            attempt + 1,
            policy.base_delay_for(attempt),
            policy.delay_for(attempt)
        );
    }
}

// ==================== Permanent Errors ====================

/// Example 3: a 401 is not retried
async fn example_fail_fast() {
    println!("\n=== Example 3: Fail Fast ===");

    let result: Result<(), _> = retry_with_result(&Context::background(), demo_policy(), || async {
        println!("  Attempt (only one expected)");
        Err(StatusError::new(401).with_context("calendar API"))
    })
    .await;

    if let Err(RetryError::Permanent(e)) = result {
        println!("Permanent failure returned as is: {}", e);
    }
}

// ==================== Conditional Retry ====================

#[derive(Debug, Clone, PartialEq)]
enum DisplayError {
    Busy,
    BadFrame,
}

/// Example 4: retry_if with a domain error type
async fn example_retry_if() {
    println!("\n=== Example 4: Conditional Retry ===");

    let attempts = Arc::new(AtomicU32::new(0));

    let result = retry_if(
        &Context::background(),
        demo_policy(),
        {
            let attempts = attempts.clone();
            move || {
                let attempts = attempts.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst);
                    println!("  Attempt {}", n + 1);
                    if n == 0 {
                        Err(DisplayError::Busy)
                    } else {
                        Err(DisplayError::BadFrame)
                    }
                }
            }
        },
        |err: &DisplayError| *err == DisplayError::Busy,
    )
    .await;

    println!("Result: {:?}", result);
}

// ==================== Hooks ====================

/// Example 5: observe every retry
async fn example_hooks() {
    println!("\n=== Example 5: Retry Hooks ===");

    let result: Result<(), _> = retry_with_hooks(
        &Context::background(),
        demo_policy(),
        || async { Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset)) },
        |err: &std::io::Error| err.is_transient(),
        |event| {
            println!(
                "  attempt {} failed ({}), retrying in {:?} (elapsed {:?})",
                event.attempt, event.error, event.next_delay, event.elapsed
            );
        },
    )
    .await;

    if let Err(e) = result {
        println!("Final: {}", e);
    }
}

// ==================== Deadlines ====================

/// Example 6: a deadline cuts the sequence short
async fn example_deadline() {
    println!("\n=== Example 6: Deadline ===");

    let ctx = Context::with_timeout(Duration::from_millis(250));
    let result = retry(&ctx, demo_policy(), || async {
        Err(std::io::Error::from(std::io::ErrorKind::TimedOut))
    })
    .await;

    match result {
        Err(RetryError::Cancelled(reason)) => println!("Stopped: {}", reason),
        other => println!("Unexpected: {:?}", other),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .init();

    println!("Retry Patterns Examples");
    println!("=======================");

    example_basic_retry().await;
    example_backoff_schedule();
    example_fail_fast().await;
    example_retry_if().await;
    example_hooks().await;
    example_deadline().await;

    println!("\n=== All examples completed successfully! ===");
}
