//! Exponential backoff with symmetric jitter.
//!
//! The delay after the attempt at index `n` (0-based) fails is
//!
//! ```text
//! delay = min(base_delay * 2^n, max_delay)
//! wait  = delay + delay * jitter_fraction * U(-1, 1)
//! ```
//!
//! Positive jitter may push `wait` slightly past `max_delay`; that is allowed
//! and not clamped again. A negative result is clamped to zero.

use std::time::Duration;

use rand::Rng;

use super::policy::RetryPolicy;

impl RetryPolicy {
    /// The un-jittered delay after attempt `attempt` fails.
    ///
    /// Doubles with every attempt and saturates at `max_delay`.
    ///
    /// ```rust
    /// use undertow::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5), 0.0)?;
    ///
    /// assert_eq!(policy.base_delay_for(0), Duration::from_secs(1));
    /// assert_eq!(policy.base_delay_for(1), Duration::from_secs(2));
    /// assert_eq!(policy.base_delay_for(2), Duration::from_secs(4));
    /// assert_eq!(policy.base_delay_for(3), Duration::from_secs(5)); // capped
    /// # Ok::<(), undertow::PolicyError>(())
    /// ```
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        1u32.checked_shl(attempt)
            .and_then(|factor| self.base_delay().checked_mul(factor))
            .map_or(self.max_delay(), |delay| delay.min(self.max_delay()))
    }

    /// The jittered delay after attempt `attempt` fails, drawn from the
    /// thread-local generator.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay_with_rng(attempt, &mut rand::rng())
    }

    /// Like [`delay_for`](Self::delay_for) with a caller-supplied generator.
    pub fn delay_with_rng<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let delay = self.base_delay_for(attempt);
        if self.jitter_fraction() == 0.0 {
            return delay;
        }
        apply_jitter(delay, self.jitter_fraction(), rng.random_range(-1.0..=1.0))
    }
}

/// Perturb `delay` by `delay * fraction * unit`, where `unit` is in `[-1, 1]`.
///
/// Never returns a negative duration.
pub fn apply_jitter(delay: Duration, fraction: f64, unit: f64) -> Duration {
    let base = delay.as_secs_f64();
    let jittered = (base + base * fraction * unit).max(0.0);
    Duration::try_from_secs_f64(jittered).unwrap_or(Duration::MAX)
}
