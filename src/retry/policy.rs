//! Retry policy configuration.

use std::time::Duration;

use super::error::PolicyError;

/// How often to retry and how long to wait in between.
///
/// Policies are plain, immutable data: a maximum number of attempts, an
/// exponential backoff starting at `base_delay` and capped at `max_delay`,
/// and a symmetric jitter fraction. They are validated on construction and
/// cannot be changed afterwards, so a policy that exists is always usable.
///
/// # Examples
///
/// ```rust
/// use undertow::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30), 0.0)?;
///
/// assert_eq!(policy.max_attempts(), 3);
/// assert_eq!(policy.base_delay_for(0), Duration::from_secs(1));
/// assert_eq!(policy.base_delay_for(1), Duration::from_secs(2));
/// # Ok::<(), undertow::PolicyError>(())
/// ```
///
/// Invalid values are rejected:
///
/// ```rust
/// use undertow::{PolicyError, RetryPolicy};
/// use std::time::Duration;
///
/// let err = RetryPolicy::new(0, Duration::from_secs(1), Duration::from_secs(30), 0.0);
/// assert_eq!(err, Err(PolicyError::ZeroAttempts));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "PolicyConfig", into = "PolicyConfig")
)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_fraction: f64,
}

impl RetryPolicy {
    /// Build a policy, checking every field.
    ///
    /// Requires `max_attempts >= 1`, `base_delay > 0`,
    /// `max_delay >= base_delay` and `0 <= jitter_fraction < 1`.
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter_fraction: f64,
    ) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if base_delay.is_zero() {
            return Err(PolicyError::ZeroBaseDelay);
        }
        if max_delay < base_delay {
            return Err(PolicyError::MaxBelowBase {
                base_delay,
                max_delay,
            });
        }
        if !(0.0..1.0).contains(&jitter_fraction) {
            return Err(PolicyError::JitterOutOfRange(jitter_fraction));
        }

        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter_fraction,
        })
    }

    /// Start a builder seeded with [`RetryPolicy::default`].
    ///
    /// ```rust
    /// use undertow::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::builder()
    ///     .max_attempts(4)
    ///     .base_delay(Duration::from_millis(200))
    ///     .jitter(0.1)
    ///     .build()?;
    ///
    /// assert_eq!(policy.max_attempts(), 4);
    /// assert_eq!(policy.max_delay(), Duration::from_secs(30));
    /// # Ok::<(), undertow::PolicyError>(())
    /// ```
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            policy: Self::default(),
        }
    }

    /// Maximum number of invocations, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the first failed attempt, before jitter.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound on the un-jittered delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Fraction of the delay used as the jitter half-width.
    pub fn jitter_fraction(&self) -> f64 {
        self.jitter_fraction
    }
}

impl Default for RetryPolicy {
    /// Five attempts, 1s base delay, 30s cap, ±25% jitter.
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_fraction: 0.25,
        }
    }
}

/// Builder for [`RetryPolicy`]. Validation happens in [`build`](Self::build).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Set the maximum number of attempts.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.policy.max_attempts = n;
        self
    }

    /// Set the base delay.
    pub fn base_delay(mut self, d: Duration) -> Self {
        self.policy.base_delay = d;
        self
    }

    /// Set the delay cap.
    pub fn max_delay(mut self, d: Duration) -> Self {
        self.policy.max_delay = d;
        self
    }

    /// Set the jitter fraction. `0.25` means ±25%.
    pub fn jitter(mut self, fraction: f64) -> Self {
        self.policy.jitter_fraction = fraction;
        self
    }

    /// Disable jitter.
    pub fn without_jitter(self) -> Self {
        self.jitter(0.0)
    }

    /// Validate and produce the policy.
    pub fn build(self) -> Result<RetryPolicy, PolicyError> {
        let p = self.policy;
        RetryPolicy::new(p.max_attempts, p.base_delay, p.max_delay, p.jitter_fraction)
    }
}

/// On-disk shape of a policy: durations in (possibly fractional)
/// milliseconds, missing fields filled from the defaults.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PolicyConfig {
    max_attempts: u32,
    base_delay_ms: f64,
    max_delay_ms: f64,
    jitter_fraction: f64,
}

#[cfg(feature = "serde")]
const NANOS_PER_MILLI: f64 = 1_000_000.0;

#[cfg(feature = "serde")]
fn duration_to_millis(delay: Duration) -> f64 {
    delay.as_nanos() as f64 / NANOS_PER_MILLI
}

/// Rounds to the nearest nanosecond so values written by
/// [`duration_to_millis`] load back unchanged.
#[cfg(feature = "serde")]
fn millis_to_duration(millis: f64) -> Result<Duration, PolicyError> {
    let nanos = (millis * NANOS_PER_MILLI).round();
    if nanos.is_finite() && nanos >= 0.0 && nanos < u64::MAX as f64 {
        Ok(Duration::from_nanos(nanos as u64))
    } else {
        Err(PolicyError::InvalidDelay(millis))
    }
}

#[cfg(feature = "serde")]
impl Default for PolicyConfig {
    fn default() -> Self {
        RetryPolicy::default().into()
    }
}

#[cfg(feature = "serde")]
impl From<RetryPolicy> for PolicyConfig {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: duration_to_millis(policy.base_delay),
            max_delay_ms: duration_to_millis(policy.max_delay),
            jitter_fraction: policy.jitter_fraction,
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<PolicyConfig> for RetryPolicy {
    type Error = PolicyError;

    fn try_from(config: PolicyConfig) -> Result<Self, Self::Error> {
        RetryPolicy::new(
            config.max_attempts,
            millis_to_duration(config.base_delay_ms)?,
            millis_to_duration(config.max_delay_ms)?,
            config.jitter_fraction,
        )
    }
}
