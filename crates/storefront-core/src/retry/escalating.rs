//! Deterministic backoff with escalating timeouts.

use super::strategy::{BackoffStrategy, RetryDecision};
use crate::failure::FailureKind;
use std::time::Duration;

/// Base unit for retry delays (2s).
pub const BASE_DELAY: Duration = Duration::from_millis(2000);

/// Timeout budget of the first attempt (30s).
pub const INITIAL_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Maximum number of retries for one call.
pub const MAX_RETRIES: u32 = 3;

/// Ceiling for any single delay.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

/// Tunable knobs for [`EscalatingBackoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Base unit for retry delays.
    pub base_delay: Duration,
    /// Timeout of the first attempt, and the step by which it escalates.
    pub initial_timeout: Duration,
    /// Maximum number of retries for one call.
    pub max_retries: u32,
    /// Ceiling for any single delay.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: BASE_DELAY,
            initial_timeout: INITIAL_TIMEOUT,
            max_retries: MAX_RETRIES,
            max_delay: MAX_DELAY,
        }
    }
}

/// Jitter-free backoff policy.
///
/// For retry number `n = attempt + 1`:
///
/// ```text
/// RateLimited:                 delay = base_delay * 2^(n-1)   timeout unchanged
/// ServerError/Network/Timeout: delay = base_delay * n         timeout = initial_timeout * n
/// ClientError/Unknown/AuthExpired: give up
/// attempt >= max_retries:      give up
/// ```
///
/// Every delay is capped at `max_delay`. Both delay and timeout are
/// non-decreasing in `attempt`.
///
/// # Examples
///
/// ```rust
/// use storefront_core::retry::{BackoffStrategy, EscalatingBackoff};
/// use storefront_core::FailureKind;
/// use std::time::Duration;
///
/// let policy = EscalatingBackoff::default();
///
/// let delays: Vec<_> = (0..3)
///     .filter_map(|attempt| policy.decide(FailureKind::RateLimited, attempt).delay())
///     .collect();
///
/// assert_eq!(
///     delays,
///     vec![
///         Duration::from_secs(2),
///         Duration::from_secs(4),
///         Duration::from_secs(8),
///     ]
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct EscalatingBackoff {
    config: BackoffConfig,
}

impl EscalatingBackoff {
    /// Create a policy from explicit knobs.
    pub fn new(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Create a new builder starting from the defaults.
    pub fn builder() -> EscalatingBackoffBuilder {
        EscalatingBackoffBuilder::default()
    }

    /// The knobs this policy runs with.
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// `base_delay * 2^attempt`, saturating at `max_delay`.
    fn exponential_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.config.base_delay.checked_mul(factor))
            .unwrap_or(self.config.max_delay)
            .min(self.config.max_delay)
    }

    /// `base_delay * retry`, saturating at `max_delay`.
    fn linear_delay(&self, retry: u32) -> Duration {
        self.config
            .base_delay
            .saturating_mul(retry)
            .min(self.config.max_delay)
    }
}

impl BackoffStrategy for EscalatingBackoff {
    fn decide(&self, kind: FailureKind, attempt: u32) -> RetryDecision {
        if !kind.is_retryable() || attempt >= self.config.max_retries {
            return RetryDecision::GiveUp;
        }

        let retry = attempt.saturating_add(1);
        let decision = match kind {
            FailureKind::RateLimited => RetryDecision::RetryAfter {
                delay: self.exponential_delay(attempt),
                timeout: None,
            },
            _ => RetryDecision::RetryAfter {
                delay: self.linear_delay(retry),
                timeout: Some(self.config.initial_timeout.saturating_mul(retry)),
            },
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(%kind, attempt, ?decision, "backoff decision");

        decision
    }

    fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

/// Builder for configuring [`EscalatingBackoff`].
///
/// ```rust
/// use storefront_core::retry::EscalatingBackoff;
/// use std::time::Duration;
///
/// let policy = EscalatingBackoff::builder()
///     .max_retries(5)
///     .base_delay(Duration::from_millis(250))
///     .initial_timeout(Duration::from_secs(10))
///     .build();
///
/// assert_eq!(policy.config().max_retries, 5);
/// ```
#[derive(Debug, Default)]
pub struct EscalatingBackoffBuilder {
    base_delay: Option<Duration>,
    initial_timeout: Option<Duration>,
    max_retries: Option<u32>,
    max_delay: Option<Duration>,
}

impl EscalatingBackoffBuilder {
    /// Set the base delay unit.
    ///
    /// Default: 2s
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Set the first attempt's timeout.
    ///
    /// Default: 30s
    pub fn initial_timeout(mut self, timeout: Duration) -> Self {
        self.initial_timeout = Some(timeout);
        self
    }

    /// Set the maximum number of retries.
    ///
    /// Default: 3
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set the delay ceiling.
    ///
    /// Default: 60s
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Build the policy, using defaults for unset knobs.
    pub fn build(self) -> EscalatingBackoff {
        let defaults = BackoffConfig::default();
        EscalatingBackoff::new(BackoffConfig {
            base_delay: self.base_delay.unwrap_or(defaults.base_delay),
            initial_timeout: self.initial_timeout.unwrap_or(defaults.initial_timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
        })
    }
}
