//! The retry policy seam.

use crate::failure::FailureKind;
use std::fmt;
use std::time::Duration;

/// Verdict for one failed attempt.
///
/// Computed fresh after every failure and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then dispatch again.
    RetryAfter {
        /// How long to wait before the next attempt.
        delay: Duration,
        /// Timeout budget for the next attempt. `None` keeps the current one.
        timeout: Option<Duration>,
    },
    /// Stop and surface the failure to the caller.
    GiveUp,
}

impl RetryDecision {
    /// Returns `true` for [`RetryDecision::RetryAfter`].
    pub fn is_retry(&self) -> bool {
        matches!(self, RetryDecision::RetryAfter { .. })
    }

    /// The delay, if this decision retries.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            RetryDecision::RetryAfter { delay, .. } => Some(*delay),
            RetryDecision::GiveUp => None,
        }
    }
}

/// A policy deciding whether and when a failed attempt is retried.
///
/// Implementations must be pure: the same `(kind, attempt)` always yields the
/// same decision. The request pipeline owns the loop; a strategy only answers
/// one question per failure.
///
/// # Examples
///
/// ```rust
/// use storefront_core::retry::{BackoffStrategy, RetryDecision};
/// use storefront_core::FailureKind;
/// use std::time::Duration;
///
/// /// Retries network failures once, immediately.
/// #[derive(Debug)]
/// struct OneShot;
///
/// impl BackoffStrategy for OneShot {
///     fn decide(&self, kind: FailureKind, attempt: u32) -> RetryDecision {
///         if kind == FailureKind::Network && attempt < self.max_retries() {
///             RetryDecision::RetryAfter { delay: Duration::ZERO, timeout: None }
///         } else {
///             RetryDecision::GiveUp
///         }
///     }
///
///     fn max_retries(&self) -> u32 {
///         1
///     }
/// }
///
/// assert!(OneShot.decide(FailureKind::Network, 0).is_retry());
/// assert!(!OneShot.decide(FailureKind::Network, 1).is_retry());
/// ```
pub trait BackoffStrategy: Send + Sync + fmt::Debug {
    /// Decide what to do after an attempt failed with `kind`.
    ///
    /// # Parameters
    /// - `kind`: classification of the failed attempt
    /// - `attempt`: retries already performed for this call (0 after the
    ///   first dispatch fails)
    fn decide(&self, kind: FailureKind, attempt: u32) -> RetryDecision;

    /// Upper bound on retries for one call.
    ///
    /// With `max_retries() == 3` a request is dispatched at most 4 times by
    /// the backoff path (token refresh replays are not counted).
    fn max_retries(&self) -> u32;
}
