//! Retry decisions and backoff policies.
//!
//! This module decides, for one failed attempt, whether the request pipeline
//! should try again, how long it should wait, and how much time the next
//! attempt gets.
//!
//! # Key Types
//!
//! - [`BackoffStrategy`] - Core trait for retry policies
//! - [`EscalatingBackoff`] - Deterministic default policy
//! - [`RetryDecision`] - The per-attempt verdict
//!
//! # Examples
//!
//! ```rust
//! use storefront_core::retry::{BackoffStrategy, EscalatingBackoff, RetryDecision};
//! use storefront_core::FailureKind;
//! use std::time::Duration;
//!
//! let policy = EscalatingBackoff::builder()
//!     .base_delay(Duration::from_millis(100))
//!     .build();
//!
//! assert_eq!(
//!     policy.decide(FailureKind::RateLimited, 1),
//!     RetryDecision::RetryAfter {
//!         delay: Duration::from_millis(200),
//!         timeout: None,
//!     }
//! );
//! assert_eq!(policy.decide(FailureKind::ClientError, 0), RetryDecision::GiveUp);
//! ```

mod escalating;
mod strategy;

pub use escalating::{
    BASE_DELAY, BackoffConfig, EscalatingBackoff, EscalatingBackoffBuilder, INITIAL_TIMEOUT,
    MAX_DELAY, MAX_RETRIES,
};
pub use strategy::{BackoffStrategy, RetryDecision};
