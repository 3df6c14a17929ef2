#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core policy types for the storefront API client.
//!
//! This crate holds the pieces of request resilience that involve no I/O:
//!
//! - **Failure taxonomy** via [`FailureKind`], the closed set of ways a single
//!   attempt can fail
//! - **Retry policy** via the [`BackoffStrategy`](retry::BackoffStrategy) trait
//!   - Deterministic, jitter-free escalation in [`EscalatingBackoff`](retry::EscalatingBackoff)
//!   - Exponential delay for rate limiting, linear delay plus escalating
//!     timeouts for transient server and network failures
//!
//! The HTTP client crate drives these decisions from its request pipeline.
//!
//! # Examples
//!
//! ```rust
//! use storefront_core::prelude::*;
//! use std::time::Duration;
//!
//! let policy = EscalatingBackoff::default();
//!
//! match policy.decide(FailureKind::ServerError, 0) {
//!     RetryDecision::RetryAfter { delay, timeout } => {
//!         assert_eq!(delay, Duration::from_secs(2));
//!         assert_eq!(timeout, Some(Duration::from_secs(30)));
//!     }
//!     RetryDecision::GiveUp => unreachable!(),
//! }
//! ```

pub mod failure;
pub mod retry;

pub use failure::FailureKind;

/// Convenient re-exports of commonly used items.
///
/// ```rust
/// use storefront_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::failure::FailureKind;
    pub use crate::retry::{
        BackoffConfig, BackoffStrategy, EscalatingBackoff, EscalatingBackoffBuilder,
        RetryDecision,
    };
}
