//! Retry decisions and backoff policies.
//!
//! This module provides the vocabulary retriers speak ([`RetryDecision`]),
//! the per-request bookkeeping they read ([`RetryContext`]), and the stock
//! exponential backoff policy.
//!
//! # Key Types
//!
//! - [`RetryDecision`] - Vote returned by a retrier
//! - [`RetryContext`] - Attempt history of one logical request
//! - [`ExponentialBackoffRetryPolicy`] - `scale * base^retry_count` backoff for
//!   idempotent requests
//! - [`ConnectionLostRetryPolicy`] - Retries only dropped connections
//!
//! # Examples
//!
//! ```rust
//! use steadfast_core::retry::ExponentialBackoffRetryPolicy;
//! use std::time::Duration;
//!
//! let policy = ExponentialBackoffRetryPolicy::builder()
//!     .retry_limit(4)
//!     .base(2)
//!     .scale(0.5)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(policy.delay_for(3), Duration::from_secs(4));
//! ```

mod context;
mod decision;
mod exponential;

pub use context::RetryContext;
pub use decision::RetryDecision;
pub use exponential::{
    ConnectionLostRetryPolicy, DEFAULT_RETRYABLE_STATUS_CODES, ExponentialBackoffRetryPolicy,
    ExponentialBackoffRetryPolicyBuilder, default_retryable_methods,
};
