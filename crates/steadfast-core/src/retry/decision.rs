//! Retry decision vocabulary.

use crate::error::RetrierError;
use std::time::Duration;

/// Vote returned by a retrier for a failed attempt.
///
/// `RetryNow` and `RetryAfter` require a retry. `DoNotRetry` is an abstention
/// inside a chain and terminal once the whole chain abstains.
/// `DoNotRetryWithError` is always terminal and replaces the natural error.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry without delay.
    RetryNow,
    /// Retry after the given delay.
    RetryAfter(Duration),
    /// Do not retry; surface the original error.
    DoNotRetry,
    /// Do not retry; surface this error instead.
    DoNotRetryWithError(RetrierError),
}

impl RetryDecision {
    /// Whether another attempt must be made.
    pub fn is_retry_required(&self) -> bool {
        matches!(self, Self::RetryNow | Self::RetryAfter(_))
    }

    /// Delay before the next attempt, if one is required.
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Self::RetryNow => Some(Duration::ZERO),
            Self::RetryAfter(delay) => Some(*delay),
            Self::DoNotRetry | Self::DoNotRetryWithError(_) => None,
        }
    }

    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RetryNow => "retry_now",
            Self::RetryAfter(_) => "retry_after",
            Self::DoNotRetry => "do_not_retry",
            Self::DoNotRetryWithError(_) => "do_not_retry_with_error",
        }
    }
}
