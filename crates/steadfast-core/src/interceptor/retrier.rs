//! Retry decision capability.

use crate::error::RequestError;
use crate::retry::{RetryContext, RetryDecision};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;

/// A step that votes on whether a failed attempt should be retried.
///
/// Inside an [`Interceptor`](super::Interceptor), returning
/// [`RetryDecision::DoNotRetry`] means "no opinion" and lets the next retrier
/// vote; any other decision ends the evaluation.
#[async_trait]
pub trait Retrier: Send + Sync {
    /// Vote on the failure of the attempt described by `context`.
    async fn retry(&self, context: &RetryContext, error: &RequestError) -> RetryDecision;
}

/// Retrier backed by an async closure.
///
/// Created with [`retrier_fn`]. The closure receives owned clones of the
/// context and error so its future can be `'static`.
pub struct FnRetrier<F> {
    f: F,
}

/// Wrap an async closure as a [`Retrier`].
///
/// # Examples
///
/// ```rust
/// use steadfast_core::interceptor::retrier_fn;
/// use steadfast_core::{RequestError, RetryContext, RetryDecision};
/// use std::time::Duration;
///
/// // Retry 429 responses after a fixed second.
/// let retrier = retrier_fn(|_ctx: RetryContext, error: RequestError| async move {
///     match error.status_code() {
///         Some(429) => RetryDecision::RetryAfter(Duration::from_secs(1)),
///         _ => RetryDecision::DoNotRetry,
///     }
/// });
/// # let _ = retrier;
/// ```
pub fn retrier_fn<F, Fut>(f: F) -> FnRetrier<F>
where
    F: Fn(RetryContext, RequestError) -> Fut + Send + Sync,
    Fut: Future<Output = RetryDecision> + Send + 'static,
{
    FnRetrier { f }
}

#[async_trait]
impl<F, Fut> Retrier for FnRetrier<F>
where
    F: Fn(RetryContext, RequestError) -> Fut + Send + Sync,
    Fut: Future<Output = RetryDecision> + Send + 'static,
{
    async fn retry(&self, context: &RetryContext, error: &RequestError) -> RetryDecision {
        (self.f)(context.clone(), error.clone()).await
    }
}

impl<F> fmt::Debug for FnRetrier<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRetrier").finish_non_exhaustive()
    }
}
