//! Request adaptation capability.

use crate::error::AdaptationError;
use crate::request::OutgoingRequest;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;

/// A step that may rewrite an outgoing request before dispatch.
///
/// Adapters run before every attempt, including retries, so an adapter that
/// adds a header should set it rather than append to it.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Produce the request to dispatch, or fail the logical request.
    async fn adapt(&self, request: OutgoingRequest) -> Result<OutgoingRequest, AdaptationError>;
}

/// Adapter backed by an async closure.
///
/// Created with [`adapter_fn`].
pub struct FnAdapter<F> {
    f: F,
}

/// Wrap an async closure as an [`Adapter`].
///
/// # Examples
///
/// ```rust
/// use steadfast_core::interceptor::{Adapter, adapter_fn};
/// use steadfast_core::OutgoingRequest;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let adapter = adapter_fn(|request: OutgoingRequest| async move {
///     request.with_header("x-client", "steadfast")
/// });
///
/// let request = OutgoingRequest::parse(http::Method::GET, "https://example.com")?;
/// let adapted = adapter.adapt(request).await?;
/// assert_eq!(adapted.header("x-client"), Some("steadfast"));
/// # Ok(())
/// # }
/// ```
pub fn adapter_fn<F, Fut>(f: F) -> FnAdapter<F>
where
    F: Fn(OutgoingRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<OutgoingRequest, AdaptationError>> + Send + 'static,
{
    FnAdapter { f }
}

#[async_trait]
impl<F, Fut> Adapter for FnAdapter<F>
where
    F: Fn(OutgoingRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<OutgoingRequest, AdaptationError>> + Send + 'static,
{
    async fn adapt(&self, request: OutgoingRequest) -> Result<OutgoingRequest, AdaptationError> {
        (self.f)(request).await
    }
}

impl<F> fmt::Debug for FnAdapter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAdapter").finish_non_exhaustive()
    }
}
