//! Ordered composition of adapters and retriers.

use super::adapter::Adapter;
use super::retrier::Retrier;
use crate::error::{AdaptationError, RequestError};
use crate::request::OutgoingRequest;
use crate::retry::{RetryContext, RetryDecision};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A named, ordered pair of adapter and retrier lists.
///
/// Insertion order is evaluation order:
///
/// - **Adapters** run strictly in order, each receiving the previous output.
///   The first failure stops the chain and is returned verbatim.
/// - **Retriers** are consulted strictly in order. The first vote other than
///   [`RetryDecision::DoNotRetry`] wins; if every retrier abstains (or there
///   are none) the result is `DoNotRetry`.
///
/// # Examples
///
/// ```rust
/// use steadfast_core::prelude::*;
///
/// let interceptor = Interceptor::new("api")
///     .with_adapter(adapter_fn(|req: OutgoingRequest| async move {
///         req.with_header("accept", "application/json")
///     }))
///     .with_retrier(ExponentialBackoffRetryPolicy::default());
///
/// assert_eq!(interceptor.adapter_count(), 1);
/// assert_eq!(interceptor.retrier_count(), 1);
/// ```
#[derive(Clone)]
pub struct Interceptor {
    name: String,
    adapters: Vec<Arc<dyn Adapter>>,
    retriers: Vec<Arc<dyn Retrier>>,
}

impl Default for Interceptor {
    fn default() -> Self {
        Self::new("default")
    }
}

impl Interceptor {
    /// Create an empty interceptor.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            adapters: Vec::new(),
            retriers: Vec::new(),
        }
    }

    /// Create an interceptor from explicit lists.
    pub fn from_parts(
        name: impl Into<String>,
        adapters: Vec<Arc<dyn Adapter>>,
        retriers: Vec<Arc<dyn Retrier>>,
    ) -> Self {
        Self {
            name: name.into(),
            adapters,
            retriers,
        }
    }

    /// Flatten several interceptors into one, preserving their order.
    pub fn compose<'a>(
        name: impl Into<String>,
        interceptors: impl IntoIterator<Item = &'a Interceptor>,
    ) -> Self {
        let mut composed = Self::new(name);
        for interceptor in interceptors {
            composed.adapters.extend(interceptor.adapters.iter().cloned());
            composed.retriers.extend(interceptor.retriers.iter().cloned());
        }
        composed
    }

    /// Append an adapter.
    pub fn with_adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.push_adapter(Arc::new(adapter));
        self
    }

    /// Append a retrier.
    pub fn with_retrier(mut self, retrier: impl Retrier + 'static) -> Self {
        self.push_retrier(Arc::new(retrier));
        self
    }

    /// Append a shared adapter.
    pub fn push_adapter(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.push(adapter);
    }

    /// Append a shared retrier.
    pub fn push_retrier(&mut self, retrier: Arc<dyn Retrier>) {
        self.retriers.push(retrier);
    }

    /// Interceptor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of adapters.
    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    /// Number of retriers.
    pub fn retrier_count(&self) -> usize {
        self.retriers.len()
    }

    /// Adapters in evaluation order.
    pub fn adapters(&self) -> &[Arc<dyn Adapter>] {
        &self.adapters
    }

    /// Retriers in evaluation order.
    pub fn retriers(&self) -> &[Arc<dyn Retrier>] {
        &self.retriers
    }

    /// Check if the interceptor has neither adapters nor retriers.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty() && self.retriers.is_empty()
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("name", &self.name)
            .field("adapters", &self.adapters.len())
            .field("retriers", &self.retriers.len())
            .finish()
    }
}

#[async_trait]
impl Adapter for Interceptor {
    async fn adapt(
        &self,
        mut request: OutgoingRequest,
    ) -> Result<OutgoingRequest, AdaptationError> {
        for (_index, adapter) in self.adapters.iter().enumerate() {
            request = match adapter.adapt(request).await {
                Ok(adapted) => adapted,
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        interceptor = %self.name,
                        adapter = _index,
                        error = %err,
                        "Adapter failed; skipping remaining adapters"
                    );
                    return Err(err);
                }
            };
        }
        Ok(request)
    }
}

#[async_trait]
impl Retrier for Interceptor {
    async fn retry(&self, context: &RetryContext, error: &RequestError) -> RetryDecision {
        for (_index, retrier) in self.retriers.iter().enumerate() {
            let decision = retrier.retry(context, error).await;
            if decision != RetryDecision::DoNotRetry {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    interceptor = %self.name,
                    retrier = _index,
                    decision = decision.label(),
                    "Retrier voted"
                );
                return decision;
            }
        }
        RetryDecision::DoNotRetry
    }
}
