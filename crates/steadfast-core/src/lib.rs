#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Core abstractions for the steadfast HTTP resilience layer.
//!
//! This crate holds the pieces of the layer that never touch the network:
//!
//! - **Request model** via [`OutgoingRequest`], [`ResponseHead`] and [`Response`]
//! - **Error taxonomy** via [`RequestError`] and friends
//! - **Retry decisions** via [`RetryDecision`], [`RetryContext`] and
//!   [`ExponentialBackoffRetryPolicy`]
//! - **Interceptor chains** via the [`Adapter`] and [`Retrier`] capabilities and
//!   the ordered [`Interceptor`]
//!
//! # Examples
//!
//! Deciding whether a failed GET should be retried:
//!
//! ```rust
//! use steadfast_core::prelude::*;
//! use std::time::Duration;
//!
//! let policy = ExponentialBackoffRetryPolicy::default();
//! let request = OutgoingRequest::parse(http::Method::GET, "https://example.com/items").unwrap();
//!
//! let mut context = RetryContext::new(request);
//! let error = RequestError::ResponseStatus { status: 503 };
//! context.record_failure(error.clone(), Some(ResponseHead::new(http::StatusCode::SERVICE_UNAVAILABLE)));
//!
//! assert_eq!(
//!     policy.decide(&context, &error),
//!     RetryDecision::RetryAfter(Duration::from_millis(500))
//! );
//! ```

pub mod error;
pub mod interceptor;
pub mod request;
pub mod response;
pub mod retry;

pub use error::{
    AdaptationError, NetworkErrorCode, PolicyError, RequestError, RetrierError, TransportError,
};
pub use interceptor::{Adapter, FnAdapter, FnRetrier, Interceptor, Retrier, adapter_fn, retrier_fn};
pub use request::{OutgoingRequest, RequestId};
pub use response::{Response, ResponseHead};
pub use retry::{
    ConnectionLostRetryPolicy, ExponentialBackoffRetryPolicy, ExponentialBackoffRetryPolicyBuilder,
    RetryContext, RetryDecision,
};

/// Convenient re-exports of commonly used items.
///
/// Import all core abstractions with:
///
/// ```rust
/// use steadfast_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{
        AdaptationError, NetworkErrorCode, RequestError, RetrierError, TransportError,
    };
    pub use crate::interceptor::{Adapter, Interceptor, Retrier, adapter_fn, retrier_fn};
    pub use crate::request::{OutgoingRequest, RequestId};
    pub use crate::response::{Response, ResponseHead};
    pub use crate::retry::{
        ConnectionLostRetryPolicy, ExponentialBackoffRetryPolicy, RetryContext, RetryDecision,
    };
}
