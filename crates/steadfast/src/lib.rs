//! # Steadfast
//!
//! Resilient HTTP requests for async Rust:
//! - Interceptor chains that adapt outgoing requests and vote on retries
//! - Exponential backoff over configurable methods, statuses and network errors
//! - Per-request lifecycle with resume, suspend and cancel
//! - Cancellation that reaches retries still waiting out their delay
//! - Lifecycle events and structured `tracing` logs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use steadfast::{OutgoingRequest, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::builder().build()?;
//!
//!     let request = OutgoingRequest::parse(http::Method::GET, "https://example.com/status")?;
//!     let response = session.request(request).response().await;
//!
//!     println!("attempts: {}", response.attempts);
//!     println!("{}", response.into_result()?.text()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Lifecycle events
//!
//! ```rust
//! use steadfast::{RequestId, TaskEvent, TaskEventKind, TaskId};
//!
//! let event = TaskEvent::new(TaskEventKind::DidCancel, TaskId::new(), RequestId::new());
//! assert_eq!(event.name(), "task.didCancel");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Re-export commonly used types
pub use auth::{BearerAuth, TokenRefresher};
pub use config::{RetryConfig, SessionConfig};
pub use error::{Error, Result};
pub use events::{ChannelEventSink, EventSink, NoopEventSink, TaskEvent, TaskEventKind, TracingEventSink};
pub use request::{DataRequest, DataResponse, RequestHandle};
pub use scheduler::{RetryFire, RetryScheduler, RetryWork, ScheduledRetry, TokioRetryScheduler};
pub use session::{Session, SessionBuilder};
pub use task::{TaskControl, TaskState};

// Module declarations
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod observability;
pub mod request;
pub mod scheduler;
pub mod session;
pub mod task;

// Re-export the layers below
pub use steadfast_core::{
    AdaptationError, Adapter, ConnectionLostRetryPolicy, ExponentialBackoffRetryPolicy,
    Interceptor, NetworkErrorCode, OutgoingRequest, PolicyError, RequestError, RequestId,
    Response, ResponseHead, Retrier, RetrierError, RetryContext, RetryDecision, TransportError,
    adapter_fn, retrier_fn,
};
pub use steadfast_transport::{
    Completion, CompletionSlot, HttpTransport, HttpTransportConfig, TaskId, Transport, TransportFailure,
    TransportOutcome, TransportTask,
};

// Re-export key dependencies for convenience
pub use async_trait::async_trait;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Adapter, BearerAuth, DataRequest, DataResponse, Error, Interceptor, OutgoingRequest,
        RequestError, RequestHandle, Result, Retrier, RetryContext, RetryDecision, Session,
        SessionConfig, TaskState, adapter_fn, async_trait, retrier_fn,
    };
}
