//! Transport boundary for the steadfast resilience layer
//!
//! The resilience layer drives requests through a [`Transport`], which turns
//! each request into a [`TransportTask`] that can be resumed, suspended and
//! cancelled. This crate defines that boundary and ships a reqwest-backed
//! implementation.
//!
//! # Architecture
//!
//! - **Transport trait**: Generic interface for any task-producing transport
//! - **HTTP transport**: Real network I/O via reqwest
//! - **Error handling**: reqwest failures classified into network error codes

#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! # Usage
//!
//! ```no_run
//! use steadfast_core::OutgoingRequest;
//! use steadfast_transport::{HttpTransport, Transport};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new()?;
//! let request = OutgoingRequest::parse(http::Method::GET, "https://example.com")?;
//! let task = transport.create_task(request, Box::new(|outcome| {
//!     println!("finished: {:?}", outcome.map(|r| r.status()));
//! }));
//! task.resume();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http;
pub mod traits;

// Re-export commonly used types
pub use error::{Result, TransportSetupError, classify_reqwest_error};
pub use crate::http::{HttpTask, HttpTransport, HttpTransportConfig};
pub use traits::{
    Completion, CompletionSlot, TaskId, Transport, TransportFailure, TransportOutcome,
    TransportTask,
};
