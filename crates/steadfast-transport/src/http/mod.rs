//! HTTP transport implementation
//!
//! Provides a reqwest-backed [`Transport`](crate::Transport) whose tasks
//! support suspend, resume and cancellation with resume data.

pub mod client;
pub mod task;

pub use client::{HttpTransport, HttpTransportConfig};
pub use task::HttpTask;
