//! Centralized observability utilities for structured logging
//!
//! Every attempt and every terminal outcome of a logical request is logged
//! through this layer, with the same field names throughout: `request_id`,
//! `task_id`, `attempt`, `retry_count`, `delay_ms` and `decision`.

use std::time::{Duration, Instant};
use steadfast_core::{OutgoingRequest, RequestError, RequestId, RetryDecision};
use steadfast_transport::TaskId;
use tracing::{debug, info, warn};

/// Attempt metadata for structured logging
#[derive(Debug, Clone)]
pub struct AttemptMetadata {
    /// Logical request
    pub request_id: RequestId,
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request URL
    pub url: String,
    /// Attempt number, starting at 1
    pub attempt: u32,
}

impl AttemptMetadata {
    /// Create metadata for one attempt of `request`
    pub fn new(request_id: RequestId, request: &OutgoingRequest, attempt: u32) -> Self {
        Self {
            request_id,
            method: request.method().to_string(),
            url: request.url().to_string(),
            attempt,
        }
    }

    /// Log the attempt being handed to the transport
    pub fn log_dispatch(&self, task_id: TaskId) {
        debug!(
            request_id = %self.request_id,
            task_id = %task_id,
            method = %self.method,
            url = %self.url,
            attempt = self.attempt,
            "Dispatching attempt"
        );
    }

    /// Log the retry chain's verdict on a failed attempt
    pub fn log_decision(&self, retry_count: u32, error: &RequestError, decision: &RetryDecision) {
        debug!(
            request_id = %self.request_id,
            attempt = self.attempt,
            retry_count,
            error = %error,
            decision = decision.label(),
            delay_ms = decision.delay().map(|d| d.as_millis() as u64),
            "Retry chain decided"
        );
    }

    /// Log a successful outcome
    pub fn log_success(&self, status: u16, retry_count: u32, elapsed: Duration) {
        info!(
            request_id = %self.request_id,
            method = %self.method,
            url = %self.url,
            status,
            attempt = self.attempt,
            retry_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request succeeded"
        );
    }

    /// Log a terminal failure
    pub fn log_failure(&self, error: &RequestError, retry_count: u32, elapsed: Duration) {
        if error.is_cancelled() {
            debug!(
                request_id = %self.request_id,
                retry_count,
                elapsed_ms = elapsed.as_millis() as u64,
                "Request cancelled"
            );
            return;
        }
        warn!(
            request_id = %self.request_id,
            method = %self.method,
            url = %self.url,
            attempt = self.attempt,
            retry_count,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %error,
            "Request failed"
        );
    }
}

/// Timer for measuring a logical request's duration
#[derive(Debug, Clone, Copy)]
pub struct AttemptTimer {
    start: Instant,
}

impl AttemptTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Install a global `tracing` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `info,steadfast=debug` when `RUST_LOG` is unset or invalid.
/// Returns `false` if a global subscriber was already installed.
#[cfg(feature = "subscriber")]
pub fn init_logging() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,steadfast=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
