//! HTTP transport client implementation
//!
//! Creates [`HttpTask`]s that execute requests on a shared reqwest client and
//! the tokio runtime captured at construction.

use super::task::HttpTask;
use crate::error::{Result, TransportSetupError};
use crate::traits::{Completion, Transport, TransportTask};
use reqwest::Client as ReqwestClient;
use std::sync::Arc;
use std::time::Duration;
use steadfast_core::OutgoingRequest;
use tokio::runtime::Handle;

/// HTTP transport implementation
///
/// Handles:
/// - Connection pooling across tasks
/// - Timeout handling
/// - Suspend/resume of body streaming
/// - Cancellation with partial-body resume data
#[derive(Clone)]
pub struct HttpTransport {
    client: Arc<ReqwestClient>,
    runtime: Handle,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a new HTTP transport with default configuration
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        Self::with_config(Default::default())
    }

    /// Create a new HTTP transport with custom configuration
    pub fn with_config(config: HttpTransportConfig) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|e| TransportSetupError::NoRuntime(e.to_string()))?;

        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            runtime,
            timeout: config.timeout,
        })
    }

    /// Get a reference to the underlying reqwest client
    pub fn reqwest_client(&self) -> Arc<ReqwestClient> {
        self.client.clone()
    }

    /// Overall request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Transport for HttpTransport {
    fn create_task(&self, request: OutgoingRequest, completion: Completion) -> Arc<dyn TransportTask> {
        let task = HttpTask::new(
            Arc::clone(&self.client),
            self.runtime.clone(),
            request,
            completion,
        );
        tracing::trace!(task_id = %task.id(), "Created HTTP task");
        Arc::new(task)
    }
}

/// HTTP transport configuration
#[derive(Clone, Debug)]
pub struct HttpTransportConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_transport_creation() {
        let transport = HttpTransport::new().expect("Failed to create transport");
        assert_eq!(transport.timeout(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_http_transport_with_config() {
        let config = HttpTransportConfig {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 5,
        };

        let transport = HttpTransport::with_config(config).expect("Failed to create transport");
        assert_eq!(transport.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_http_transport_requires_runtime() {
        let err = HttpTransport::new().unwrap_err();
        assert!(matches!(err, TransportSetupError::NoRuntime(_)));
    }
}
