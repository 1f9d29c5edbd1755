//! Response model

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// Status line and headers of a response, as seen by retriers.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHead {
    /// HTTP status code
    pub status: StatusCode,

    /// Response headers
    pub headers: HeaderMap,
}

impl ResponseHead {
    /// Create a head with no headers.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
        }
    }

    /// Create a head with headers.
    pub fn with_headers(status: StatusCode, headers: HeaderMap) -> Self {
        Self { status, headers }
    }

    /// Check if the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// A complete response delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status and headers
    pub head: ResponseHead,

    /// Response body
    pub body: Bytes,
}

impl Response {
    /// Create a new response.
    pub fn new(head: ResponseHead, body: impl Into<Bytes>) -> Self {
        Self {
            head,
            body: body.into(),
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    /// Check if response is successful (2xx).
    pub fn is_success(&self) -> bool {
        self.head.is_success()
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get the response body as a string.
    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }
}
