//! Per-request retry bookkeeping.

use crate::error::RequestError;
use crate::request::{OutgoingRequest, RequestId};
use crate::response::ResponseHead;

/// Attempt history of one logical request, as seen by retriers.
///
/// `retry_count` is the number of retries already dispatched: it is `0`
/// while the first attempt's failure is judged, and grows by exactly one each
/// time a retry is sent. It is never decremented.
#[derive(Debug, Clone)]
pub struct RetryContext {
    request_id: RequestId,
    request: OutgoingRequest,
    retry_count: u32,
    last_error: Option<RequestError>,
    last_response: Option<ResponseHead>,
}

impl RetryContext {
    /// Start tracking a logical request under a fresh id.
    pub fn new(request: OutgoingRequest) -> Self {
        Self::with_request_id(RequestId::new(), request)
    }

    /// Start tracking a logical request whose id is already known.
    pub fn with_request_id(request_id: RequestId, request: OutgoingRequest) -> Self {
        Self {
            request_id,
            request,
            retry_count: 0,
            last_error: None,
            last_response: None,
        }
    }

    /// Identity of the logical request.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// The request as it was last dispatched.
    pub fn request(&self) -> &OutgoingRequest {
        &self.request
    }

    /// Number of retries already dispatched.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Total attempts made so far, counting the one being judged.
    pub fn attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Failure of the most recent attempt.
    pub fn last_error(&self) -> Option<&RequestError> {
        self.last_error.as_ref()
    }

    /// Response head of the most recent attempt, if one arrived.
    pub fn last_response(&self) -> Option<&ResponseHead> {
        self.last_response.as_ref()
    }

    /// Record the request as adapted and dispatched.
    pub fn set_request(&mut self, request: OutgoingRequest) {
        self.request = request;
    }

    /// Record the outcome of the attempt that just failed.
    pub fn record_failure(&mut self, error: RequestError, response: Option<ResponseHead>) {
        self.last_error = Some(error);
        self.last_response = response;
    }

    /// Count a retry that is about to be dispatched.
    pub fn record_retry(&mut self) {
        self.retry_count = self.retry_count.saturating_add(1);
    }
}
