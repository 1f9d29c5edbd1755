//! Caller-side handles for logical requests

use crate::scheduler::ScheduledRetry;
use crate::task::{
    QueueSuspensionDecorator, RetryCancellationDecorator, TaskControl, TaskState,
    TaskStateController,
};
use std::fmt;
use std::sync::Arc;
use steadfast_core::{RequestError, RequestId, Response};
use tokio::sync::oneshot;

/// Controller stack every request is driven through.
pub(crate) type RequestControl =
    RetryCancellationDecorator<QueueSuspensionDecorator<Arc<TaskStateController>>>;

/// Cloneable control over one logical request.
///
/// Handles can be moved to other tasks to resume, suspend or cancel the
/// request while someone else awaits its response.
#[derive(Clone)]
pub struct RequestHandle {
    id: RequestId,
    control: Arc<RequestControl>,
}

impl RequestHandle {
    pub(crate) fn new(id: RequestId, control: Arc<RequestControl>) -> Self {
        Self { id, control }
    }

    /// Identity of the logical request.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Start the request, or continue it after a suspend.
    pub fn resume(&self) {
        self.control.resume();
    }

    /// Pause the request. Pending retries still count down but wait for a
    /// resume before dispatching.
    pub fn suspend(&self) {
        self.control.suspend();
    }

    /// Cancel the request, including any retry waiting out its delay.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.control.state()
    }

    pub(crate) fn controller(&self) -> &Arc<TaskStateController> {
        self.control.inner().inner()
    }

    pub(crate) fn set_pending(&self, retry: &Arc<ScheduledRetry>) {
        self.control.set_pending(retry);
    }

    pub(crate) fn clear_pending(&self) {
        self.control.clear_pending();
    }
}

impl TaskControl for RequestHandle {
    fn resume(&self) {
        RequestHandle::resume(self)
    }

    fn suspend(&self) {
        RequestHandle::suspend(self)
    }

    fn cancel(&self) {
        RequestHandle::cancel(self)
    }

    fn state(&self) -> TaskState {
        RequestHandle::state(self)
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Final outcome of a logical request.
#[derive(Debug, Clone)]
pub struct DataResponse {
    /// Logical request this outcome belongs to
    pub request_id: RequestId,

    /// The response, or the single terminal error
    pub result: Result<Response, RequestError>,

    /// Retries dispatched after the first attempt
    pub retry_count: u32,

    /// Attempts handed to the transport
    pub attempts: u32,
}

impl DataResponse {
    /// Check if the request ended with a response.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The response, if any.
    pub fn response(&self) -> Option<&Response> {
        self.result.as_ref().ok()
    }

    /// The terminal error, if any.
    pub fn error(&self) -> Option<&RequestError> {
        self.result.as_ref().err()
    }

    /// Discard bookkeeping and keep the result.
    pub fn into_result(self) -> Result<Response, RequestError> {
        self.result
    }
}

/// A logical request in flight.
///
/// Dropping a `DataRequest` does not cancel it; call
/// [`cancel`](Self::cancel) for that.
pub struct DataRequest {
    handle: RequestHandle,
    outcome: oneshot::Receiver<DataResponse>,
}

impl DataRequest {
    pub(crate) fn new(handle: RequestHandle, outcome: oneshot::Receiver<DataResponse>) -> Self {
        Self { handle, outcome }
    }

    /// Identity of the logical request.
    pub fn id(&self) -> RequestId {
        self.handle.id()
    }

    /// A cloneable control handle for this request.
    pub fn handle(&self) -> RequestHandle {
        self.handle.clone()
    }

    /// Start the request, or continue it after a suspend.
    pub fn resume(&self) {
        self.handle.resume();
    }

    /// Pause the request.
    pub fn suspend(&self) {
        self.handle.suspend();
    }

    /// Cancel the request.
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.handle.state()
    }

    /// Wait for the terminal outcome.
    ///
    /// If the driver stopped without reporting (for example because the
    /// runtime shut down), the request is reported as cancelled.
    pub async fn response(self) -> DataResponse {
        let request_id = self.handle.id();
        match self.outcome.await {
            Ok(response) => response,
            Err(_) => DataResponse {
                request_id,
                result: Err(RequestError::Cancelled),
                retry_count: 0,
                attempts: 0,
            },
        }
    }
}

impl fmt::Debug for DataRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataRequest")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}
