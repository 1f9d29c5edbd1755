//! Transport trait and task handle
//!
//! The resilience layer never performs I/O itself. It hands an
//! [`OutgoingRequest`] and a completion callback to a [`Transport`], receives a
//! [`TransportTask`] handle back, and drives that handle through
//! resume/suspend/cancel.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use steadfast_core::{OutgoingRequest, Response, ResponseHead, TransportError};
use uuid::Uuid;

/// Identity of one transport task (one attempt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh, random task id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The nil id, used when no task has been created yet.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Failure delivered to a task's completion callback.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportFailure {
    /// What went wrong
    pub error: TransportError,

    /// Response head, if one arrived before the failure
    pub response: Option<ResponseHead>,
}

impl TransportFailure {
    /// Failure with no response.
    pub fn new(error: TransportError) -> Self {
        Self {
            error,
            response: None,
        }
    }

    /// Failure after a response head arrived.
    pub fn with_response(error: TransportError, response: ResponseHead) -> Self {
        Self {
            error,
            response: Some(response),
        }
    }

    /// The failure reported when a task is cancelled.
    pub fn cancelled() -> Self {
        Self::new(TransportError::Cancelled)
    }
}

impl From<TransportError> for TransportFailure {
    fn from(error: TransportError) -> Self {
        Self::new(error)
    }
}

/// What a transport task eventually reports.
pub type TransportOutcome = std::result::Result<Response, TransportFailure>;

/// Callback invoked exactly once when a task finishes.
pub type Completion = Box<dyn FnOnce(TransportOutcome) + Send + 'static>;

/// Take-once holder for a [`Completion`].
///
/// Transports that race a natural finish against cancellation store the
/// callback here; whichever path delivers first wins and the other becomes a
/// no-op.
pub struct CompletionSlot {
    completion: Mutex<Option<Completion>>,
}

impl CompletionSlot {
    /// Wrap a completion callback.
    pub fn new(completion: Completion) -> Self {
        Self {
            completion: Mutex::new(Some(completion)),
        }
    }

    /// Deliver the outcome if nothing has been delivered yet.
    ///
    /// Returns `true` if this call invoked the callback.
    pub fn deliver(&self, outcome: TransportOutcome) -> bool {
        let completion = self
            .completion
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        match completion {
            Some(completion) => {
                completion(outcome);
                true
            }
            None => false,
        }
    }

    /// Check if the callback has already run.
    pub fn is_delivered(&self) -> bool {
        self.completion
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }
}

impl fmt::Debug for CompletionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSlot")
            .field("delivered", &self.is_delivered())
            .finish()
    }
}

/// Handle to one in-flight transport task.
///
/// Tasks are created suspended. Cancellation is cooperative: the task is
/// asked to stop and reports [`TransportError::Cancelled`] through its
/// completion, which may happen after `cancel` returns.
pub trait TransportTask: Send + Sync {
    /// Identity of this task.
    fn id(&self) -> TaskId;

    /// Start the task, or continue it after a suspend.
    fn resume(&self);

    /// Pause the task.
    fn suspend(&self);

    /// Ask the task to stop.
    fn cancel(&self);

    /// Cancel and return any partial body received so far.
    ///
    /// Transports that cannot resume downloads keep the default, which
    /// cancels and returns `None`.
    fn cancel_producing_resume_data(&self) -> Option<Bytes> {
        self.cancel();
        None
    }
}

/// Generic transport that turns requests into controllable tasks.
pub trait Transport: Send + Sync {
    /// Create a suspended task for `request`.
    ///
    /// `completion` must be invoked exactly once, whether the task succeeds,
    /// fails or is cancelled.
    fn create_task(&self, request: OutgoingRequest, completion: Completion) -> Arc<dyn TransportTask>;
}
