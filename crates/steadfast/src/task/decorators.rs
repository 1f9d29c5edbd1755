//! Composable behavior layered over a [`TaskControl`]
//!
//! Each decorator wraps another controller by value, forwards every call to
//! it, and adds one cross-cutting behavior.

use super::controller::{TaskControl, TaskState};
use super::gate::DispatchGate;
use crate::scheduler::ScheduledRetry;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Ties a request's dispatch gate to its suspend/resume calls.
///
/// While suspended, no new attempt is dispatched. A retry whose delay elapses
/// meanwhile waits at the gate until the request is resumed.
#[derive(Debug)]
pub struct QueueSuspensionDecorator<C> {
    inner: C,
    gate: DispatchGate,
}

impl<C: TaskControl> QueueSuspensionDecorator<C> {
    /// Wrap `inner`, driving `gate`.
    pub fn new(inner: C, gate: DispatchGate) -> Self {
        Self { inner, gate }
    }

    /// Wrapped controller.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: TaskControl> TaskControl for QueueSuspensionDecorator<C> {
    fn resume(&self) {
        self.inner.resume();
        self.gate.open();
    }

    fn suspend(&self) {
        self.inner.suspend();
        self.gate.close();
    }

    fn cancel(&self) {
        self.inner.cancel();
    }

    fn state(&self) -> TaskState {
        self.inner.state()
    }
}

/// Makes cancellation reach a retry that is waiting out its delay.
///
/// Holds a weak reference to the pending [`ScheduledRetry`], present only
/// while a delay is running. On `cancel`, the wrapped controller is cancelled
/// first; then the pending work, if it has not fired yet, is run immediately
/// in its cancelled state so the request reaches exactly one terminal outcome.
pub struct RetryCancellationDecorator<C> {
    inner: C,
    pending: Mutex<Option<Weak<ScheduledRetry>>>,
}

impl<C: TaskControl> RetryCancellationDecorator<C> {
    /// Wrap `inner` with no pending retry.
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            pending: Mutex::new(None),
        }
    }

    /// Wrapped controller.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Track the retry that is now waiting out its delay.
    pub fn set_pending(&self, retry: &Arc<ScheduledRetry>) {
        *self.lock() = Some(Arc::downgrade(retry));
    }

    /// Forget the pending retry once it has fired.
    pub fn clear_pending(&self) {
        *self.lock() = None;
    }

    /// Check if a retry is currently tracked and still alive.
    pub fn has_pending(&self) -> bool {
        self.lock().as_ref().is_some_and(|weak| weak.strong_count() > 0)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Weak<ScheduledRetry>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<C: TaskControl> TaskControl for RetryCancellationDecorator<C> {
    fn resume(&self) {
        self.inner.resume();
    }

    fn suspend(&self) {
        self.inner.suspend();
    }

    fn cancel(&self) {
        self.inner.cancel();

        let pending = self.lock().take().and_then(|weak| weak.upgrade());
        if let Some(retry) = pending
            && retry.cancel_and_perform()
        {
            tracing::debug!("Cancelled pending retry before its delay elapsed");
        }
    }

    fn state(&self) -> TaskState {
        self.inner.state()
    }
}

impl<C: TaskControl + fmt::Debug> fmt::Debug for RetryCancellationDecorator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryCancellationDecorator")
            .field("inner", &self.inner)
            .field("pending_retry", &self.has_pending())
            .finish()
    }
}
