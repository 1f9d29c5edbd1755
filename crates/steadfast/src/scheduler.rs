//! Delayed retry scheduling
//!
//! A retry is a unit of work that runs once, either when its delay elapses or
//! immediately in a cancelled state when the request is cancelled first. The
//! take-once slot inside [`ScheduledRetry`] is the single point deciding which
//! of those two paths wins.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::AbortHandle;

/// Why scheduled retry work is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryFire {
    /// The delay elapsed normally
    Elapsed,
    /// The retry was cancelled before its delay elapsed
    Cancelled,
}

/// Work scheduled to run after a retry delay
pub type RetryWork = Box<dyn FnOnce(RetryFire) + Send + 'static>;

struct Slot {
    cancelled: bool,
    work: Option<RetryWork>,
    timer: Option<AbortHandle>,
}

/// Handle to pending retry work.
///
/// The work runs at most once, whichever of [`perform`](Self::perform) or
/// [`cancel_and_perform`](Self::cancel_and_perform) takes it first.
pub struct ScheduledRetry {
    slot: Mutex<Slot>,
}

impl ScheduledRetry {
    /// Wrap work that has not been scheduled on a timer yet.
    pub fn new(work: RetryWork) -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot {
                cancelled: false,
                work: Some(work),
                timer: None,
            }),
        })
    }

    /// Attach the timer driving this retry so cancellation can stop it.
    ///
    /// If the retry was already cancelled, the timer is aborted right away.
    pub fn set_timer(&self, timer: AbortHandle) {
        let mut slot = self.lock();
        if slot.cancelled || slot.work.is_none() {
            timer.abort();
        } else {
            slot.timer = Some(timer);
        }
    }

    /// Check if the retry has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Check if the work has already been taken to run.
    pub fn has_fired(&self) -> bool {
        self.lock().work.is_none()
    }

    /// Cancel the timer without running the work.
    pub fn cancel(&self) {
        let mut slot = self.lock();
        slot.cancelled = true;
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
    }

    /// Run the work now, in its current state, if it has not run yet.
    ///
    /// Returns `true` if this call ran the work.
    pub fn perform(&self) -> bool {
        let (work, fire) = {
            let mut slot = self.lock();
            let fire = if slot.cancelled {
                RetryFire::Cancelled
            } else {
                RetryFire::Elapsed
            };
            slot.timer = None;
            (slot.work.take(), fire)
        };
        match work {
            Some(work) => {
                work(fire);
                true
            }
            None => false,
        }
    }

    /// Cancel and, if the work has not run yet, run it now as cancelled.
    ///
    /// The check and the take happen under one lock, so a timer firing
    /// concurrently either wins entirely or not at all.
    pub fn cancel_and_perform(&self) -> bool {
        let work = {
            let mut slot = self.lock();
            slot.cancelled = true;
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
            slot.work.take()
        };
        match work {
            Some(work) => {
                work(RetryFire::Cancelled);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for ScheduledRetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.lock();
        f.debug_struct("ScheduledRetry")
            .field("cancelled", &slot.cancelled)
            .field("fired", &slot.work.is_none())
            .finish()
    }
}

/// Runs retry work after a delay.
pub trait RetryScheduler: Send + Sync {
    /// Schedule `work` to run once `delay` has elapsed.
    fn schedule(&self, delay: Duration, work: RetryWork) -> Arc<ScheduledRetry>;
}

/// Scheduler backed by tokio timers.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRetryScheduler;

impl TokioRetryScheduler {
    /// Create a scheduler
    pub fn new() -> Self {
        Self
    }
}

impl RetryScheduler for TokioRetryScheduler {
    fn schedule(&self, delay: Duration, work: RetryWork) -> Arc<ScheduledRetry> {
        let retry = ScheduledRetry::new(work);
        let timer_retry = Arc::clone(&retry);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            timer_retry.perform();
        });
        retry.set_timer(timer.abort_handle());
        retry
    }
}
