//! Lifecycle control of one logical request's transport tasks

use super::gate::DispatchGate;
use crate::events::{EventSink, TaskEvent, TaskEventKind};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use steadfast_core::RequestId;
use steadfast_transport::{TaskId, TransportTask};

/// Lifecycle state of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Created, never resumed
    Idle,
    /// Resumed and allowed to make progress
    Running,
    /// Paused by the caller
    Suspended,
    /// Finished with a response or a terminal error
    Completed,
    /// Cancelled by the caller
    Cancelled,
}

impl TaskState {
    /// Check if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Idle => "idle",
            TaskState::Running => "running",
            TaskState::Suspended => "suspended",
            TaskState::Completed => "completed",
            TaskState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Caller-facing control over a request's lifecycle.
pub trait TaskControl: Send + Sync {
    /// Start or continue the request.
    fn resume(&self);

    /// Pause the request.
    fn suspend(&self);

    /// Cancel the request.
    fn cancel(&self);

    /// Current lifecycle state.
    fn state(&self) -> TaskState;
}

impl<T: TaskControl + ?Sized> TaskControl for Arc<T> {
    fn resume(&self) {
        (**self).resume()
    }

    fn suspend(&self) {
        (**self).suspend()
    }

    fn cancel(&self) {
        (**self).cancel()
    }

    fn state(&self) -> TaskState {
        (**self).state()
    }
}

/// Callback receiving the partial body captured when a download is cancelled
pub type ResumeDataCallback = Arc<dyn Fn(Option<Bytes>) + Send + Sync>;

/// Extra behavior run when a live task is cancelled.
#[derive(Clone, Default)]
pub enum CancelStrategy {
    /// Cancel the task, nothing else
    #[default]
    Plain,
    /// Cancel the task, capturing resume data and handing it to the callback
    /// before the cancel event fires
    ProduceResumeData(ResumeDataCallback),
}

impl fmt::Debug for CancelStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelStrategy::Plain => f.write_str("Plain"),
            CancelStrategy::ProduceResumeData(_) => f.write_str("ProduceResumeData"),
        }
    }
}

struct Inner {
    task: Option<Arc<dyn TransportTask>>,
    last_task_id: TaskId,
    state: TaskState,
    started_at: Option<DateTime<Utc>>,
    cancel_emitted: bool,
}

enum Action {
    Resume(Arc<dyn TransportTask>),
    Cancel(Arc<dyn TransportTask>),
    Nothing,
}

/// Controls the live transport task of one logical request.
///
/// A new task is attached for every attempt. Between attempts (while a
/// retry is pending) there is no live task; `resume` then only reopens the
/// dispatch gate and `suspend`/`cancel` only record the new state.
///
/// `task.didCancel` is emitted at most once per request, however many times
/// and through whichever path cancellation is observed.
pub struct TaskStateController {
    request_id: RequestId,
    sink: Arc<dyn EventSink>,
    gate: DispatchGate,
    strategy: CancelStrategy,
    inner: Mutex<Inner>,
}

impl TaskStateController {
    /// Create a controller in the `Idle` state.
    pub fn new(
        request_id: RequestId,
        sink: Arc<dyn EventSink>,
        gate: DispatchGate,
        strategy: CancelStrategy,
    ) -> Self {
        Self {
            request_id,
            sink,
            gate,
            strategy,
            inner: Mutex::new(Inner {
                task: None,
                last_task_id: TaskId::nil(),
                state: TaskState::Idle,
                started_at: None,
                cancel_emitted: false,
            }),
        }
    }

    /// Logical request this controller belongs to.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Gate that attempts wait on.
    pub fn gate(&self) -> &DispatchGate {
        &self.gate
    }

    /// Time the first task was resumed, if any.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lock().started_at
    }

    /// Task id of the live or most recent attempt, nil if none was created.
    pub fn last_task_id(&self) -> TaskId {
        self.lock().last_task_id
    }

    /// Check if the request has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.lock().state == TaskState::Cancelled
    }

    /// Take ownership of a new attempt's task.
    ///
    /// The task is resumed if the request is running, cancelled if the
    /// request was cancelled meanwhile, and left suspended otherwise.
    pub fn attach(&self, task: Arc<dyn TransportTask>) {
        let action = {
            let mut inner = self.lock();
            inner.last_task_id = task.id();
            inner.task = Some(Arc::clone(&task));
            match inner.state {
                TaskState::Running => {
                    inner.started_at.get_or_insert_with(Utc::now);
                    Action::Resume(task)
                }
                TaskState::Cancelled => {
                    inner.cancel_emitted = true;
                    Action::Cancel(task)
                }
                TaskState::Idle | TaskState::Suspended | TaskState::Completed => Action::Nothing,
            }
        };
        self.perform(action);
    }

    /// Record that the attempt running `task_id` has finished.
    pub fn complete_attempt(&self, task_id: TaskId) {
        {
            let mut inner = self.lock();
            if inner.task.as_ref().is_some_and(|task| task.id() == task_id) {
                inner.task = None;
            }
        }
        self.emit(TaskEventKind::DidComplete, task_id);
    }

    /// Mark the request finished, unless it was cancelled.
    pub fn finish(&self) {
        {
            let mut inner = self.lock();
            inner.task = None;
            if inner.state != TaskState::Cancelled {
                inner.state = TaskState::Completed;
            }
        }
        self.gate.shut();
    }

    /// Mark the request cancelled, emitting `task.didCancel` if nothing has yet.
    pub fn finish_cancelled(&self) {
        let emit = {
            let mut inner = self.lock();
            inner.task = None;
            inner.state = TaskState::Cancelled;
            let emit = !inner.cancel_emitted;
            inner.cancel_emitted = true;
            emit.then_some(inner.last_task_id)
        };
        self.gate.shut();
        if let Some(task_id) = emit {
            self.emit(TaskEventKind::DidCancel, task_id);
        }
    }

    fn perform(&self, action: Action) {
        match action {
            Action::Resume(task) => {
                task.resume();
                self.emit(TaskEventKind::DidResume, task.id());
            }
            Action::Cancel(task) => self.cancel_task(task),
            Action::Nothing => {}
        }
    }

    fn cancel_task(&self, task: Arc<dyn TransportTask>) {
        match &self.strategy {
            CancelStrategy::Plain => task.cancel(),
            CancelStrategy::ProduceResumeData(callback) => {
                callback(task.cancel_producing_resume_data());
            }
        }
        self.emit(TaskEventKind::DidCancel, task.id());
    }

    fn emit(&self, kind: TaskEventKind, task_id: TaskId) {
        self.sink.emit(&TaskEvent::new(kind, task_id, self.request_id));
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskControl for TaskStateController {
    fn resume(&self) {
        let action = {
            let mut inner = self.lock();
            let already_running = inner.state == TaskState::Running && inner.task.is_some();
            if inner.state.is_terminal() || already_running {
                return;
            }
            inner.state = TaskState::Running;
            match inner.task.clone() {
                Some(task) => {
                    inner.started_at.get_or_insert_with(Utc::now);
                    Action::Resume(task)
                }
                None => Action::Nothing,
            }
        };
        if matches!(action, Action::Nothing) {
            self.gate.open();
        }
        self.perform(action);
    }

    fn suspend(&self) {
        let task = {
            let mut inner = self.lock();
            if inner.state.is_terminal() {
                return;
            }
            inner.state = TaskState::Suspended;
            inner.task.clone()
        };
        if let Some(task) = task {
            task.suspend();
            self.emit(TaskEventKind::DidSuspend, task.id());
        }
    }

    fn cancel(&self) {
        let task = {
            let mut inner = self.lock();
            if inner.state.is_terminal() {
                return;
            }
            inner.state = TaskState::Cancelled;
            match inner.task.clone() {
                Some(task) => {
                    inner.cancel_emitted = true;
                    Some(task)
                }
                None => None,
            }
        };
        // Releases an attempt loop parked on a closed gate so it can observe
        // the cancellation.
        self.gate.shut();
        if let Some(task) = task {
            self.cancel_task(task);
        }
    }

    fn state(&self) -> TaskState {
        self.lock().state
    }
}

impl fmt::Debug for TaskStateController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("TaskStateController")
            .field("request_id", &self.request_id)
            .field("state", &inner.state)
            .field("live_task", &inner.task.as_ref().map(|task| task.id()))
            .field("strategy", &self.strategy)
            .finish()
    }
}
