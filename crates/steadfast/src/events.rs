//! Task lifecycle events
//!
//! Controllers report what happens to their transport tasks through an
//! [`EventSink`] handed to them at construction. Sinks decide what to do with
//! the events: log them, forward them to a channel, or drop them.
//!
//! # Example
//!
//! ```rust
//! use steadfast::events::{ChannelEventSink, EventSink, TaskEvent, TaskEventKind};
//! use steadfast::{RequestId, TaskId};
//!
//! let (sink, mut events) = ChannelEventSink::channel();
//! sink.emit(&TaskEvent::new(TaskEventKind::DidResume, TaskId::new(), RequestId::new()));
//!
//! let event = events.try_recv().unwrap();
//! assert_eq!(event.name(), "task.didResume");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use steadfast_core::RequestId;
use steadfast_transport::TaskId;
use tokio::sync::mpsc;

/// Kind of lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskEventKind {
    /// A task was resumed
    #[serde(rename = "task.didResume")]
    DidResume,

    /// A task was suspended
    #[serde(rename = "task.didSuspend")]
    DidSuspend,

    /// A request was cancelled
    #[serde(rename = "task.didCancel")]
    DidCancel,

    /// A task finished, successfully or not
    #[serde(rename = "task.didComplete")]
    DidComplete,
}

impl TaskEventKind {
    /// Event name as published to subscribers
    pub fn name(self) -> &'static str {
        match self {
            TaskEventKind::DidResume => "task.didResume",
            TaskEventKind::DidSuspend => "task.didSuspend",
            TaskEventKind::DidCancel => "task.didCancel",
            TaskEventKind::DidComplete => "task.didComplete",
        }
    }
}

impl fmt::Display for TaskEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A lifecycle event for one transport task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvent {
    /// What happened
    pub kind: TaskEventKind,

    /// Task the event refers to
    pub task_id: TaskId,

    /// Logical request the task belongs to
    pub request_id: RequestId,
}

impl TaskEvent {
    /// Create an event
    pub fn new(kind: TaskEventKind, task_id: TaskId, request_id: RequestId) -> Self {
        Self {
            kind,
            task_id,
            request_id,
        }
    }

    /// Event name as published to subscribers
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Receiver of task lifecycle events.
///
/// Implemented for any `Fn(&TaskEvent)` closure.
pub trait EventSink: Send + Sync {
    /// Handle one event. Must not block.
    fn emit(&self, event: &TaskEvent);
}

impl<F> EventSink for F
where
    F: Fn(&TaskEvent) + Send + Sync,
{
    fn emit(&self, event: &TaskEvent) {
        self(event)
    }
}

/// Sink that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &TaskEvent) {}
}

/// Sink that logs events at debug level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &TaskEvent) {
        tracing::debug!(
            event = event.name(),
            task_id = %event.task_id,
            request_id = %event.request_id,
            "Task event"
        );
    }
}

/// Sink that forwards events to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<TaskEvent>,
}

impl ChannelEventSink {
    /// Wrap an existing sender
    pub fn new(sender: mpsc::UnboundedSender<TaskEvent>) -> Self {
        Self { sender }
    }

    /// Create a sink and the receiver that observes it
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TaskEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: &TaskEvent) {
        // Subscribers may go away; events are then dropped.
        let _ = self.sender.send(event.clone());
    }
}
