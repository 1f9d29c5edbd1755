//! Common test utilities and helpers

use bytes::Bytes;
use http::StatusCode;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use steadfast::{
    Completion, CompletionSlot, NetworkErrorCode, OutgoingRequest, Response, ResponseHead, TaskEvent,
    TaskEventKind, TaskId, Transport, TransportError, TransportFailure, TransportTask,
};

/// What the next transport task does once resumed
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Complete with this status and body
    Respond(u16, &'static str),
    /// Fail with a network error
    Fail(NetworkErrorCode),
    /// Never complete; only a cancel ends the task
    Hang,
    /// Never complete; a cancel hands back these bytes as resume data
    Partial(&'static [u8]),
    /// Wait for [`ScriptedTransport::release`]
    Held,
}

/// Transport that plays back a script, one step per created task.
///
/// Once the script runs out, every further task responds `200 ok`.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Step>>>,
    requests: Arc<Mutex<Vec<OutgoingRequest>>>,
    held: Arc<Mutex<VecDeque<Arc<ScriptedTask>>>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            requests: Arc::default(),
            held: Arc::default(),
        }
    }

    /// Complete the oldest held task with this status and body
    pub fn release(&self, status: u16, body: &'static str) {
        if let Some(task) = self.held.lock().unwrap().pop_front() {
            task.slot.deliver(Ok(respond(status, body)));
        }
    }

    /// Requests handed to the transport so far
    pub fn requests(&self) -> Vec<OutgoingRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn dispatch_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn create_task(&self, request: OutgoingRequest, completion: Completion) -> Arc<dyn TransportTask> {
        self.requests.lock().unwrap().push(request);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Respond(200, "ok"));
        let task = Arc::new(ScriptedTask {
            id: TaskId::new(),
            step,
            slot: CompletionSlot::new(completion),
        });
        if matches!(step, Step::Held) {
            self.held.lock().unwrap().push_back(Arc::clone(&task));
        }
        task
    }
}

struct ScriptedTask {
    id: TaskId,
    step: Step,
    slot: CompletionSlot,
}

impl TransportTask for ScriptedTask {
    fn id(&self) -> TaskId {
        self.id
    }

    fn resume(&self) {
        let outcome = match &self.step {
            Step::Respond(status, body) => Ok(respond(*status, body)),
            Step::Fail(code) => Err(TransportFailure::new(TransportError::network(*code, "scripted"))),
            Step::Hang | Step::Partial(_) | Step::Held => return,
        };
        self.slot.deliver(outcome);
    }

    fn suspend(&self) {}

    fn cancel(&self) {
        self.slot.deliver(Err(TransportFailure::cancelled()));
    }

    fn cancel_producing_resume_data(&self) -> Option<Bytes> {
        self.cancel();
        match &self.step {
            Step::Partial(data) => Some(Bytes::from_static(data)),
            _ => None,
        }
    }
}

fn respond(status: u16, body: &'static str) -> Response {
    let status = StatusCode::from_u16(status).unwrap();
    Response::new(ResponseHead::new(status), Bytes::from_static(body.as_bytes()))
}

/// Event sink that keeps everything it sees
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<TaskEvent>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind: TaskEventKind) -> usize {
        self.events.lock().unwrap().iter().filter(|e| e.kind == kind).count()
    }
}

impl steadfast::EventSink for RecordingSink {
    fn emit(&self, event: &TaskEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// A GET request to a placeholder URL
#[allow(dead_code)]
pub fn get(path: &str) -> OutgoingRequest {
    OutgoingRequest::parse(http::Method::GET, &format!("https://api.example.com{path}")).unwrap()
}
