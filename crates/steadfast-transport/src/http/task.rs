//! A single HTTP request driven as a controllable task

use crate::error::classify_reqwest_error;
use crate::traits::{Completion, CompletionSlot, TaskId, TransportFailure, TransportOutcome, TransportTask};
use bytes::{Bytes, BytesMut};
use reqwest::Client as ReqwestClient;
use std::sync::{Arc, Mutex, MutexGuard};
use steadfast_core::{OutgoingRequest, Response, ResponseHead};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Running,
    Finished,
}

struct Control {
    phase: Phase,
    abort: Option<AbortHandle>,
}

struct Shared {
    client: Arc<ReqwestClient>,
    runtime: Handle,
    request: Mutex<Option<OutgoingRequest>>,
    completion: CompletionSlot,
    control: Mutex<Control>,
    paused: watch::Sender<bool>,
    received: Mutex<BytesMut>,
}

/// HTTP task backed by reqwest.
///
/// The request is spawned on the first `resume`. While suspended, the task
/// stops pulling body chunks; bytes already received are kept so that
/// [`TransportTask::cancel_producing_resume_data`] can hand them back.
pub struct HttpTask {
    id: TaskId,
    shared: Arc<Shared>,
}

impl HttpTask {
    pub(crate) fn new(
        client: Arc<ReqwestClient>,
        runtime: Handle,
        request: OutgoingRequest,
        completion: Completion,
    ) -> Self {
        let (paused, _) = watch::channel(true);
        Self {
            id: TaskId::new(),
            shared: Arc::new(Shared {
                client,
                runtime,
                request: Mutex::new(Some(request)),
                completion: CompletionSlot::new(completion),
                control: Mutex::new(Control {
                    phase: Phase::Created,
                    abort: None,
                }),
                paused,
                received: Mutex::new(BytesMut::new()),
            }),
        }
    }

    fn stop(&self) -> Option<Bytes> {
        {
            let mut control = lock(&self.shared.control);
            if control.phase == Phase::Finished {
                return None;
            }
            control.phase = Phase::Finished;
            if let Some(abort) = control.abort.take() {
                abort.abort();
            }
        }

        let partial = lock(&self.shared.received).split().freeze();
        if self.shared.completion.deliver(Err(TransportFailure::cancelled())) {
            tracing::debug!(task_id = %self.id, received = partial.len(), "HTTP task cancelled");
        }
        Some(partial)
    }
}

impl TransportTask for HttpTask {
    fn id(&self) -> TaskId {
        self.id
    }

    fn resume(&self) {
        let mut control = lock(&self.shared.control);
        match control.phase {
            Phase::Created => {
                let Some(request) = lock(&self.shared.request).take() else {
                    return;
                };
                control.phase = Phase::Running;
                self.shared.paused.send_replace(false);

                let shared = Arc::clone(&self.shared);
                let id = self.id;
                let handle = self.shared.runtime.spawn(async move {
                    tracing::debug!(
                        task_id = %id,
                        method = %request.method(),
                        url = %request.url(),
                        "HTTP task started"
                    );
                    let outcome = shared.execute(request).await;
                    lock(&shared.control).phase = Phase::Finished;
                    shared.completion.deliver(outcome);
                });
                control.abort = Some(handle.abort_handle());
            }
            Phase::Running => {
                self.shared.paused.send_replace(false);
            }
            Phase::Finished => {}
        }
    }

    fn suspend(&self) {
        if lock(&self.shared.control).phase == Phase::Running {
            self.shared.paused.send_replace(true);
        }
    }

    fn cancel(&self) {
        self.stop();
    }

    fn cancel_producing_resume_data(&self) -> Option<Bytes> {
        self.stop().filter(|partial| !partial.is_empty())
    }
}

impl Shared {
    async fn execute(&self, request: OutgoingRequest) -> TransportOutcome {
        let mut paused = self.paused.subscribe();
        wait_while_paused(&mut paused).await;

        let (method, url, headers, body) = request.into_parts();
        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let mut response = builder
            .send()
            .await
            .map_err(|e| TransportFailure::new(classify_reqwest_error(&e)))?;

        let head = ResponseHead::with_headers(response.status(), response.headers().clone());

        loop {
            wait_while_paused(&mut paused).await;
            match response.chunk().await {
                Ok(Some(chunk)) => lock(&self.received).extend_from_slice(&chunk),
                Ok(None) => break,
                Err(e) => {
                    return Err(TransportFailure::with_response(
                        classify_reqwest_error(&e),
                        head,
                    ));
                }
            }
        }

        let body = lock(&self.received).split().freeze();
        Ok(Response::new(head, body))
    }
}

async fn wait_while_paused(paused: &mut watch::Receiver<bool>) {
    while *paused.borrow_and_update() {
        if paused.changed().await.is_err() {
            break;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
