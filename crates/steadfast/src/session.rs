//! Sessions drive logical requests through adapt, dispatch and retry
//!
//! Each request gets its own controller stack and a driver task spawned on
//! the current tokio runtime. The driver runs attempts strictly one after
//! another:
//!
//! 1. wait for the dispatch gate, stop if cancelled
//! 2. adapt the request through the interceptor (a failure is terminal)
//! 3. create a transport task, attach it to the controller, await completion
//! 4. accept a 2xx response, or turn the outcome into a [`RequestError`]
//! 5. consult the retriers and either finish or schedule the next attempt

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::{EventSink, TracingEventSink};
use crate::observability::{AttemptMetadata, AttemptTimer};
use crate::request::{DataRequest, DataResponse, RequestHandle};
use crate::scheduler::{RetryFire, RetryScheduler, TokioRetryScheduler};
use crate::task::{
    CancelStrategy, DispatchGate, QueueSuspensionDecorator, RetryCancellationDecorator,
    TaskStateController,
};
use bytes::Bytes;
use http::HeaderMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use steadfast_core::{
    Adapter, Interceptor, OutgoingRequest, RequestError, RequestId, Response, Retrier,
    RetryContext, RetryDecision, TransportError,
};
use steadfast_transport::{HttpTransport, Transport, TransportFailure};
use tokio::sync::oneshot;
use tracing::Instrument;

struct SessionInner {
    transport: Arc<dyn Transport>,
    interceptor: Interceptor,
    scheduler: Arc<dyn RetryScheduler>,
    event_sink: Arc<dyn EventSink>,
    config: SessionConfig,
    default_headers: HeaderMap,
}

/// Entry point for issuing resilient requests.
///
/// Cheap to clone; clones share the transport, interceptor and scheduler.
///
/// # Examples
///
/// ```rust,no_run
/// use steadfast::{OutgoingRequest, Session};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder().build()?;
/// let request = OutgoingRequest::parse(http::Method::GET, "https://example.com/items")?;
///
/// let response = session.request(request).response().await;
/// println!("{} retries", response.retry_count);
/// let body = response.into_result()?;
/// println!("{}", body.text()?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a session over `transport` with default settings.
    pub fn new(transport: impl Transport + 'static) -> Result<Self> {
        Self::builder().transport(transport).build()
    }

    /// Start building a session.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Effective interceptor, including the built-in retry policy if enabled.
    pub fn interceptor(&self) -> &Interceptor {
        &self.inner.interceptor
    }

    /// Issue a request through the session's interceptor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&self, request: OutgoingRequest) -> DataRequest {
        self.start(request, self.inner.interceptor.clone(), CancelStrategy::Plain)
    }

    /// Issue a request with an additional per-request interceptor.
    ///
    /// Session adapters run before the request's adapters. The request's
    /// retriers are consulted before the session's.
    pub fn request_with(&self, request: OutgoingRequest, interceptor: Interceptor) -> DataRequest {
        let combined = self.combine(&interceptor);
        self.start(request, combined, CancelStrategy::Plain)
    }

    /// Issue a download whose partial body is handed to `on_resume_data`
    /// when it is cancelled mid-transfer.
    pub fn download<F>(&self, request: OutgoingRequest, on_resume_data: F) -> DataRequest
    where
        F: Fn(Option<Bytes>) + Send + Sync + 'static,
    {
        self.start(
            request,
            self.inner.interceptor.clone(),
            CancelStrategy::ProduceResumeData(Arc::new(on_resume_data)),
        )
    }

    fn combine(&self, request: &Interceptor) -> Interceptor {
        let session = &self.inner.interceptor;
        let adapters = session
            .adapters()
            .iter()
            .chain(request.adapters())
            .cloned()
            .collect();
        let retriers = request
            .retriers()
            .iter()
            .chain(session.retriers())
            .cloned()
            .collect();
        Interceptor::from_parts(
            format!("{}+{}", session.name(), request.name()),
            adapters,
            retriers,
        )
    }

    fn start(
        &self,
        mut request: OutgoingRequest,
        interceptor: Interceptor,
        strategy: CancelStrategy,
    ) -> DataRequest {
        for (name, value) in &self.inner.default_headers {
            if !request.headers().contains_key(name) {
                request.headers_mut().insert(name.clone(), value.clone());
            }
        }

        let request_id = RequestId::new();
        let gate = DispatchGate::closed();
        let controller = Arc::new(TaskStateController::new(
            request_id,
            Arc::clone(&self.inner.event_sink),
            gate.clone(),
            strategy,
        ));
        let control =
            RetryCancellationDecorator::new(QueueSuspensionDecorator::new(controller, gate));
        let handle = RequestHandle::new(request_id, Arc::new(control));

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let driver = Driver {
            session: Arc::clone(&self.inner),
            handle: handle.clone(),
            interceptor,
            request,
        };
        let span = tracing::debug_span!("request", request_id = %request_id);
        tokio::spawn(
            async move {
                let response = driver.run().await;
                let _ = outcome_tx.send(response);
            }
            .instrument(span),
        );

        if self.inner.config.start_requests_immediately {
            handle.resume();
        }
        DataRequest::new(handle, outcome_rx)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("interceptor", &self.inner.interceptor)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    transport: Option<Arc<dyn Transport>>,
    interceptor: Interceptor,
    scheduler: Arc<dyn RetryScheduler>,
    event_sink: Arc<dyn EventSink>,
    config: SessionConfig,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            transport: None,
            interceptor: Interceptor::new("session"),
            scheduler: Arc::new(TokioRetryScheduler::new()),
            event_sink: Arc::new(TracingEventSink),
            config: SessionConfig::default(),
        }
    }
}

impl SessionBuilder {
    /// Set the transport.
    ///
    /// Default: an [`HttpTransport`] with default settings.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Set a transport that is shared with other owners.
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the session interceptor.
    ///
    /// The built-in retry policy, if enabled, is appended after its retriers.
    pub fn interceptor(mut self, interceptor: Interceptor) -> Self {
        self.interceptor = interceptor;
        self
    }

    /// Append an adapter to the session interceptor.
    pub fn adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.interceptor.push_adapter(Arc::new(adapter));
        self
    }

    /// Append a retrier to the session interceptor.
    pub fn retrier(mut self, retrier: impl Retrier + 'static) -> Self {
        self.interceptor.push_retrier(Arc::new(retrier));
        self
    }

    /// Set the retry scheduler.
    ///
    /// Default: [`TokioRetryScheduler`].
    pub fn scheduler(mut self, scheduler: impl RetryScheduler + 'static) -> Self {
        self.scheduler = Arc::new(scheduler);
        self
    }

    /// Set the lifecycle event sink.
    ///
    /// Default: [`TracingEventSink`].
    pub fn event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.event_sink = Arc::new(sink);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the session.
    ///
    /// # Errors
    ///
    /// Fails if the retry configuration or default headers are invalid, or
    /// if no transport was set and the default HTTP transport cannot be
    /// created (for example outside a tokio runtime).
    pub fn build(self) -> Result<Session> {
        let mut interceptor = self.interceptor;
        if self.config.retry.enabled {
            interceptor.push_retrier(Arc::new(self.config.retry_policy()?));
        }
        let default_headers = self.config.header_map()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new().map_err(Error::from)?),
        };

        Ok(Session {
            inner: Arc::new(SessionInner {
                transport,
                interceptor,
                scheduler: self.scheduler,
                event_sink: self.event_sink,
                config: self.config,
                default_headers,
            }),
        })
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("has_transport", &self.transport.is_some())
            .field("interceptor", &self.interceptor)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct Driver {
    session: Arc<SessionInner>,
    handle: RequestHandle,
    interceptor: Interceptor,
    request: OutgoingRequest,
}

impl Driver {
    async fn run(self) -> DataResponse {
        let request_id = self.handle.id();
        let controller = Arc::clone(self.handle.controller());
        let timer = AttemptTimer::start();
        let mut context = RetryContext::with_request_id(request_id, self.request.clone());
        let mut metadata = AttemptMetadata::new(request_id, &self.request, 1);
        let mut attempts = 0u32;

        let result: std::result::Result<Response, RequestError> = loop {
            controller.gate().wait().await;
            if controller.is_cancelled() {
                break Err(RequestError::Cancelled);
            }

            let adapted = match self.interceptor.adapt(self.request.clone()).await {
                Ok(adapted) => adapted,
                Err(err) => break Err(RequestError::Adaptation(err)),
            };
            if controller.is_cancelled() {
                break Err(RequestError::Cancelled);
            }

            if attempts > 0 {
                context.record_retry();
            }
            attempts += 1;
            metadata = AttemptMetadata::new(request_id, &adapted, attempts);
            context.set_request(adapted.clone());

            let (done_tx, done_rx) = oneshot::channel();
            let task = self.session.transport.create_task(
                adapted,
                Box::new(move |outcome| {
                    let _ = done_tx.send(outcome);
                }),
            );
            let task_id = task.id();
            metadata.log_dispatch(task_id);
            controller.attach(task);

            let outcome = done_rx.await.unwrap_or_else(|_| {
                Err(TransportFailure::new(TransportError::Other(
                    "transport dropped the task without completing it".to_string(),
                )))
            });
            controller.complete_attempt(task_id);
            // A cancel that raced the completion wins over the response.
            if controller.is_cancelled() {
                break Err(RequestError::Cancelled);
            }

            let (error, head) = match outcome {
                Ok(response) if response.is_success() || !self.session.config.validate_status => {
                    break Ok(response);
                }
                Ok(response) => (
                    RequestError::ResponseStatus {
                        status: response.status().as_u16(),
                    },
                    Some(response.head),
                ),
                Err(failure) => (RequestError::Transport(failure.error), failure.response),
            };
            if error.is_cancelled() {
                break Err(RequestError::Cancelled);
            }

            context.record_failure(error.clone(), head);
            let decision = self.interceptor.retry(&context, &error).await;
            metadata.log_decision(context.retry_count(), &error, &decision);
            if controller.is_cancelled() {
                break Err(RequestError::Cancelled);
            }

            let delay = match decision {
                RetryDecision::RetryNow => Duration::ZERO,
                RetryDecision::RetryAfter(delay) => delay,
                RetryDecision::DoNotRetry => break Err(error),
                RetryDecision::DoNotRetryWithError(err) => break Err(RequestError::Retrier(err)),
            };

            if self.wait_for_retry(&controller, delay).await == RetryFire::Cancelled {
                break Err(RequestError::Cancelled);
            }
        };

        let retry_count = context.retry_count();
        match &result {
            Ok(response) => {
                controller.finish();
                metadata.log_success(response.status().as_u16(), retry_count, timer.elapsed());
            }
            Err(err) => {
                if err.is_cancelled() {
                    controller.finish_cancelled();
                } else {
                    controller.finish();
                }
                metadata.log_failure(err, retry_count, timer.elapsed());
            }
        }

        DataResponse {
            request_id,
            result,
            retry_count,
            attempts,
        }
    }

    async fn wait_for_retry(&self, controller: &Arc<TaskStateController>, delay: Duration) -> RetryFire {
        let (fire_tx, fire_rx) = oneshot::channel();
        let on_fire = Arc::clone(controller);
        let retry = self.session.scheduler.schedule(
            delay,
            Box::new(move |fire| {
                if fire == RetryFire::Cancelled {
                    on_fire.finish_cancelled();
                }
                let _ = fire_tx.send(fire);
            }),
        );
        self.handle.set_pending(&retry);

        // A cancel that landed before the retry was registered never saw it.
        if controller.is_cancelled() {
            retry.cancel_and_perform();
        }

        let fire = fire_rx.await.unwrap_or(RetryFire::Cancelled);
        self.handle.clear_pending();
        drop(retry);
        fire
    }
}
