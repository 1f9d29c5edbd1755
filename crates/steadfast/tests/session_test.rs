//! Session lifecycle tests against a scripted transport
//!
//! Time is paused in these tests, so backoff delays elapse instantly once
//! every task is idle.

mod common;

use bytes::Bytes;
use common::{RecordingSink, ScriptedTransport, Step, get};
use rstest::rstest;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use steadfast::{
    AdaptationError, BearerAuth, Interceptor, NetworkErrorCode, OutgoingRequest, RequestError,
    RetrierError, RetryContext, RetryDecision, Session, SessionConfig, TaskEventKind, TaskState,
    TransportError, adapter_fn, retrier_fn,
};
use tokio::time::Instant;

fn session(transport: &ScriptedTransport, sink: &RecordingSink, config: SessionConfig) -> Session {
    Session::builder()
        .transport(transport.clone())
        .event_sink(sink.clone())
        .config(config)
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_retries_until_success() {
    let transport = ScriptedTransport::new([
        Step::Respond(503, "busy"),
        Step::Fail(NetworkErrorCode::TimedOut),
        Step::Respond(200, "done"),
    ]);
    let sink = RecordingSink::default();
    let session = session(&transport, &sink, SessionConfig::default());

    let started = Instant::now();
    let response = session.request(get("/items")).response().await;

    assert!(response.is_success());
    assert_eq!(response.response().unwrap().text().unwrap(), "done");
    assert_eq!(response.retry_count, 2);
    assert_eq!(response.attempts, 3);
    assert_eq!(transport.dispatch_count(), 3);
    // 0.5s then 1s of backoff
    assert!(started.elapsed() >= Duration::from_millis(1500));
    assert_eq!(sink.count(TaskEventKind::DidComplete), 3);
    assert_eq!(sink.count(TaskEventKind::DidCancel), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_surface_last_error() {
    let transport = ScriptedTransport::new([
        Step::Respond(503, ""),
        Step::Respond(503, ""),
        Step::Respond(503, ""),
        Step::Respond(200, "too late"),
    ]);
    let session = session(&transport, &RecordingSink::default(), SessionConfig::default());

    let request = session.request(get("/items"));
    let handle = request.handle();
    let response = request.response().await;

    assert_eq!(response.error(), Some(&RequestError::ResponseStatus { status: 503 }));
    assert_eq!(response.retry_count, 2);
    assert_eq!(response.attempts, 3);
    assert_eq!(transport.dispatch_count(), 3);
    assert_eq!(handle.state(), TaskState::Completed);
}

#[rstest]
#[case::post_is_not_idempotent(http::Method::POST, Step::Respond(503, ""))]
#[case::client_error(http::Method::GET, Step::Respond(404, ""))]
#[case::permanent_network_error(http::Method::GET, Step::Fail(NetworkErrorCode::BadUrl))]
#[tokio::test(start_paused = true)]
async fn test_non_retryable_failures_end_after_one_attempt(
    #[case] method: http::Method,
    #[case] step: Step,
) {
    let transport = ScriptedTransport::new([step]);
    let session = session(&transport, &RecordingSink::default(), SessionConfig::default());

    let request = OutgoingRequest::parse(method, "https://api.example.com/items").unwrap();
    let response = session.request(request).response().await;

    assert!(!response.is_success());
    assert_eq!(response.attempts, 1);
    assert_eq!(response.retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_network_error_surfaces_code() {
    let transport = ScriptedTransport::new([Step::Fail(NetworkErrorCode::CannotFindHost); 3]);
    let session = session(&transport, &RecordingSink::default(), SessionConfig::default());

    let response = session.request(get("/")).response().await;

    let error = response.error().unwrap();
    assert_eq!(error.network_code(), Some(NetworkErrorCode::CannotFindHost));
    assert_eq!(response.attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn test_validate_status_disabled_accepts_error_responses() {
    let transport = ScriptedTransport::new([Step::Respond(503, "maintenance")]);
    let mut config = SessionConfig::default();
    config.validate_status = false;
    let session = session(&transport, &RecordingSink::default(), config);

    let response = session.request(get("/")).response().await;

    let body = response.into_result().unwrap();
    assert_eq!(body.status().as_u16(), 503);
    assert_eq!(body.text().unwrap(), "maintenance");
    assert_eq!(transport.dispatch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_adaptation_failure_is_terminal() {
    let transport = ScriptedTransport::default();
    let retried = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&retried);
    let session = Session::builder()
        .transport(transport.clone())
        .adapter(adapter_fn(|_request: OutgoingRequest| async {
            Err::<OutgoingRequest, _>(AdaptationError::Signing("no credentials".into()))
        }))
        .retrier(retrier_fn(move |_ctx: RetryContext, _err: RequestError| {
            *counter.lock().unwrap() += 1;
            async { RetryDecision::RetryNow }
        }))
        .build()
        .unwrap();

    let response = session.request(get("/")).response().await;

    assert!(matches!(response.error(), Some(RequestError::Adaptation(_))));
    assert_eq!(response.attempts, 0);
    assert_eq!(transport.dispatch_count(), 0);
    assert_eq!(*retried.lock().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retrier_can_replace_the_error() {
    let transport = ScriptedTransport::new([Step::Respond(503, "")]);
    let session = Session::builder()
        .transport(transport.clone())
        .retrier(retrier_fn(|_ctx: RetryContext, _err: RequestError| async {
            RetryDecision::DoNotRetryWithError(RetrierError::msg("quota exhausted"))
        }))
        .build()
        .unwrap();

    let response = session.request(get("/")).response().await;

    match response.error() {
        Some(RequestError::Retrier(err)) => assert_eq!(err.to_string(), "quota exhausted"),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(transport.dispatch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_retry_delay_emits_one_cancel() {
    let transport = ScriptedTransport::new([Step::Respond(503, "")]);
    let sink = RecordingSink::default();
    let mut config = SessionConfig::default();
    config.retry.scale = 30.0;
    let session = session(&transport, &sink, config);

    let request = session.request(get("/slow"));
    let handle = request.handle();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(transport.dispatch_count(), 1);

    let cancelled_at = Instant::now();
    handle.cancel();
    handle.cancel();
    let response = request.response().await;

    assert_eq!(response.error(), Some(&RequestError::Cancelled));
    assert_eq!(response.attempts, 1);
    assert_eq!(response.retry_count, 0);
    assert!(cancelled_at.elapsed() < Duration::from_secs(30));
    assert_eq!(handle.state(), TaskState::Cancelled);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.dispatch_count(), 1);
    assert_eq!(sink.count(TaskEventKind::DidCancel), 1);

    let events = sink.events();
    let completed = events.iter().find(|e| e.kind == TaskEventKind::DidComplete).unwrap();
    let cancelled = events.iter().find(|e| e.kind == TaskEventKind::DidCancel).unwrap();
    assert_eq!(cancelled.task_id, completed.task_id);
    assert_eq!(cancelled.request_id, response.request_id);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_in_flight() {
    let transport = ScriptedTransport::new([Step::Hang]);
    let sink = RecordingSink::default();
    let session = session(&transport, &sink, SessionConfig::default());

    let request = session.request(get("/hang"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    request.cancel();
    let response = request.response().await;

    assert_eq!(response.error(), Some(&RequestError::Cancelled));
    assert_eq!(response.attempts, 1);
    assert_eq!(sink.count(TaskEventKind::DidResume), 1);
    assert_eq!(sink.count(TaskEventKind::DidCancel), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_start_emits_one_cancel() {
    let transport = ScriptedTransport::default();
    let sink = RecordingSink::default();
    let mut config = SessionConfig::default();
    config.start_requests_immediately = false;
    let session = session(&transport, &sink, config);

    let request = session.request(get("/"));
    request.cancel();
    let response = request.response().await;

    assert_eq!(response.error(), Some(&RequestError::Cancelled));
    assert_eq!(transport.dispatch_count(), 0);
    assert_eq!(sink.count(TaskEventKind::DidCancel), 1);
}

#[tokio::test(start_paused = true)]
async fn test_download_cancel_hands_back_resume_data() {
    let transport = ScriptedTransport::new([Step::Partial(b"first half")]);
    let session = session(&transport, &RecordingSink::default(), SessionConfig::default());

    let captured: Arc<Mutex<Vec<Option<Bytes>>>> = Arc::default();
    let sink = Arc::clone(&captured);
    let request = session.download(get("/archive.tar"), move |data| {
        sink.lock().unwrap().push(data);
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    request.cancel();
    let response = request.response().await;

    assert_eq!(response.error(), Some(&RequestError::Cancelled));
    assert_eq!(
        *captured.lock().unwrap(),
        vec![Some(Bytes::from_static(b"first half"))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_deferred_start_waits_for_resume() {
    let transport = ScriptedTransport::default();
    let mut config = SessionConfig::default();
    config.start_requests_immediately = false;
    let session = session(&transport, &RecordingSink::default(), config);

    let request = session.request(get("/"));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.dispatch_count(), 0);
    assert_eq!(request.state(), TaskState::Idle);

    request.resume();
    let response = request.response().await;
    assert!(response.is_success());
    assert_eq!(transport.dispatch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_suspend_holds_elapsed_retry_until_resume() {
    let transport = ScriptedTransport::new([Step::Respond(503, "")]);
    let session = session(&transport, &RecordingSink::default(), SessionConfig::default());

    let request = session.request(get("/"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    request.suspend();
    assert_eq!(request.state(), TaskState::Suspended);

    // The 0.5s backoff elapses while suspended.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.dispatch_count(), 1);

    request.resume();
    let response = request.response().await;
    assert!(response.is_success());
    assert_eq!(response.attempts, 2);
    assert_eq!(response.retry_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_suspended_after_backoff_counts_no_retry() {
    let transport = ScriptedTransport::new([Step::Respond(503, "")]);
    let session = session(&transport, &RecordingSink::default(), SessionConfig::default());

    let request = session.request(get("/"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    request.suspend();
    tokio::time::sleep(Duration::from_secs(5)).await;
    request.cancel();
    let response = request.response().await;

    assert_eq!(response.error(), Some(&RequestError::Cancelled));
    assert_eq!(transport.dispatch_count(), 1);
    assert_eq!(response.attempts, 1);
    assert_eq!(response.retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_adapter_failure_on_retry_counts_no_retry() {
    let transport = ScriptedTransport::new([Step::Respond(503, "")]);
    let calls = Arc::new(Mutex::new(0u32));
    let adapter_calls = Arc::clone(&calls);
    let session = Session::builder()
        .transport(transport.clone())
        .adapter(adapter_fn(move |request: OutgoingRequest| {
            let call = {
                let mut calls = adapter_calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            async move {
                if call == 1 {
                    Ok(request)
                } else {
                    Err(AdaptationError::Signing("expired".into()))
                }
            }
        }))
        .build()
        .unwrap();

    let response = session.request(get("/")).response().await;

    assert!(matches!(response.error(), Some(RequestError::Adaptation(_))));
    assert_eq!(transport.dispatch_count(), 1);
    assert_eq!(response.attempts, 1);
    assert_eq!(response.retry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_racing_a_delivered_response_wins() {
    let transport = ScriptedTransport::new([Step::Held]);
    let sink = RecordingSink::default();
    let session = session(&transport, &sink, SessionConfig::default());

    let request = session.request(get("/"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(transport.dispatch_count(), 1);

    // Both land before the attempt loop runs again.
    transport.release(200, "late");
    request.cancel();
    let handle = request.handle();
    let response = request.response().await;

    assert_eq!(response.error(), Some(&RequestError::Cancelled));
    assert_eq!(handle.state(), TaskState::Cancelled);
    assert_eq!(sink.count(TaskEventKind::DidCancel), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cancels_during_backoff_emit_one_cancel() {
    let sink = RecordingSink::default();
    let mut config = SessionConfig::default();
    config.retry.scale = 0.002;

    for _ in 0..200 {
        let transport = ScriptedTransport::new([Step::Respond(503, "")]);
        let session = session(&transport, &sink, config.clone());

        let request = session.request(get("/"));
        while transport.dispatch_count() == 0 {
            tokio::task::yield_now().await;
        }

        let first = request.handle();
        let second = request.handle();
        let racers = [
            tokio::spawn(async move { first.cancel() }),
            tokio::spawn(async move { second.cancel() }),
        ];
        let response = request.response().await;
        for racer in racers {
            racer.await.unwrap();
        }

        let cancels = sink
            .events()
            .iter()
            .filter(|e| e.request_id == response.request_id && e.kind == TaskEventKind::DidCancel)
            .count();
        if response.error() == Some(&RequestError::Cancelled) {
            assert_eq!(cancels, 1);
        } else {
            assert!(response.is_success());
            assert_eq!(cancels, 0);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_request_interceptor_order() {
    let transport = ScriptedTransport::new([Step::Respond(503, "")]);
    let order = Arc::new(Mutex::new(Vec::new()));
    let session_order = Arc::clone(&order);
    let mut config = SessionConfig::default();
    config.retry.enabled = false;

    let session = Session::builder()
        .transport(transport.clone())
        .config(config)
        .adapter(adapter_fn(|request: OutgoingRequest| async move {
            request.with_header("x-chain", "session")
        }))
        .retrier(retrier_fn(move |_ctx: RetryContext, _err: RequestError| {
            session_order.lock().unwrap().push("session");
            async { RetryDecision::DoNotRetry }
        }))
        .build()
        .unwrap();

    let request_order = Arc::clone(&order);
    let per_request = Interceptor::new("call")
        .with_adapter(adapter_fn(|request: OutgoingRequest| async move {
            let seen = request.header("x-chain").unwrap_or_default().to_string();
            request.with_header("x-chain", format!("{seen},request"))
        }))
        .with_retrier(retrier_fn(move |_ctx: RetryContext, _err: RequestError| {
            request_order.lock().unwrap().push("request");
            async { RetryDecision::DoNotRetry }
        }));

    let response = session.request_with(get("/"), per_request).response().await;

    assert!(!response.is_success());
    assert_eq!(transport.requests()[0].header("x-chain"), Some("session,request"));
    assert_eq!(*order.lock().unwrap(), vec!["request", "session"]);
}

#[tokio::test(start_paused = true)]
async fn test_default_headers_do_not_override_request_headers() {
    let transport = ScriptedTransport::default();
    let mut config = SessionConfig::default();
    config.default_headers.insert("x-client".into(), "steadfast".into());
    config.default_headers.insert("accept".into(), "application/json".into());
    let session = session(&transport, &RecordingSink::default(), config);

    let request = get("/").with_header("accept", "text/plain").unwrap();
    session.request(request).response().await;

    let sent = &transport.requests()[0];
    assert_eq!(sent.header("x-client"), Some("steadfast"));
    assert_eq!(sent.header("accept"), Some("text/plain"));
}

#[tokio::test(start_paused = true)]
async fn test_bearer_auth_refreshes_on_unauthorized() {
    let transport = ScriptedTransport::new([Step::Respond(401, ""), Step::Respond(200, "secret")]);
    let auth = BearerAuth::new("expired").with_refresher(|| async {
        Ok::<_, RetrierError>(secrecy::SecretString::new("renewed".into()))
    });
    let session = Session::builder()
        .transport(transport.clone())
        .interceptor(auth.into_interceptor())
        .build()
        .unwrap();

    let response = session.request(get("/me")).response().await;

    assert!(response.is_success());
    assert_eq!(response.retry_count, 1);
    let sent = transport.requests();
    assert_eq!(sent[0].header("authorization"), Some("Bearer expired"));
    assert_eq!(sent[1].header("authorization"), Some("Bearer renewed"));
}

#[tokio::test(start_paused = true)]
async fn test_bearer_auth_gives_up_after_second_unauthorized() {
    let transport = ScriptedTransport::new([Step::Respond(401, ""); 4]);
    let auth = BearerAuth::new("expired").with_refresher(|| async {
        Ok::<_, RetrierError>(secrecy::SecretString::new("still-bad".into()))
    });
    let session = Session::builder()
        .transport(transport.clone())
        .interceptor(auth.into_interceptor())
        .build()
        .unwrap();

    let response = session.request(get("/me")).response().await;

    assert_eq!(response.error(), Some(&RequestError::ResponseStatus { status: 401 }));
    assert_eq!(transport.dispatch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_events_for_a_successful_request() {
    let transport = ScriptedTransport::default();
    let sink = RecordingSink::default();
    let session = session(&transport, &sink, SessionConfig::default());

    let response = session.request(get("/")).response().await;
    assert!(response.is_success());

    let kinds: Vec<_> = sink.events().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![TaskEventKind::DidResume, TaskEventKind::DidComplete]);
    assert!(sink.events().iter().all(|e| e.request_id == response.request_id));
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_is_reported_as_transport() {
    let transport = ScriptedTransport::new([Step::Fail(NetworkErrorCode::ClientCertificateRejected)]);
    let session = session(&transport, &RecordingSink::default(), SessionConfig::default());

    let response = session.request(get("/")).response().await;

    assert!(matches!(
        response.error(),
        Some(RequestError::Transport(TransportError::Network { .. }))
    ));
}
