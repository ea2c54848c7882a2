//! Retry engine.
//!
//! # State Machine
//! ```text
//! Sending ── non-retriable status ─────────────▶ Done (x-retry-count stamped)
//!    │
//!    ├─ retriable status ── Retry-After, drain body ──▶ Waiting
//!    ├─ temporary transport error ────────────────────▶ Waiting
//!    └─ other error ──────────────────────────────────▶ Failed (error unchanged)
//!
//! Waiting ── waiter ok ──▶ Sending
//!         └─ waiter err ─▶ Failed (waiter's error)
//! ```
//!
//! # Design Decisions
//! - The retriable status table is immutable and shared
//! - One waiter per top-level request, created by a `WaiterFactory`
//! - Discarded responses are read to the end before the next attempt
//! - The request is captured once and rebuilt for every attempt; a body
//!   whose size hint is unknown or over the cap is sent once, unretried

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use chrono::Utc;
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use tower::Layer;

use crate::context::RequestContext;
use crate::error::SendError;
use crate::observability::metrics;
use crate::resilience::backoff::{BackoffPolicy, WaiterFactory};
use crate::resilience::retry_after::parse_retry_after;
use crate::sender::replay::{ReplayableRequest, DEFAULT_MAX_BODY_BYTES};
use crate::sender::Sender;
use crate::Body;

/// Statuses that signal a retry-worthy failure.
pub static RETRIABLE_STATUSES: &[StatusCode] = &[
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Header reporting how many retries produced a response.
pub static RETRY_COUNT_HEADER: HeaderName = HeaderName::from_static("x-retry-count");

/// Number of retries recorded on `response`, or 0 when absent.
pub fn retry_count<B>(response: &Response<B>) -> u32 {
    response
        .headers()
        .get(&RETRY_COUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn set_retry_count<B>(response: &mut Response<B>, retries: u32) {
    response
        .headers_mut()
        .insert(RETRY_COUNT_HEADER.clone(), HeaderValue::from(retries));
}

/// Whether `status` is in `statuses`.
pub fn is_retriable_status(statuses: &[StatusCode], status: StatusCode) -> bool {
    statuses.contains(&status)
}

/// Sender that retries retriable statuses and temporary transport errors.
#[derive(Clone)]
pub struct Retry<S> {
    inner: S,
    waiters: Arc<dyn WaiterFactory>,
    statuses: &'static [StatusCode],
    max_body_bytes: usize,
}

impl<S> Retry<S> {
    /// Retry with the default exponential policy.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            waiters: Arc::new(BackoffPolicy::default()),
            statuses: RETRIABLE_STATUSES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Use `factory` to create the waiter for each request.
    pub fn with_waiters<W: WaiterFactory + 'static>(mut self, factory: W) -> Self {
        self.waiters = Arc::new(factory);
        self
    }

    /// Replace the retriable status table.
    pub fn with_statuses(mut self, statuses: &'static [StatusCode]) -> Self {
        self.statuses = statuses;
        self
    }

    /// Cap on request bodies buffered for replay.
    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

}

impl<S: Sender> Retry<S> {
    async fn send_with_retries(&self, request: Request<Body>) -> Result<Response<Body>, SendError> {
        let cx = RequestContext::of(&request);
        if !ReplayableRequest::can_capture(&request, self.max_body_bytes) {
            // Unknown or oversized body: forward the original once, unretried.
            tracing::debug!(max_body_bytes = self.max_body_bytes, "Request body not replayable, sending once");
            let mut response = self.inner.send(request).await?;
            set_retry_count(&mut response, 0);
            return Ok(response);
        }

        let mut waiter = self.waiters.new_waiter(&request);
        let request = ReplayableRequest::capture(request, self.max_body_bytes).await?;
        let mut retries: u32 = 0;

        loop {
            match self.inner.send(request.request()).await {
                Ok(mut response) => {
                    set_retry_count(&mut response, retries);
                    let status = response.status();
                    if !is_retriable_status(self.statuses, status) {
                        return Ok(response);
                    }

                    // A past HTTP-date resolves to a negative delay; only a
                    // positive one overrides the policy.
                    if let Ok(delay) = parse_retry_after(&response, Utc::now()).to_std() {
                        if !delay.is_zero() {
                            waiter.set_next(delay);
                        }
                    }

                    cx.run(drain(response.into_body())).await?;
                    tracing::debug!(status = %status, retries, "Retrying request");
                    metrics::record_retry("status");
                }
                Err(err) if err.is_temporary() => {
                    tracing::debug!(error = %err, retries, "Retrying after transport error");
                    metrics::record_retry("transport");
                }
                Err(err) => return Err(err),
            }

            if let Err(err) = waiter.wait(&cx).await {
                metrics::record_retry_exhausted();
                return Err(err);
            }
            retries += 1;
        }
    }
}

/// Read a discarded body to the end, dropping each chunk as it arrives.
async fn drain(body: Body) {
    let mut chunks = body.into_data_stream();
    while let Some(chunk) = chunks.next().await {
        if chunk.is_err() {
            break;
        }
    }
}

impl<S: Sender> Sender for Retry<S> {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, SendError>> {
        Box::pin(self.send_with_retries(request))
    }
}

/// Layer producing [`Retry`] senders.
#[derive(Clone)]
pub struct RetryLayer {
    waiters: Arc<dyn WaiterFactory>,
    statuses: &'static [StatusCode],
    max_body_bytes: usize,
}

impl RetryLayer {
    pub fn new<W: WaiterFactory + 'static>(factory: W) -> Self {
        Self {
            waiters: Arc::new(factory),
            statuses: RETRIABLE_STATUSES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

impl Default for RetryLayer {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = Retry<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Retry {
            inner,
            waiters: Arc::clone(&self.waiters),
            statuses: self.statuses,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::resilience::backoff::{waiter_fn, Waiter};
    use crate::sender::sender_fn;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("connection reset")]
    struct Reset {
        temporary: bool,
    }

    impl TransportError for Reset {
        fn is_temporary(&self) -> bool {
            self.temporary
        }
    }

    /// Counts waits and records overrides; never sleeps.
    #[derive(Clone, Default)]
    struct Recorder {
        waits: Arc<AtomicU32>,
        overrides: Arc<std::sync::Mutex<Vec<Duration>>>,
        allow: Option<u32>,
    }

    impl Waiter for Recorder {
        fn wait<'a>(&'a mut self, _cx: &'a RequestContext) -> BoxFuture<'a, Result<(), SendError>> {
            Box::pin(async move {
                let n = self.waits.fetch_add(1, Ordering::SeqCst);
                match self.allow {
                    Some(allow) if n >= allow => Err(SendError::RetryExhausted { attempts: n }),
                    _ => Ok(()),
                }
            })
        }

        fn set_next(&mut self, delay: Duration) {
            self.overrides.lock().unwrap().push(delay);
        }
    }

    fn status_sequence(statuses: Vec<(u16, Option<&'static str>)>, calls: Arc<AtomicU32>) -> impl Sender {
        sender_fn(move |_req| {
            let n = calls.fetch_add(1, Ordering::SeqCst) as usize;
            let (status, retry_after) = statuses[n.min(statuses.len() - 1)];
            async move {
                let mut builder = Response::builder().status(status);
                if let Some(value) = retry_after {
                    builder = builder.header("retry-after", value);
                }
                Ok::<_, SendError>(builder.body(Body::from("body")).unwrap())
            }
        })
    }

    #[tokio::test]
    async fn every_retriable_status_is_retried() {
        for status in RETRIABLE_STATUSES {
            let calls = Arc::new(AtomicU32::new(0));
            let recorder = Recorder::default();
            let waiter = recorder.clone();
            let retry = Retry::new(status_sequence(vec![(status.as_u16(), None), (200, None)], calls.clone()))
                .with_waiters(waiter_fn(move |_| waiter.clone()));

            let response = retry.send(Request::new(Body::empty())).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(retry_count(&response), 1, "status {status}");
            assert_eq!(calls.load(Ordering::SeqCst), 2);
            assert_eq!(recorder.waits.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn non_retriable_status_is_returned_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let retry = Retry::new(status_sequence(vec![(404, None)], calls.clone()))
            .with_waiters(waiter_fn(|_| Recorder::default()));

        let response = retry.send(Request::new(Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(retry_count(&response), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn temporary_errors_are_retried_and_counted() {
        const N: u32 = 3;
        let calls = Arc::new(AtomicU32::new(0));
        let base_calls = calls.clone();
        let base = sender_fn(move |_req| {
            let n = base_calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < N {
                    Err(SendError::transport(Reset { temporary: true }))
                } else {
                    Ok(Response::new(Body::from("hello")))
                }
            }
        });
        let recorder = Recorder::default();
        let waiter = recorder.clone();
        let retry = Retry::new(base).with_waiters(waiter_fn(move |_| waiter.clone()));

        let response = retry.send(Request::new(Body::empty())).await.unwrap();
        assert_eq!(recorder.waits.load(Ordering::SeqCst), N);
        assert_eq!(retry_count(&response), N);
    }

    #[tokio::test]
    async fn fatal_errors_propagate_unchanged() {
        let calls = Arc::new(AtomicU32::new(0));
        let base_calls = calls.clone();
        let base = sender_fn(move |_req| {
            base_calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<Response<Body>, _>(SendError::transport(Reset { temporary: false })) }
        });
        let recorder = Recorder::default();
        let waiter = recorder.clone();
        let retry = Retry::new(base).with_waiters(waiter_fn(move |_| waiter.clone()));

        let err = retry.send(Request::new(Body::empty())).await.unwrap_err();
        assert_eq!(err.to_string(), "transport error: connection reset");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.waits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn waiter_failure_ends_the_loop() {
        let calls = Arc::new(AtomicU32::new(0));
        let retry = Retry::new(status_sequence(vec![(503, None)], calls.clone())).with_waiters(waiter_fn(|_| Recorder {
            allow: Some(2),
            ..Recorder::default()
        }));

        let err = retry.send(Request::new(Body::empty())).await.unwrap_err();
        assert!(matches!(err, SendError::RetryExhausted { attempts: 2 }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_after_seconds_override_the_policy() {
        let calls = Arc::new(AtomicU32::new(0));
        let recorder = Recorder::default();
        let waiter = recorder.clone();
        let retry = Retry::new(status_sequence(
            vec![(429, Some("7")), (503, Some("aaa")), (200, None)],
            calls.clone(),
        ))
        .with_waiters(waiter_fn(move |_| waiter.clone()));

        let response = retry.send(Request::new(Body::empty())).await.unwrap();
        assert_eq!(retry_count(&response), 2);
        assert_eq!(*recorder.overrides.lock().unwrap(), [Duration::from_secs(7)]);
    }

    #[tokio::test]
    async fn past_retry_after_date_keeps_policy_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let recorder = Recorder::default();
        let waiter = recorder.clone();
        let retry = Retry::new(status_sequence(
            vec![(503, Some("Sun, 20 May 2018 07:28:00 GMT")), (200, None)],
            calls.clone(),
        ))
        .with_waiters(waiter_fn(move |_| waiter.clone()));

        retry.send(Request::new(Body::empty())).await.unwrap();
        assert!(recorder.overrides.lock().unwrap().is_empty());
        assert_eq!(recorder.waits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_errors_without_retry_after_support_keep_policy_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let recorder = Recorder::default();
        let waiter = recorder.clone();
        let retry = Retry::new(status_sequence(vec![(500, Some("10")), (200, None)], calls.clone()))
            .with_waiters(waiter_fn(move |_| waiter.clone()));

        retry.send(Request::new(Body::empty())).await.unwrap();
        assert!(recorder.overrides.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_is_replayed_for_each_attempt() {
        let bodies = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = bodies.clone();
        let calls = Arc::new(AtomicU32::new(0));
        let base = sender_fn(move |req: Request<Body>| {
            let seen = seen.clone();
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let body = axum::body::to_bytes(req.into_body(), usize::MAX).await.unwrap();
                seen.lock().unwrap().push(body);
                let status = if n == 0 { 503 } else { 200 };
                Ok::<_, SendError>(Response::builder().status(status).body(Body::empty()).unwrap())
            }
        });
        let retry = Retry::new(base).with_waiters(waiter_fn(|_| Recorder::default()));

        retry.send(Request::new(Body::from("payload"))).await.unwrap();
        let bodies = bodies.lock().unwrap();
        assert_eq!(bodies.len(), 2);
        assert!(bodies.iter().all(|b| &b[..] == b"payload"));
    }

    #[tokio::test]
    async fn discarded_body_is_read_to_the_end_before_resending() {
        let pulled = Arc::new(AtomicU32::new(0));
        let pulled_at_second_call = Arc::new(AtomicU32::new(u32::MAX));
        let calls = Arc::new(AtomicU32::new(0));
        let base = {
            let pulled = pulled.clone();
            let pulled_at_second_call = pulled_at_second_call.clone();
            sender_fn(move |_req| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let pulled = pulled.clone();
                let pulled_at_second_call = pulled_at_second_call.clone();
                async move {
                    if n == 0 {
                        let chunks = futures_util::stream::iter(["a", "b", "c"]).map(move |chunk| {
                            pulled.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, std::io::Error>(chunk)
                        });
                        let body = Body::from_stream(chunks);
                        return Ok::<_, SendError>(Response::builder().status(503).body(body).unwrap());
                    }
                    pulled_at_second_call.store(pulled.load(Ordering::SeqCst), Ordering::SeqCst);
                    Ok(Response::new(Body::empty()))
                }
            })
        };
        let retry = Retry::new(base).with_waiters(waiter_fn(|_| Recorder::default()));

        let response = retry.send(Request::new(Body::empty())).await.unwrap();
        assert_eq!(retry_count(&response), 1);
        assert_eq!(pulled_at_second_call.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unbounded_request_body_is_sent_once_unretried() {
        let calls = Arc::new(AtomicU32::new(0));
        let recorder = Recorder::default();
        let waiter = recorder.clone();
        let retry = Retry::new(status_sequence(vec![(503, None), (200, None)], calls.clone()))
            .with_waiters(waiter_fn(move |_| waiter.clone()));

        let chunks = futures_util::stream::iter([Ok::<_, std::io::Error>("streamed")]);
        let response = retry.send(Request::new(Body::from_stream(chunks))).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(retry_count(&response), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.waits.load(Ordering::SeqCst), 0);
    }
}
