//! Concurrency limiting decorator.

use std::sync::{Arc, OnceLock};

use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use tokio::sync::Semaphore;
use tower::Layer;

use crate::context::RequestContext;
use crate::error::SendError;
use crate::observability::metrics;
use crate::sender::Sender;
use crate::Body;

/// A held slot; releasing it is dropping it.
pub type Permit<'a> = Box<dyn Send + 'a>;

/// Counting gate bounding simultaneous holders.
pub trait CountingGate: Send + Sync {
    /// Wait for a free slot.
    fn acquire(&self) -> BoxFuture<'_, Result<Permit<'_>, SendError>>;
}

impl CountingGate for Semaphore {
    fn acquire(&self) -> BoxFuture<'_, Result<Permit<'_>, SendError>> {
        Box::pin(async move {
            let permit = Semaphore::acquire(self).await.map_err(|_| SendError::Closed)?;
            Ok(Box::new(permit) as Permit<'_>)
        })
    }
}

impl<G: CountingGate + ?Sized> CountingGate for Arc<G> {
    fn acquire(&self) -> BoxFuture<'_, Result<Permit<'_>, SendError>> {
        (**self).acquire()
    }
}

/// Sender allowing at most `limit` requests inside its inner sender at once.
pub struct ConcurrencyLimiter<S> {
    inner: S,
    limit: usize,
    gate: OnceLock<Box<dyn CountingGate>>,
}

impl<S> ConcurrencyLimiter<S> {
    pub fn new(inner: S, limit: usize) -> Self {
        Self {
            inner,
            limit,
            gate: OnceLock::new(),
        }
    }

    /// Use `gate` instead of a semaphore sized to `limit`.
    ///
    /// Passing a shared gate (for example an `Arc<Semaphore>`) bounds several
    /// limiters together.
    pub fn with_gate<G: CountingGate + 'static>(inner: S, gate: G) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(Box::new(gate) as Box<dyn CountingGate>);
        Self {
            inner,
            limit: 0,
            gate: cell,
        }
    }

    fn gate(&self) -> &dyn CountingGate {
        self.gate
            .get_or_init(|| Box::new(Semaphore::new(self.limit.max(1))))
            .as_ref()
    }
}

impl<S: Sender> Sender for ConcurrencyLimiter<S> {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, SendError>> {
        Box::pin(async move {
            let cx = RequestContext::of(&request);
            let permit = match cx.run(self.gate().acquire()).await {
                Ok(permit) => permit?,
                Err(err) => {
                    metrics::record_rejected("concurrency");
                    return Err(err);
                }
            };

            let response = self.inner.send(request).await;
            drop(permit);
            response
        })
    }
}

/// Layer producing [`ConcurrencyLimiter`] senders.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyLimitLayer {
    limit: usize,
}

impl ConcurrencyLimitLayer {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl<S> Layer<S> for ConcurrencyLimitLayer {
    type Service = ConcurrencyLimiter<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ConcurrencyLimiter::new(inner, self.limit)
    }
}
