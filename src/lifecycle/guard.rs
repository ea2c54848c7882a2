//! Close/drain guard around a sender.
//!
//! # Responsibilities
//! - Reject new requests once closed, before any work starts
//! - Count requests in flight, retries included
//! - Let `close` return only after the count drops to zero
//!
//! # Design Decisions
//! - The closed flag and the counter share one `watch` channel, so the
//!   closed-check and the increment happen under the same lock
//! - The counter is decremented by an RAII guard, on every exit path
//!   including a dropped future

use axum::http::{Request, Response};
use futures_util::future::{self, BoxFuture};
use tokio::sync::watch;

use crate::context::RequestContext;
use crate::error::SendError;
use crate::observability::metrics;
use crate::sender::Sender;
use crate::Body;

#[derive(Debug, Clone, Copy, Default)]
struct GuardState {
    closed: bool,
    in_flight: u64,
}

/// Sender that can be drained and permanently closed.
#[derive(Debug)]
pub struct LifecycleGuard<S> {
    inner: S,
    state: watch::Sender<GuardState>,
}

impl<S> LifecycleGuard<S> {
    pub fn new(inner: S) -> Self {
        let (state, _) = watch::channel(GuardState::default());
        Self { inner, state }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Number of requests currently inside the guard.
    pub fn in_flight(&self) -> u64 {
        self.state.borrow().in_flight
    }

    /// Stop admitting requests and wait for those in flight to finish.
    ///
    /// Calling it again, concurrently or later, waits for the same drain.
    pub async fn close(&self) {
        let mut drained = self.mark_closed();
        // The sender half lives in `self`, so this only ends on a zero count.
        let _ = drained.wait_for(|s| s.in_flight == 0).await;
        tracing::debug!("Sender drained");
    }

    /// Like [`close`](Self::close), but gives up waiting when `cx` ends.
    ///
    /// The guard stays closed either way.
    pub async fn close_with(&self, cx: &RequestContext) -> Result<(), SendError> {
        let mut drained = self.mark_closed();
        let _ = cx.run(drained.wait_for(|s| s.in_flight == 0)).await?;
        tracing::debug!("Sender drained");
        Ok(())
    }

    fn mark_closed(&self) -> watch::Receiver<GuardState> {
        let drained = self.state.subscribe();
        let newly_closed = self.state.send_if_modified(|s| !std::mem::replace(&mut s.closed, true));
        if newly_closed {
            tracing::debug!(in_flight = self.in_flight(), "Closing sender");
        }
        drained
    }

    fn enter(&self) -> Result<InFlight<'_>, SendError> {
        let admitted = self.state.send_if_modified(|s| {
            if s.closed {
                return false;
            }
            s.in_flight += 1;
            true
        });
        if !admitted {
            metrics::record_rejected("closed");
            return Err(SendError::Closed);
        }

        metrics::record_in_flight(self.in_flight());
        Ok(InFlight { state: &self.state })
    }
}

impl<S: Sender> Sender for LifecycleGuard<S> {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, SendError>> {
        let in_flight = match self.enter() {
            Ok(in_flight) => in_flight,
            Err(err) => return Box::pin(future::ready(Err(err))),
        };

        Box::pin(async move {
            let response = self.inner.send(request).await;
            drop(in_flight);
            response
        })
    }
}

/// Decrements the in-flight count when dropped.
struct InFlight<'a> {
    state: &'a watch::Sender<GuardState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| s.in_flight -= 1);
        metrics::record_in_flight(self.state.borrow().in_flight);
    }
}
