//! Cancellation context carried by each request.
//!
//! A [`RequestContext`] lives in the request extensions. Every suspension
//! point in a chain (backoff wait, token wait, semaphore acquire, close
//! drain) races its work against [`RequestContext::done`], so cancelling the
//! token or passing the deadline unblocks the request promptly.

use std::future::Future;
use std::time::Duration;

use axum::http::Request;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::SendError;

/// Cancellation token plus optional deadline for one logical request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context cancelled together with `token`.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            token: Some(token),
            deadline: None,
        }
    }

    /// Expire the context at `deadline`.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Expire the context `timeout` from now.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    /// Context attached to `request`, or a never-cancelled one.
    pub fn of<B>(request: &Request<B>) -> Self {
        request.extensions().get::<Self>().cloned().unwrap_or_default()
    }

    /// Attach this context to `request`.
    pub fn attach<B>(self, request: &mut Request<B>) {
        request.extensions_mut().insert(self);
    }

    /// The error this context already reports, if any.
    pub fn err(&self) -> Option<SendError> {
        if self.token.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Some(SendError::Cancelled);
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Some(SendError::DeadlineExceeded);
        }
        None
    }

    /// Resolves once the context is cancelled or expired.
    pub async fn done(&self) -> SendError {
        let cancelled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => SendError::Cancelled,
            _ = expired => SendError::DeadlineExceeded,
        }
    }

    /// Run `fut` unless the context ends first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, SendError> {
        if let Some(err) = self.err() {
            return Err(err);
        }

        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}
