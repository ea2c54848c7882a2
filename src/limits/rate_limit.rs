//! Rate limiting decorator.

use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use tokio::time::Instant;
use tower::Layer;

use crate::context::RequestContext;
use crate::error::SendError;
use crate::observability::metrics;
use crate::sender::Sender;
use crate::Body;

/// Source of admission tokens.
pub trait TokenSource: Send + Sync {
    /// Take one token, or report how long until one is available.
    fn try_acquire(&self) -> Result<(), Duration>;
}

struct BucketState {
    tokens: f64,
    last_update: Instant,
}

/// A token bucket refilled continuously.
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_rate: f64,
}

impl TokenBucket {
    /// A full bucket of `capacity` tokens, refilled at `refill_rate` per second.
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_update: Instant::now(),
            }),
            capacity,
            refill_rate,
        }
    }

    /// `limit` tokens per `interval`, with a burst of `limit`.
    pub fn per_interval(limit: u32, interval: Duration) -> Self {
        let refill_rate = if interval.is_zero() {
            f64::INFINITY
        } else {
            f64::from(limit.max(1)) / interval.as_secs_f64()
        };
        Self::new(limit, refill_rate)
    }
}

impl TokenSource for TokenBucket {
    fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update).as_secs_f64();

        // Refill tokens
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
        state.last_update = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(missing / self.refill_rate).max(Duration::from_millis(1)))
        }
    }
}

/// Sender admitting at most `limit` requests per `interval`.
pub struct RateLimiter<S> {
    inner: S,
    limit: u32,
    interval: Duration,
    // Built on first use; concurrent first callers share one bucket.
    tokens: OnceLock<Box<dyn TokenSource>>,
}

impl<S> RateLimiter<S> {
    pub fn new(inner: S, limit: u32, interval: Duration) -> Self {
        Self {
            inner,
            limit,
            interval,
            tokens: OnceLock::new(),
        }
    }

    /// Use `source` instead of the built-in token bucket.
    pub fn with_token_source<T: TokenSource + 'static>(inner: S, source: T) -> Self {
        let tokens = OnceLock::new();
        let _ = tokens.set(Box::new(source) as Box<dyn TokenSource>);
        Self {
            inner,
            limit: 0,
            interval: Duration::ZERO,
            tokens,
        }
    }

    fn tokens(&self) -> &dyn TokenSource {
        self.tokens
            .get_or_init(|| Box::new(TokenBucket::per_interval(self.limit, self.interval)))
            .as_ref()
    }

    async fn admit(&self, cx: &RequestContext) -> Result<(), SendError> {
        let start = Instant::now();
        loop {
            match self.tokens().try_acquire() {
                Ok(()) => break,
                Err(wait) => {
                    tracing::trace!(wait = ?wait, "Waiting for rate limit token");
                    cx.run(tokio::time::sleep(wait)).await?;
                }
            }
        }
        metrics::record_rate_limit_wait(start);
        Ok(())
    }
}

impl<S: Sender> Sender for RateLimiter<S> {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>, SendError>> {
        Box::pin(async move {
            let cx = RequestContext::of(&request);
            self.admit(&cx).await?;
            self.inner.send(request).await
        })
    }
}

/// Layer producing [`RateLimiter`] senders.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitLayer {
    limit: u32,
    interval: Duration,
}

impl RateLimitLayer {
    pub fn new(limit: u32, interval: Duration) -> Self {
        Self { limit, interval }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimiter<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiter::new(inner, self.limit, self.interval)
    }
}
