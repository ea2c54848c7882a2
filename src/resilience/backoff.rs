//! Backoff policy seen by the retry engine.
//!
//! The engine only depends on [`Waiter`]: one instance per top-level request,
//! asked to wait before every retry and told about server-suggested delays.
//! [`ExponentialBackoff`] is the built-in policy.

use std::time::Duration;

use axum::http::Request;
use futures_util::future::BoxFuture;
use rand::Rng;
use tokio::time::Instant;

use crate::context::RequestContext;
use crate::error::SendError;
use crate::Body;

/// Waits between retry attempts and decides when to stop.
pub trait Waiter: Send {
    /// Sleep for the next delay. An error means "stop retrying and surface
    /// this error".
    fn wait<'a>(&'a mut self, cx: &'a RequestContext) -> BoxFuture<'a, Result<(), SendError>>;

    /// Override the delay used by the next call to [`Waiter::wait`].
    fn set_next(&mut self, delay: Duration);
}

impl<W: Waiter + ?Sized> Waiter for Box<W> {
    fn wait<'a>(&'a mut self, cx: &'a RequestContext) -> BoxFuture<'a, Result<(), SendError>> {
        (**self).wait(cx)
    }

    fn set_next(&mut self, delay: Duration) {
        (**self).set_next(delay)
    }
}

/// Creates a fresh [`Waiter`] for each top-level request.
pub trait WaiterFactory: Send + Sync {
    fn new_waiter(&self, request: &Request<Body>) -> Box<dyn Waiter>;
}

/// Factory backed by a closure. See [`waiter_fn`].
#[derive(Clone)]
pub struct WaiterFn<F> {
    f: F,
}

/// Use a closure as a [`WaiterFactory`].
pub fn waiter_fn<F, W>(f: F) -> WaiterFn<F>
where
    F: Fn(&Request<Body>) -> W + Send + Sync,
    W: Waiter + 'static,
{
    WaiterFn { f }
}

impl<F, W> WaiterFactory for WaiterFn<F>
where
    F: Fn(&Request<Body>) -> W + Send + Sync,
    W: Waiter + 'static,
{
    fn new_waiter(&self, request: &Request<Body>) -> Box<dyn Waiter> {
        Box::new((self.f)(request))
    }
}

/// Calculate exponential backoff delay with jitter.
///
/// `attempt` is 1-based; attempt 0 never waits. A zero `peak` leaves the curve
/// uncapped.
pub fn calculate_backoff(attempt: u32, initial: Duration, peak: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(attempt - 1);
    let mut delay = initial.saturating_mul(factor);
    if !peak.is_zero() {
        delay = delay.min(peak);
    }

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = delay.as_millis() as u64 / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    delay + Duration::from_millis(jitter)
}

/// Parameters of the built-in exponential policy.
///
/// Acts as the [`WaiterFactory`] producing [`ExponentialBackoff`] waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// First delay.
    pub initial: Duration,
    /// Maximum delay. Zero is no limit.
    pub peak: Duration,
    /// Maximum retry count. `None` is no limit.
    pub limit: Option<u32>,
    /// Maximum lifetime of one waiter. Zero is no limit.
    pub max_age: Duration,
}

impl BackoffPolicy {
    /// A policy that refuses every retry.
    pub fn no_retries() -> Self {
        Self {
            limit: Some(0),
            ..Self::default()
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            peak: Duration::from_secs(2),
            limit: Some(3),
            max_age: Duration::ZERO,
        }
    }
}

impl WaiterFactory for BackoffPolicy {
    fn new_waiter(&self, _request: &Request<Body>) -> Box<dyn Waiter> {
        Box::new(ExponentialBackoff::new(*self))
    }
}

/// Stateful exponential backoff for one request.
#[derive(Debug)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    attempts: u32,
    started: Instant,
    next: Option<Duration>,
}

impl ExponentialBackoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            started: Instant::now(),
            next: None,
        }
    }

    /// A waiter that fails on its first wait.
    pub fn no_retries() -> Self {
        Self::new(BackoffPolicy::no_retries())
    }

    fn next_delay(&mut self) -> Result<Duration, SendError> {
        if self.policy.limit.is_some_and(|limit| self.attempts >= limit) {
            return Err(SendError::RetryExhausted { attempts: self.attempts });
        }

        let delay = match self.next.take() {
            Some(delay) => delay,
            None => calculate_backoff(self.attempts + 1, self.policy.initial, self.policy.peak),
        };

        if !self.policy.max_age.is_zero() {
            let elapsed = self.started.elapsed();
            if elapsed + delay > self.policy.max_age {
                return Err(SendError::Expired { max_age: self.policy.max_age });
            }
        }

        self.attempts += 1;
        Ok(delay)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

impl Waiter for ExponentialBackoff {
    fn wait<'a>(&'a mut self, cx: &'a RequestContext) -> BoxFuture<'a, Result<(), SendError>> {
        Box::pin(async move {
            let delay = self.next_delay()?;
            tracing::trace!(attempt = self.attempts, delay = ?delay, "Backing off");
            cx.run(tokio::time::sleep(delay)).await
        })
    }

    fn set_next(&mut self, delay: Duration) {
        self.next = Some(delay);
    }
}
