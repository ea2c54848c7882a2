//! Composable resilience layer for outbound HTTP transactions.
//!
//! A [`Sender`] takes a request and produces a response. Decorators in this
//! crate wrap a sender with retry, rate limiting, concurrency limiting and a
//! close/drain lifecycle, and a [`Chain`] stacks them around a base sender in
//! a fixed, deterministic order.
//!
//! ```text
//!     caller
//!       │
//!       ▼
//!  LifecycleGuard ── closed? ──▶ SendError::Closed
//!       │
//!       ▼
//!     Retry ◀──────── Waiter (backoff, Retry-After override)
//!       │
//!       ▼
//!  RateLimiter ◀───── TokenSource (token bucket)
//!       │
//!       ▼
//!  ConcurrencyLimiter ◀ CountingGate (semaphore)
//!       │
//!       ▼
//!  base sender (HttpSender by default)
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod limits;
pub mod observability;
pub mod resilience;
pub mod sender;

pub use context::RequestContext;
pub use error::{SendError, TransportError};
pub use lifecycle::LifecycleGuard;
pub use limits::{ConcurrencyLimiter, RateLimiter};
pub use resilience::{retry_count, ExponentialBackoff, Retry, Waiter};
pub use sender::{middleware_fn, sender_fn, BoxSender, Chain, HttpSender, Middleware, Sender};

/// Body type carried by every request and response passing through a chain.
pub type Body = axum::body::Body;
