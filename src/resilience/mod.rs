//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request into Retry:
//!     → retries.rs (send, classify status or error)
//!     → retry_after.rs (server-suggested delay on 429/503)
//!     → backoff.rs (Waiter decides how long to wait, or to stop)
//!     → retries.rs (re-send, stamp x-retry-count on the final response)
//! ```
//!
//! # Design Decisions
//! - Only temporary transport errors and 429/500/503/504 are retried
//! - The delay curve is injectable; the engine knows only the `Waiter` trait
//! - Retry-After overrides exactly one delay

pub mod backoff;
pub mod retries;
pub mod retry_after;

pub use backoff::{calculate_backoff, waiter_fn, BackoffPolicy, ExponentialBackoff, Waiter, WaiterFactory};
pub use retries::{retry_count, Retry, RetryLayer, RETRIABLE_STATUSES, RETRY_COUNT_HEADER};
pub use retry_after::parse_retry_after;
