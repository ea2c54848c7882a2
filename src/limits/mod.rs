//! Admission control around a sender.
//!
//! # Responsibilities
//! - Bound the rate at which requests reach the inner sender
//! - Bound how many requests are inside the inner sender at once
//!
//! # Design Decisions
//! - Both limiters build their token source or gate lazily on first use, so
//!   a limiter can be constructed outside any runtime
//! - Waiting for a token or a slot is raced against the request context; a
//!   request that gives up never reaches the inner sender
//! - The concurrency slot is held for the whole inner call, including reading
//!   the response head

pub mod concurrency;
pub mod rate_limit;

pub use concurrency::{ConcurrencyLimitLayer, ConcurrencyLimiter, CountingGate, Permit};
pub use rate_limit::{RateLimitLayer, RateLimiter, TokenBucket, TokenSource};
