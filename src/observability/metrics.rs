//! Metrics emitted by the decorators.
//!
//! # Metrics
//! - `sender_retries_total` (counter): retries scheduled, by `reason`
//!   (`status` or `transport`)
//! - `sender_retry_exhausted_total` (counter): requests whose waiter gave up
//! - `sender_rate_limited_wait_seconds` (histogram): time spent waiting for a
//!   rate limit token
//! - `sender_in_flight` (gauge): requests inside a lifecycle guard
//! - `sender_rejected_total` (counter): requests refused, by `reason`
//!   (`closed` or `concurrency`)

use metrics::{counter, gauge, histogram};
use tokio::time::Instant;

pub fn record_retry(reason: &'static str) {
    counter!("sender_retries_total", "reason" => reason).increment(1);
}

pub fn record_retry_exhausted() {
    counter!("sender_retry_exhausted_total").increment(1);
}

/// Record the time since `start` spent waiting for admission.
pub fn record_rate_limit_wait(start: Instant) {
    histogram!("sender_rate_limited_wait_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_in_flight(count: u64) {
    gauge!("sender_in_flight").set(count as f64);
}

pub fn record_rejected(reason: &'static str) {
    counter!("sender_rejected_total", "reason" => reason).increment(1);
}
