//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section has defaults, so an empty file is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::BackoffPolicy;
use crate::sender::replay::DEFAULT_MAX_BODY_BYTES;

/// Root configuration for a resilient sender chain.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Retry engine settings.
    pub retry: RetryConfig,

    /// Rate limiter settings.
    pub rate_limit: RateLimitConfig,

    /// Concurrency limiter settings.
    pub concurrency: ConcurrencyConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// First backoff delay in milliseconds.
    pub initial_delay_ms: u64,

    /// Maximum backoff delay in milliseconds (0 = uncapped).
    pub peak_delay_ms: u64,

    /// Maximum number of retries (0 = unlimited).
    pub limit: u32,

    /// Maximum total retry window in seconds (0 = unlimited).
    pub max_age_secs: u64,

    /// Largest request body buffered for replay.
    pub max_body_bytes: usize,
}

impl RetryConfig {
    /// Backoff policy described by this section.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(self.initial_delay_ms),
            peak: Duration::from_millis(self.peak_delay_ms),
            limit: (self.limit > 0).then_some(self.limit),
            max_age: Duration::from_secs(self.max_age_secs),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_ms: 100,
            peak_delay_ms: 2000,
            limit: 3,
            max_age_secs: 0,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests admitted per interval (also the burst size).
    pub limit: u32,

    /// Interval length in milliseconds.
    pub interval_ms: u64,
}

impl RateLimitConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            limit: 100,
            interval_ms: 1000,
        }
    }
}

/// Concurrency limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Enable the concurrency limiter.
    pub enabled: bool,

    /// Maximum simultaneous requests.
    pub limit: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            limit: 16,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (e.g. "info", "resilient_sender=debug").
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
