//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResilienceConfig (validated, immutable)
//!     → build_chain (decorators in standard order)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The lifecycle guard is not part of the built chain; callers wrap the
//!   result themselves so they keep a handle for `close`

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ConcurrencyConfig, ObservabilityConfig, RateLimitConfig, ResilienceConfig, RetryConfig};
pub use validation::{validate_config, ValidationError};

use crate::limits::{ConcurrencyLimitLayer, RateLimitLayer};
use crate::resilience::RetryLayer;
use crate::sender::{Chain, Sender};

/// Chain of the enabled decorators over `base`.
///
/// Request order is retry, then rate limiter, then concurrency limiter, then
/// `base`, so every retry attempt is rate limited and holds its own slot.
pub fn build_chain<S: Sender + 'static>(config: &ResilienceConfig, base: S) -> Chain {
    let mut chain = Chain::with_base(base);

    if config.concurrency.enabled {
        chain = chain.layer(ConcurrencyLimitLayer::new(config.concurrency.limit));
    }
    if config.rate_limit.enabled {
        chain = chain.layer(RateLimitLayer::new(config.rate_limit.limit, config.rate_limit.interval()));
    }
    if config.retry.enabled {
        chain = chain.layer(RetryLayer::new(config.retry.backoff()).max_body_bytes(config.retry.max_body_bytes));
    }

    tracing::debug!(wrappers = chain.len(), "Built sender chain");
    chain
}
