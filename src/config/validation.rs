//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, delays ordered)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Disabled sections are not checked

use std::fmt;

use crate::config::schema::ResilienceConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check `config` for values the decorators cannot work with.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let retry = &config.retry;
    if retry.enabled {
        if retry.initial_delay_ms == 0 {
            errors.push(ValidationError::new("retry.initial_delay_ms", "must be greater than 0"));
        }
        if retry.peak_delay_ms != 0 && retry.peak_delay_ms < retry.initial_delay_ms {
            errors.push(ValidationError::new(
                "retry.peak_delay_ms",
                format!("must be 0 or at least initial_delay_ms ({})", retry.initial_delay_ms),
            ));
        }
        if retry.max_body_bytes == 0 {
            errors.push(ValidationError::new("retry.max_body_bytes", "must be greater than 0"));
        }
    }

    let rate = &config.rate_limit;
    if rate.enabled {
        if rate.limit == 0 {
            errors.push(ValidationError::new("rate_limit.limit", "must be greater than 0"));
        }
        if rate.interval_ms == 0 {
            errors.push(ValidationError::new("rate_limit.interval_ms", "must be greater than 0"));
        }
    }

    if config.concurrency.enabled && config.concurrency.limit == 0 {
        errors.push(ValidationError::new("concurrency.limit", "must be greater than 0"));
    }

    if config.observability.log_level.trim().is_empty() {
        errors.push(ValidationError::new("observability.log_level", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
