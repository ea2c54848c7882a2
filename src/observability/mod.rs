//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Decorators produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → whatever subscriber / recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - The library never installs a metrics recorder; without one every
//!   metric call is a no-op
//! - `init_logging` is for binaries only

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
