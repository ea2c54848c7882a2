//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Running (guard.rs):
//!     send → closed? reject : count in → inner sender → count out
//!
//! Shutdown (shutdown.rs):
//!     Signal received → cancel request contexts → close guard → drain → exit
//! ```
//!
//! # Design Decisions
//! - Closing is one-way; a closed guard never reopens
//! - Draining waits for retries too, since they run inside the guard

pub mod guard;
pub mod shutdown;

pub use guard::LifecycleGuard;
pub use shutdown::Shutdown;
