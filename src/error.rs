//! Error taxonomy shared by every sender in a chain.
//!
//! # Classes
//! - Transport failures, split by [`TransportError::is_temporary`] into
//!   retriable and fatal
//! - Waiter give-up (`RetryExhausted`, `Expired`)
//! - Cancellation of the request context (`Cancelled`, `DeadlineExceeded`)
//! - Work arriving at a closed lifecycle guard (`Closed`)
//!
//! Errors always surface to the caller of the decorated sender; no decorator
//! swallows one.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// A failure reported by the transport underneath a chain.
///
/// Implementors decide for themselves whether the failure is transient.
pub trait TransportError: std::error::Error + Send + Sync + 'static {
    /// Whether retrying the same request may succeed.
    fn is_temporary(&self) -> bool {
        false
    }
}

impl TransportError for io::Error {
    fn is_temporary(&self) -> bool {
        matches!(
            self.kind(),
            io::ErrorKind::TimedOut
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::Interrupted
                | io::ErrorKind::WouldBlock
        )
    }
}

/// Errors returned by [`Sender::send`](crate::Sender::send).
#[derive(Debug, Error)]
pub enum SendError {
    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(Box<dyn TransportError>),

    /// The waiter refused another attempt.
    #[error("retry limit reached after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    /// The waiter outlived its maximum age.
    #[error("retry window of {max_age:?} expired")]
    Expired { max_age: Duration },

    /// The request context was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// The request context deadline passed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// The sender was closed before the request arrived.
    #[error("sender is closed")]
    Closed,

    /// The request could not be prepared for sending.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SendError {
    /// Wrap a transport failure.
    pub fn transport<E: TransportError>(err: E) -> Self {
        SendError::Transport(Box::new(err))
    }

    /// Whether this error reports itself as transient.
    ///
    /// Only transport failures can be temporary; every other class ends the
    /// retry loop.
    pub fn is_temporary(&self) -> bool {
        match self {
            SendError::Transport(err) => err.is_temporary(),
            _ => false,
        }
    }

    /// Whether this error came from the request context.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SendError::Cancelled | SendError::DeadlineExceeded)
    }
}
