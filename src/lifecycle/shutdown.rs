//! Shutdown coordination.

use tokio_util::sync::CancellationToken;

use crate::context::RequestContext;

/// Coordinator for graceful shutdown.
///
/// Hands out request contexts that are all cancelled together when shutdown
/// is triggered.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self::default()
    }

    /// A request context cancelled on shutdown.
    pub fn context(&self) -> RequestContext {
        RequestContext::with_cancellation(self.token.child_token())
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger shutdown on Ctrl+C.
    pub async fn trigger_on_ctrl_c(&self) {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            self.trigger();
        }
    }
}
