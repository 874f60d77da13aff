//! Shutdown coordination for the service.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Owns the root cancellation token. Every request runs under a child token, so one
/// trigger reaches all in-flight retry loops while a single request can still be cancelled
/// on its own.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// The root token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// A token cancelled with the root, and cancellable independently.
    pub fn child(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Shutdown triggered");
        }
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn wait(&self) {
        self.token.cancelled().await
    }
}
