//! Background task that keeps the permission cache current.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::app::SharedAuthorizer;

/// Periodically rebuilds the permission cache until shut down.
pub struct RefreshWorker {
    authorizer: Arc<SharedAuthorizer>,
    interval: Duration,
    shutdown: Arc<Notify>,
}

impl RefreshWorker {
    pub fn new(authorizer: Arc<SharedAuthorizer>, interval: Duration) -> Self {
        Self {
            authorizer,
            interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle that stops the worker when notified.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Spawn the refresh loop.
    ///
    /// A failed refresh keeps the previous snapshot; the next tick retries.
    /// The first tick fires immediately.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(interval_secs = self.interval.as_secs(), "permission refresh worker started");

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = self.shutdown.notified() => {
                        tracing::info!("permission refresh worker received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.authorizer.refresh_permissions().await {
                            tracing::warn!(error = %e, "permission refresh failed; keeping previous snapshot");
                        }
                    }
                }
            }
        })
    }
}
