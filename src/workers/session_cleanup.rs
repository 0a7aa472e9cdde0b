use crate::domain::clock::Clock;
use crate::error::Result;
use crate::services::ports::SessionRepository;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

#[derive(Debug)]
pub struct SessionCleanupWorker {
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    cleanup_interval_secs: u64,
}

impl SessionCleanupWorker {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionRepository>, clock: Arc<dyn Clock>, cleanup_interval_secs: u64) -> Self {
        Self { sessions, clock, cleanup_interval_secs }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.cleanup_interval_secs == 0 {
            tracing::info!("Session cleanup is disabled (interval = 0)");
            return;
        }

        let mut interval = tokio::time::interval(Duration::from_secs(self.cleanup_interval_secs));

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.perform_cleanup()
                        .instrument(tracing::info_span!("run_session_cleanup"))
                        .await
                    {
                        tracing::error!(error = ?e, "Session cleanup iteration failed");
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Session cleanup loop shutting down...");
    }

    /// Deletes sessions whose expiry has passed.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    #[tracing::instrument(skip(self), err, fields(expired_deleted = tracing::field::Empty))]
    pub async fn perform_cleanup(&self) -> Result<u64> {
        let count = self.sessions.delete_expired(self.clock.now()).await?;
        if count > 0 {
            tracing::info!(count = %count, "Deleted expired sessions");
            tracing::Span::current().record("expired_deleted", count);
        }
        Ok(count)
    }
}
