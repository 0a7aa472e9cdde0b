#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::database::DbPool;
use crate::adapters::database::session_repo::PgSessionRepository;
use crate::adapters::database::user_repo::PgUserRepository;
use crate::adapters::mail::{LogMailer, SendGridMailer};
use crate::adapters::memory::{InMemorySessionRepository, InMemoryUserRepository};
use crate::api::ServiceContainer;
use crate::config::Config;
use crate::domain::clock::{Clock, SystemClock};
use crate::services::account_service::AccountService;
use crate::services::credential_store::CredentialStore;
use crate::services::health_service::HealthService;
use crate::services::mailer::Mailer;
use crate::services::ports::{SessionRepository, UserRepository};
use crate::services::reset_service::ResetService;
use crate::workers::SessionCleanupWorker;
use secrecy::SecretString;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Everything the binary needs to start serving.
#[derive(Debug)]
pub struct App {
    pub services: ServiceContainer,
    pub health_service: HealthService,
    pub workers: Workers,
}

#[derive(Debug)]
pub struct Workers {
    session_cleanup: SessionCleanupWorker,
}

impl Workers {
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.session_cleanup.run(shutdown_rx))]
    }
}

/// Wires stores, mailer and services together.
///
/// Without a database pool, users and sessions live in memory. Without an
/// explicit mailer, SendGrid is used when an API key is configured and
/// messages are only logged otherwise.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    pool: Option<DbPool>,
    mailer: Option<Arc<dyn Mailer>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, pool: None, mailer: None, clock: None }
    }

    #[must_use]
    pub fn with_database(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// # Errors
    /// Returns an error if the mail client cannot be constructed.
    pub fn build(self) -> anyhow::Result<App> {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let (users, sessions): (Arc<dyn UserRepository>, Arc<dyn SessionRepository>) = match self.pool {
            Some(pool) => (Arc::new(PgUserRepository::new(pool.clone())), Arc::new(PgSessionRepository::new(pool))),
            None => {
                tracing::warn!("No database configured; users and sessions are kept in memory");
                (Arc::new(InMemoryUserRepository::new()), Arc::new(InMemorySessionRepository::new()))
            }
        };

        let mailer: Arc<dyn Mailer> = match (self.mailer, &config.mail.sendgrid_api_key) {
            (Some(mailer), _) => mailer,
            (None, Some(key)) => Arc::new(SendGridMailer::new(&config.mail, SecretString::from(key.clone()))?),
            (None, None) => {
                tracing::warn!("No SendGrid API key configured; outgoing mail is only logged");
                Arc::new(LogMailer)
            }
        };

        let store = CredentialStore::new(Arc::clone(&users), Arc::clone(&clock));
        let account_service = AccountService::new(
            store.clone(),
            Arc::clone(&sessions),
            time::Duration::seconds(config.auth.session_ttl_secs),
        );
        let reset_service =
            ResetService::new(store, mailer, time::Duration::seconds(config.auth.reset_token_ttl_secs));
        let health_service = HealthService::new(users, config.health.clone());

        let workers = Workers {
            session_cleanup: SessionCleanupWorker::new(sessions, clock, config.auth.session_cleanup_interval_secs),
        };

        Ok(App {
            services: ServiceContainer { account_service, reset_service },
            health_service,
            workers,
        })
    }
}

/// Applies the embedded migrations.
///
/// # Errors
/// Returns an error if a migration fails.
pub async fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    sqlx::migrate!().run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through tracing so they reach structured logs.
pub fn setup_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(ToString::to_string)
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();

        tracing::error!(panic.location = %location, panic.payload = %payload, "Panic occurred");
    }));
}
