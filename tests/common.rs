#![allow(dead_code)]

use async_trait::async_trait;
use latchkey_server::api::{MgmtState, app_router, mgmt_router};
use latchkey_server::adapters::database::{self, DbPool};
use latchkey_server::config::Config;
use latchkey_server::domain::clock::ManualClock;
use latchkey_server::services::mailer::{MailError, Mailer, OutgoingEmail};
use latchkey_server::{AppBuilder, telemetry};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::net::TcpListener;

/// Captures every delivery attempt; can be switched to reject them.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Token from the link in the most recent message.
    pub fn last_reset_token(&self) -> String {
        let sent = self.sent();
        let body = &sent.last().expect("no mail was sent").body;
        let start = body.find("/reset/").expect("no reset link in body") + "/reset/".len();
        body[start..].split_whitespace().next().unwrap().to_string()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Rejected { status: 503 });
        }
        Ok(())
    }
}

/// Migrated pool for `DATABASE_URL`, or `None` when no database is configured.
pub async fn get_test_pool() -> Option<DbPool> {
    telemetry::init_test_telemetry();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        println!("DATABASE_URL not set; skipping Postgres-backed test");
        return None;
    };

    let config = get_test_config();
    let pool =
        database::init_pool(&database_url, &config.database).await.expect("Failed to connect to DB. Is Postgres running?");
    sqlx::migrate!().run(&pool).await.expect("Failed to run migrations");

    Some(pool)
}

/// Current time truncated to whole seconds, so expiry instants survive a
/// round trip through `TIMESTAMPTZ` unchanged.
pub fn whole_second_now() -> OffsetDateTime {
    OffsetDateTime::now_utc().replace_nanosecond(0).unwrap()
}

pub fn get_test_config() -> Config {
    let mut config = Config::default();
    config.rate_limit.per_second = 10_000;
    config.rate_limit.burst = 10_000;
    config.rate_limit.auth_per_second = 10_000;
    config.rate_limit.auth_burst = 10_000;
    config.auth.session_cleanup_interval_secs = 0;
    config.server.trusted_proxies = vec!["127.0.0.1/32".parse().unwrap(), "::1/128".parse().unwrap()];
    config
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub mailer: Arc<RecordingMailer>,
    pub clock: ManualClock,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        Self::spawn_inner(config, None).await
    }

    pub async fn spawn_with_database(config: Config, pool: DbPool) -> Self {
        Self::spawn_inner(config, Some(pool)).await
    }

    async fn spawn_inner(config: Config, pool: Option<DbPool>) -> Self {
        telemetry::init_test_telemetry();

        let mailer = Arc::new(RecordingMailer::default());
        let clock = ManualClock::new(whole_second_now());

        let mut builder = AppBuilder::new(config.clone()).with_mailer(mailer.clone()).with_clock(Arc::new(clock.clone()));
        if let Some(pool) = pool {
            builder = builder.with_database(pool);
        }
        let app = builder.build().unwrap();

        let router = app_router(config, app.services);
        let mgmt = mgmt_router(MgmtState { health_service: app.health_service });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_addr = mgmt_listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        Self {
            server_url: format!("http://{addr}"),
            mgmt_url: format!("http://{mgmt_addr}"),
            client: reqwest::Client::new(),
            mailer,
            clock,
        }
    }

    pub async fn register(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/v1/users", self.server_url))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/v1/sessions", self.server_url))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap()
    }

    pub async fn login_token(&self, username: &str, password: &str) -> String {
        let resp = self.login(username, password).await;
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn request_reset(&self, username: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/v1/password-resets", self.server_url))
            .json(&json!({ "username": username }))
            .send()
            .await
            .unwrap()
    }

    pub async fn check_reset(&self, token: &str) -> reqwest::Response {
        self.client.get(format!("{}/reset/{token}", self.server_url)).send().await.unwrap()
    }

    pub async fn complete_reset(&self, token: &str, password: &str, confirm: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/reset/{token}", self.server_url))
            .json(&json!({ "password": password, "confirmPassword": confirm }))
            .send()
            .await
            .unwrap()
    }
}
