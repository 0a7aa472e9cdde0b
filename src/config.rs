use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

/// Upper bound for token and session lifetimes (one year).
pub const MAX_TTL_SECS: i64 = 365 * 86_400;

#[derive(Clone, Debug, Default, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub mail: MailConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    #[command(flatten)]
    pub health: HealthConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "LATCHKEY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "LATCHKEY_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the management (health) listener
    #[arg(long, env = "LATCHKEY_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Public base URL used to build reset links. Falls back to `http://<Host header>` when unset.
    #[arg(long, env = "LATCHKEY_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Seconds to wait for background work to drain on shutdown
    #[arg(long, env = "LATCHKEY_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction
    #[arg(
        long,
        env = "LATCHKEY_TRUSTED_PROXIES",
        default_value = "10.0.0.0/8,172.16.0.0/12,192.168.0.0/16,127.0.0.1/32",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            mgmt_port: 0,
            public_base_url: None,
            shutdown_timeout_secs: 5,
            trusted_proxies: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL. When unset, users and sessions are kept in memory.
    #[arg(long = "database-url", env = "LATCHKEY_DATABASE_URL")]
    pub url: Option<String>,

    /// Maximum number of pooled connections
    #[arg(long, env = "LATCHKEY_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection
    #[arg(long, env = "LATCHKEY_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 5)]
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: None, max_connections: 20, acquire_timeout_secs: 5 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Password reset token time-to-live in seconds
    #[arg(
        long,
        env = "LATCHKEY_RESET_TOKEN_TTL_SECS",
        default_value_t = 3600,
        value_parser = clap::value_parser!(i64).range(1..=MAX_TTL_SECS)
    )]
    pub reset_token_ttl_secs: i64,

    /// Login session time-to-live in seconds
    #[arg(
        long,
        env = "LATCHKEY_SESSION_TTL_SECS",
        default_value_t = 86_400,
        value_parser = clap::value_parser!(i64).range(1..=MAX_TTL_SECS)
    )]
    pub session_ttl_secs: i64,

    /// How often to purge expired sessions (0 disables the sweep)
    #[arg(long, env = "LATCHKEY_SESSION_CLEANUP_INTERVAL_SECS", default_value_t = 300)]
    pub session_cleanup_interval_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { reset_token_ttl_secs: 3600, session_ttl_secs: 86_400, session_cleanup_interval_secs: 300 }
    }
}

#[derive(Clone, Debug, Args)]
pub struct MailConfig {
    /// SendGrid API key. When unset, outgoing mail is only logged.
    #[arg(long = "sendgrid-api-key", env = "LATCHKEY_SENDGRID_API_KEY", hide_env_values = true)]
    pub sendgrid_api_key: Option<String>,

    /// Base URL of the SendGrid API
    #[arg(long, env = "LATCHKEY_SENDGRID_API_BASE", default_value = "https://api.sendgrid.com")]
    pub api_base: String,

    /// Verified sender address for outgoing mail
    #[arg(long = "mail-from", env = "LATCHKEY_MAIL_FROM", default_value = "no-reply@localhost")]
    pub from_address: String,

    /// Timeout for a single delivery request in seconds
    #[arg(long, env = "LATCHKEY_MAIL_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sendgrid_api_key: None,
            api_base: "https://api.sendgrid.com".to_string(),
            from_address: "no-reply@localhost".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed for standard endpoints
    #[arg(long, env = "LATCHKEY_RATE_LIMIT_PER_SECOND", default_value_t = 10)]
    pub per_second: u32,

    /// Burst allowance for standard endpoints
    #[arg(long, env = "LATCHKEY_RATE_LIMIT_BURST", default_value_t = 20)]
    pub burst: u32,

    /// Stricter rate limit for credential endpoints (register/login/reset)
    #[arg(long, env = "LATCHKEY_AUTH_RATE_LIMIT_PER_SECOND", default_value_t = 1)]
    pub auth_per_second: u32,

    /// Burst allowance for credential endpoints
    #[arg(long, env = "LATCHKEY_AUTH_RATE_LIMIT_BURST", default_value_t = 3)]
    pub auth_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { per_second: 10, burst: 20, auth_per_second: 1, auth_burst: 3 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// OTLP collector endpoint. Traces and metrics are only exported when set.
    #[arg(long, env = "LATCHKEY_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "LATCHKEY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the database readiness check in milliseconds
    #[arg(long, env = "LATCHKEY_HEALTH_DB_TIMEOUT_MS", default_value_t = 2000)]
    pub db_timeout_ms: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { db_timeout_ms: 2000 }
    }
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
