use crate::api::rate_limit::{ClientIp, RateLimitMetrics, RateTier, record_rate_limit_outcome};
use crate::config::Config;
use crate::services::account_service::AccountService;
use crate::services::health_service::HealthService;
use crate::services::reset_service::ResetService;
use axum::body::Body;
use axum::http::{HeaderName, Request};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_governor::GovernorLayer;
use tower_governor::governor::GovernorConfigBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod health;
pub mod middleware;
pub mod password_reset;
pub mod rate_limit;
pub mod schemas;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Config,
    pub account_service: AccountService,
    pub reset_service: ResetService,
    pub rate_limit_metrics: RateLimitMetrics,
}

#[derive(Clone, Debug)]
pub struct MgmtState {
    pub health_service: HealthService,
}

#[derive(Debug)]
pub struct ServiceContainer {
    pub account_service: AccountService,
    pub reset_service: ResetService,
}

/// Configures and returns the primary application router.
///
/// # Panics
/// Panics if the rate limiter configuration cannot be constructed.
pub fn app_router(config: Config, services: ServiceContainer) -> Router {
    let client_ip = ClientIp::new(config.server.trusted_proxies.clone());
    let limiter = |tier: RateTier| {
        let (interval_ns, burst) = tier.quota(&config.rate_limit);
        GovernorLayer::new(Arc::new(
            GovernorConfigBuilder::default()
                .per_nanosecond(interval_ns)
                .burst_size(burst)
                .key_extractor(client_ip.clone())
                .finish()
                .expect("Failed to build rate limiter config"),
        ))
    };
    let credential_limit = limiter(RateTier::Credential);
    let standard_limit = limiter(RateTier::Standard);

    let state = AppState {
        config,
        account_service: services.account_service,
        reset_service: services.reset_service,
        rate_limit_metrics: RateLimitMetrics::new(),
    };

    Router::new()
        .route("/v1/users", post(auth::register).layer(credential_limit.clone()))
        .route(
            "/v1/sessions",
            post(auth::login).layer(credential_limit.clone()).merge(delete(auth::logout).layer(standard_limit)),
        )
        .route("/v1/password-resets", post(password_reset::request_reset).layer(credential_limit.clone()))
        .route(
            "/reset/{token}",
            get(password_reset::validate_reset).post(password_reset::complete_reset).layer(credential_limit),
        )
        .layer(from_fn_with_state(state.clone(), record_rate_limit_outcome))
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER)))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .extensions()
                        .get::<tower_http::request_id::RequestId>()
                        .and_then(|id| id.header_value().to_str().ok())
                        .unwrap_or_default()
                        .to_string();

                    tracing::info_span!(
                        "request",
                        "request_id" = %request_id,
                        "http.request.method" = %request.method(),
                        "url.path" = %redact_reset_path(request.uri().path()),
                        "http.response.status_code" = tracing::field::Empty,
                        "otel.kind" = "server",
                        "user_id" = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, _span: &tracing::Span| {
                        let status = response.status();
                        tracing::Span::current().record("http.response.status_code", status.as_u16());

                        tracing::info!(
                            latency_ms = %latency.as_millis(),
                            status = %status.as_u16(),
                            "request completed"
                        );
                    },
                )
                .on_failure(|error, _latency, _span: &tracing::Span| {
                    tracing::error!(error = %error, "request failed");
                }),
        )
        .layer(SetRequestIdLayer::new(HeaderName::from_static(REQUEST_ID_HEADER), MakeRequestUuid))
        .with_state(state)
}

pub fn mgmt_router(state: MgmtState) -> Router {
    Router::new().route("/livez", get(health::livez)).route("/readyz", get(health::readyz)).with_state(state)
}

/// Reset tokens travel in the path; keep them out of request logs.
fn redact_reset_path(path: &str) -> &str {
    if path.starts_with("/reset/") { "/reset/{token}" } else { path }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_token_is_redacted_from_span_path() {
        assert_eq!(redact_reset_path("/reset/abcdef"), "/reset/{token}");
        assert_eq!(redact_reset_path("/v1/sessions"), "/v1/sessions");
    }
}
