use crate::api::AppState;
use crate::config::RateLimitConfig;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Method, StatusCode, header},
    middleware::Next,
    response::Response,
};
use ipnetwork::IpNetwork;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_governor::GovernorError;
use tower_governor::key_extractor::KeyExtractor;

/// Limiter bucket a route belongs to.
///
/// Every credential route costs an Argon2 hash or a reset-token guess, so they
/// share one strict bucket per client. Logging out only touches the session
/// store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateTier {
    Credential,
    Standard,
}

impl RateTier {
    /// Tier of a routed request, `None` for paths with no limiter.
    #[must_use]
    pub fn classify(method: &Method, path: &str) -> Option<Self> {
        if *method == Method::DELETE && path == "/v1/sessions" {
            return Some(Self::Standard);
        }
        let credential_route = (*method == Method::POST
            && matches!(path, "/v1/users" | "/v1/sessions" | "/v1/password-resets"))
            || ((*method == Method::GET || *method == Method::POST) && is_reset_path(path));
        credential_route.then_some(Self::Credential)
    }

    /// `(replenish interval in ns, burst)` for this tier.
    #[must_use]
    pub fn quota(self, config: &RateLimitConfig) -> (u64, u32) {
        let (per_second, burst) = match self {
            Self::Credential => (config.auth_per_second, config.auth_burst),
            Self::Standard => (config.per_second, config.burst),
        };
        (1_000_000_000 / u64::from(per_second.max(1)), burst.max(1))
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Credential => "credential",
            Self::Standard => "standard",
        }
    }
}

fn is_reset_path(path: &str) -> bool {
    path.strip_prefix("/reset/").is_some_and(|token| !token.is_empty() && !token.contains('/'))
}

/// Limiter key: the client address as seen through our own proxies.
///
/// `X-Forwarded-For` is consulted only when the TCP peer is a trusted proxy.
/// Hops are read right to left, skipping our own infrastructure; the first
/// address outside it is the client. Hops that are not IP addresses are
/// ignored, and a chain made only of trusted hops keys on the peer.
#[derive(Clone, Debug)]
pub struct ClientIp {
    trusted_proxies: Arc<[IpNetwork]>,
}

impl ClientIp {
    #[must_use]
    pub fn new(trusted_proxies: Vec<IpNetwork>) -> Self {
        Self { trusted_proxies: trusted_proxies.into() }
    }

    #[must_use]
    pub fn resolve(&self, peer: IpAddr, forwarded_for: Option<&str>) -> IpAddr {
        let Some(chain) = forwarded_for.filter(|_| self.is_proxy(peer)) else {
            return peer;
        };

        chain
            .rsplit(',')
            .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
            .find(|hop| !self.is_proxy(*hop))
            .unwrap_or(peer)
    }

    fn is_proxy(&self, addr: IpAddr) -> bool {
        self.trusted_proxies.iter().any(|net| net.contains(addr))
    }
}

impl KeyExtractor for ClientIp {
    type Key = IpAddr;

    fn extract<T>(&self, req: &axum::http::Request<T>) -> Result<Self::Key, GovernorError> {
        let ConnectInfo(peer) =
            req.extensions().get::<ConnectInfo<SocketAddr>>().ok_or(GovernorError::UnableToExtractKey)?;
        let forwarded_for = req.headers().get("x-forwarded-for").and_then(|v| v.to_str().ok());

        Ok(self.resolve(peer.ip(), forwarded_for))
    }
}

/// Counts limiter outcomes per tier.
#[derive(Clone, Debug)]
pub struct RateLimitMetrics {
    decisions_total: Counter<u64>,
}

impl RateLimitMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            decisions_total: global::meter("latchkey-server")
                .u64_counter("latchkey_rate_limit_decisions_total")
                .with_description("Rate limiter outcomes by tier (allowed/throttled)")
                .build(),
        }
    }

    fn record(&self, tier: RateTier, response: &Response) {
        let throttled = response.status() == StatusCode::TOO_MANY_REQUESTS;
        if throttled {
            let retry_after = response.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok());
            tracing::warn!(tier = tier.label(), retry_after_secs = ?retry_after, "Rate limit exceeded");
        }

        let outcome = if throttled { "throttled" } else { "allowed" };
        self.decisions_total
            .add(1, &[KeyValue::new("tier", tier.label()), KeyValue::new("outcome", outcome)]);
    }
}

impl Default for RateLimitMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn record_rate_limit_outcome(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let tier = RateTier::classify(req.method(), req.uri().path());
    let response = next.run(req).await;

    if let Some(tier) = tier {
        state.rate_limit_metrics.record(tier, &response);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn behind_proxy() -> ClientIp {
        ClientIp::new(vec!["10.0.0.0/8".parse().unwrap(), "127.0.0.1/32".parse().unwrap()])
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_direct_client_cannot_spoof_forwarded_for() {
        let peer = ip("203.0.113.9");
        assert_eq!(behind_proxy().resolve(peer, Some("1.2.3.4")), peer);
    }

    #[test]
    fn test_proxy_chain_resolves_to_nearest_untrusted_hop() {
        let client = behind_proxy().resolve(ip("10.0.0.2"), Some("6.6.6.6, 198.51.100.7, 10.0.0.3"));
        assert_eq!(client, ip("198.51.100.7"));
    }

    #[test]
    fn test_chain_of_only_proxies_keys_on_peer() {
        let peer = ip("10.0.0.2");
        assert_eq!(behind_proxy().resolve(peer, Some("10.1.1.1, not-an-ip")), peer);
        assert_eq!(behind_proxy().resolve(peer, None), peer);
    }

    #[test]
    fn test_classify_routes() {
        assert_eq!(RateTier::classify(&Method::POST, "/v1/sessions"), Some(RateTier::Credential));
        assert_eq!(RateTier::classify(&Method::DELETE, "/v1/sessions"), Some(RateTier::Standard));
        assert_eq!(RateTier::classify(&Method::POST, "/v1/users"), Some(RateTier::Credential));
        assert_eq!(RateTier::classify(&Method::POST, "/v1/password-resets"), Some(RateTier::Credential));
        assert_eq!(RateTier::classify(&Method::GET, "/reset/abc"), Some(RateTier::Credential));
        assert_eq!(RateTier::classify(&Method::POST, "/reset/abc"), Some(RateTier::Credential));
        assert_eq!(RateTier::classify(&Method::GET, "/reset/"), None);
        assert_eq!(RateTier::classify(&Method::GET, "/livez"), None);
    }

    #[test]
    fn test_quota_never_divides_by_zero() {
        let config = RateLimitConfig { per_second: 0, burst: 0, auth_per_second: 4, auth_burst: 2 };
        assert_eq!(RateTier::Standard.quota(&config), (1_000_000_000, 1));
        assert_eq!(RateTier::Credential.quota(&config), (250_000_000, 2));
    }
}
