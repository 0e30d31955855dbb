use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    cache::{RateDecision, RateWindows, Sweep, keys::rate_window_key},
    clock::Clock,
    config::Config,
    utils::path_has_prefix,
};

/// Maps a request to the identity its quota is counted against.
pub type IdentifyFn = Arc<dyn Fn(&Request<Body>) -> String + Send + Sync>;

const DEFAULT_TIER: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateTier {
    pub prefix: String,
    pub limit: u32,
}

#[derive(Serialize)]
struct TooManyRequests<'a> {
    error: &'static str,
    message: &'a str,
    #[serde(rename = "retryAfter")]
    retry_after: u64,
}

/// Fixed-window limiter with per-prefix quotas.
///
/// Each tier counts separately, so a client that exhausts the API quota can
/// still reach paths governed by another tier within the same window.
pub struct RateLimiter {
    windows: RateWindows,
    tiers: Vec<RateTier>,
    default_limit: u32,
    interval_ms: u64,
    message: String,
    identify: IdentifyFn,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(interval_ms: u64, default_limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: RateWindows::new(),
            tiers: Vec::new(),
            default_limit,
            interval_ms,
            message: "Too many requests, please try again later.".to_string(),
            identify: Arc::new(peer_address),
            clock,
        }
    }

    /// The site-wide limiter: admin and API tiers over a general default.
    pub fn general(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let limiter = Self::new(config.rate_limit_interval_ms, config.rate_limit_default, clock)
            .with_tier(&config.admin_prefix, config.rate_limit_admin)
            .with_tier(&config.api_prefix, config.rate_limit_api);
        if config.rate_limit_trust_proxy {
            limiter.with_identify(forwarded_address)
        } else {
            limiter
        }
    }

    /// The limiter guarding the contact form.
    pub fn contact(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let limiter = Self::new(
            config.contact_rate_limit_interval_ms,
            config.contact_rate_limit_max,
            clock,
        )
        .with_message("Too many contact requests from this IP, please try again after 15 minutes.");
        if config.rate_limit_trust_proxy {
            limiter.with_identify(forwarded_address)
        } else {
            limiter
        }
    }

    pub fn with_tier(mut self, prefix: &str, limit: u32) -> Self {
        self.tiers.push(RateTier {
            prefix: prefix.to_string(),
            limit,
        });
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_identify<F>(mut self, identify: F) -> Self
    where
        F: Fn(&Request<Body>) -> String + Send + Sync + 'static,
    {
        self.identify = Arc::new(identify);
        self
    }

    pub fn identify(&self, req: &Request<Body>) -> String {
        (self.identify)(req)
    }

    /// Tier name and quota for `path`; the longest matching prefix wins.
    pub fn limit_for(&self, path: &str) -> (&str, u32) {
        self.tiers
            .iter()
            .filter(|tier| path_has_prefix(path, &tier.prefix))
            .max_by_key(|tier| tier.prefix.len())
            .map(|tier| (tier.prefix.as_str(), tier.limit))
            .unwrap_or((DEFAULT_TIER, self.default_limit))
    }

    pub fn check(&self, path: &str, client: &str) -> RateDecision {
        self.check_at(path, client, self.clock.now_ms())
    }

    pub fn check_at(&self, path: &str, client: &str, now_ms: u64) -> RateDecision {
        let (tier, limit) = self.limit_for(path);
        let key = rate_window_key(tier, client);
        self.windows.check(&key, limit, self.interval_ms, now_ms)
    }

    pub fn sweep_at(&self, now_ms: u64) -> usize {
        self.windows.sweep_at(now_ms, self.interval_ms)
    }

    pub async fn check_rate_limit(self: Arc<Self>, req: Request<Body>, next: Next) -> Response {
        let client = self.identify(&req);
        let decision = self.check(req.uri().path(), &client);

        if decision.allowed {
            return next.run(req).await;
        }

        if decision.is_first_rejection() {
            tracing::warn!(
                client = %client,
                path = %req.uri().path(),
                limit = decision.limit,
                retry_after_ms = decision.retry_after_ms,
                "Rate limit exceeded"
            );
        } else {
            tracing::debug!(
                client = %client,
                count = decision.count,
                "Rate limit still exceeded"
            );
        }
        self.reject(&decision)
    }

    fn reject(&self, decision: &RateDecision) -> Response {
        let retry_after = decision.retry_after_secs();
        let body = Json(TooManyRequests {
            error: "Too Many Requests",
            message: &self.message,
            retry_after,
        });

        let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        response
    }
}

impl Sweep for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn sweep(&self) -> usize {
        self.sweep_at(self.clock.now_ms())
    }
}

/// Peer socket address as recorded by `into_make_service_with_connect_info`.
pub fn peer_address(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `X-Real-IP`, then the first `X-Forwarded-For` hop, then the peer address.
/// Only meaningful behind a proxy that sets these headers.
pub fn forwarded_address(req: &Request<Body>) -> String {
    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').map(str::trim).find(|ip| !ip.is_empty()))
        })
        .map(str::to_string)
        .unwrap_or_else(|| peer_address(req))
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}
