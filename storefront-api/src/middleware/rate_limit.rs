/// Per-client rate limiting for sensitive auth endpoints
///
/// Login, registration, verification resend and password reset are throttled
/// per client IP with a keyed `governor` limiter. The quota is
/// `AUTH_RATE_LIMIT_PER_MINUTE` with an equal burst, replenishing one request
/// every `60 / limit` seconds.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: requests allowed per minute
/// - `X-RateLimit-Remaining`: requests left in the current burst
/// - `Retry-After`: seconds to wait (429 responses only)
///
/// # Client IP
///
/// Taken from the first `X-Forwarded-For` entry, then `X-Real-IP`, then the
/// socket peer address. Deploy behind a proxy that overwrites these headers.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    middleware::StateInformationMiddleware,
    state::keyed::DefaultKeyedStateStore,
    Quota,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// How often idle client entries are dropped
const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

type KeyedLimiter =
    governor::RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock, StateInformationMiddleware>;

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: u64 },
}

/// Rate limiter keyed by client IP
pub struct RateLimiter {
    requests_per_minute: u32,
    limiter: KeyedLimiter,
    clock: DefaultClock,
}

impl RateLimiter {
    /// A limiter allowing `requests_per_minute` with the same burst capacity
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = governor::RateLimiter::keyed(Quota::per_minute(per_minute))
            .with_middleware::<StateInformationMiddleware>();

        Self {
            requests_per_minute: per_minute.get(),
            limiter,
            clock: DefaultClock::default(),
        }
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    /// Consumes one request for `client`
    pub fn check(&self, client: IpAddr) -> RateLimitDecision {
        match self.limiter.check_key(&client) {
            Ok(snapshot) => RateLimitDecision::Allowed {
                remaining: snapshot.remaining_burst_capacity(),
            },
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                RateLimitDecision::Limited {
                    retry_after: wait.as_secs_f64().ceil().max(1.0) as u64,
                }
            }
        }
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Drops clients whose quota has fully replenished
    pub fn evict_idle(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

/// Periodically evicts idle clients until the runtime shuts down
pub fn spawn_eviction(limiter: Arc<RateLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EVICTION_INTERVAL);
        loop {
            interval.tick().await;
            limiter.evict_idle();
            tracing::trace!(clients = limiter.tracked_clients(), "Rate limiter evicted idle clients");
        }
    })
}

fn first_header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Best-effort client IP for rate limiting and audit logs
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<IpAddr> {
    first_header_ip(headers, "x-forwarded-for")
        .or_else(|| first_header_ip(headers, "x-real-ip"))
        .or_else(|| peer.map(|addr| addr.ip()))
}

/// Client IP of a request, using the `ConnectInfo` extension when present
pub fn request_ip(request: &Request) -> Option<IpAddr> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    client_ip(request.headers(), peer)
}

/// Rate limiting middleware layer
///
/// # Errors
///
/// - 429 Too Many Requests: the client's quota is used up
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = request_ip(&request).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    let remaining = match state.auth_limiter.check(ip) {
        RateLimitDecision::Allowed { remaining } => remaining,
        RateLimitDecision::Limited { retry_after } => {
            tracing::warn!(
                client_ip = %ip,
                path = %request.uri().path(),
                retry_after,
                "Rate limit exceeded"
            );
            return Err(ApiError::RateLimitExceeded {
                retry_after,
                message: format!("Too many requests. Try again in {} seconds.", retry_after),
            });
        }
    };

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from(state.auth_limiter.requests_per_minute()),
    );
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_limiter_blocks_after_budget() {
        let limiter = RateLimiter::per_minute(3);

        for expected in [2, 1, 0] {
            assert_eq!(
                limiter.check(ip(1)),
                RateLimitDecision::Allowed { remaining: expected }
            );
        }

        match limiter.check(ip(1)) {
            // 3 per minute = one request back every 20s
            RateLimitDecision::Limited { retry_after } => assert!((1..=20).contains(&retry_after)),
            other => panic!("expected a limited decision, got {:?}", other),
        }

        // Other clients have their own quota
        assert_eq!(limiter.check(ip(2)), RateLimitDecision::Allowed { remaining: 2 });
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_zero_limit_falls_back_to_one() {
        let limiter = RateLimiter::per_minute(0);
        assert_eq!(limiter.requests_per_minute(), 1);
        assert!(matches!(limiter.check(ip(1)), RateLimitDecision::Allowed { remaining: 0 }));
        assert!(matches!(limiter.check(ip(1)), RateLimitDecision::Limited { .. }));
    }

    #[test]
    fn test_evict_idle_keeps_limited_clients() {
        let limiter = RateLimiter::per_minute(1);
        limiter.check(ip(1));
        limiter.evict_idle();

        // Still inside its replenish window, so the client is kept and limited
        assert!(matches!(limiter.check(ip(1)), RateLimitDecision::Limited { .. }));
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "192.0.2.7:5000".parse().unwrap();

        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)), Some("192.0.2.7".parse().unwrap()));
        assert_eq!(client_ip(&headers, None), None);

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, Some(peer)), Some("198.51.100.2".parse().unwrap()));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, Some(peer)), Some("203.0.113.9".parse().unwrap()));

        headers.insert("x-forwarded-for", HeaderValue::from_static("garbage"));
        assert_eq!(client_ip(&headers, None), Some("198.51.100.2".parse().unwrap()));
    }
}
