use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

/// Rate limiter keyed by client IP address
pub type IpRateLimiter = Arc<RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>>;

/// Create a keyed rate limiter allowing `attempts` per `window_seconds` per IP.
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    let attempts = attempts.max(1);
    let period_ms = ((window_seconds * 1000) / attempts as u64).max(1);
    let quota = Quota::with_period(Duration::from_millis(period_ms))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN));

    Arc::new(RateLimiter::dashmap(quota))
}

/// Per-IP limiter and the source it reads client addresses from.
///
/// `x-forwarded-for` is set by whoever sends the request, so it only names the
/// client when every request arrives through a proxy that overwrites it.
/// Otherwise the socket peer address is used.
#[derive(Clone)]
pub struct IpRateLimit {
    pub limiter: IpRateLimiter,
    pub trust_forwarded_for: bool,
}

impl IpRateLimit {
    pub fn new(attempts: u32, window_seconds: u64, trust_forwarded_for: bool) -> Self {
        Self {
            limiter: create_ip_rate_limiter(attempts, window_seconds),
            trust_forwarded_for,
        }
    }

    fn client_ip(&self, request: &Request) -> Option<IpAddr> {
        let forwarded_ip = if self.trust_forwarded_for {
            request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        } else {
            None
        };

        forwarded_ip.or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
    }
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(rate_limit): State<IpRateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match rate_limit.client_ip(&request) {
        Some(ip) => match rate_limit.limiter.check_key(&ip) {
            Ok(_) => Ok(next.run(request).await),
            Err(negative) => {
                let wait_time = negative.wait_time_from(DefaultClock::default().now());
                tracing::warn!(ip = %ip, "Rate limit exceeded");
                Err(AppError::TooManyRequests(
                    "Too many requests from this IP. Please try again later.".to_string(),
                    Some(wait_time.as_secs()),
                ))
            }
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::StatusCode,
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use tower::util::ServiceExt;

    fn request_from(peer: [u8; 4], forwarded: &str) -> Request {
        let mut request = Request::builder()
            .uri("/")
            .header("x-forwarded-for", forwarded)
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
        request
    }

    fn app(rate_limit: IpRateLimit) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(rate_limit, ip_rate_limit_middleware))
    }

    #[tokio::test]
    async fn blocks_after_burst_per_peer() {
        let app = app(IpRateLimit::new(2, 60, false));

        for forwarded in ["1.1.1.1", "2.2.2.2"] {
            let res = app
                .clone()
                .oneshot(request_from([10, 0, 0, 1], forwarded))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        // A fresh forwarded address does not reset the peer's budget
        let res = app
            .clone()
            .oneshot(request_from([10, 0, 0, 1], "3.3.3.3"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let res = app
            .oneshot(request_from([10, 0, 0, 2], "3.3.3.3"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn trusted_forwarded_for_keys_by_first_hop() {
        let app = app(IpRateLimit::new(2, 60, true));
        let proxy = [127, 0, 0, 1];

        for _ in 0..2 {
            let res = app
                .clone()
                .oneshot(request_from(proxy, "10.0.0.1, 172.16.0.9"))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = app
            .clone()
            .oneshot(request_from(proxy, "10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().get("retry-after").is_some());

        let res = app.oneshot(request_from(proxy, "10.0.0.2")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_client_passes_through() {
        let app = app(IpRateLimit::new(1, 60, false));

        for _ in 0..3 {
            let request = Request::builder().uri("/").body(Body::empty()).unwrap();
            let res = app.clone().oneshot(request).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
    }
}
