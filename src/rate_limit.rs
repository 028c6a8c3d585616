use crate::config::RateLimitConfig;
use crate::error::ForumError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const GENERAL_WINDOW: Duration = Duration::from_secs(15 * 60);
const REGISTRATION_WINDOW: Duration = Duration::from_secs(60 * 60);
const SEARCH_WINDOW: Duration = Duration::from_secs(60);

/// One request budget, tracked separately for every client address.
pub struct RateLimit {
    name: &'static str,
    message: &'static str,
    trust_proxy: bool,
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl RateLimit {
    /// Allow `budget` requests per `window`, all of which may arrive at once.
    pub fn new(
        name: &'static str,
        message: &'static str,
        budget: NonZeroU32,
        window: Duration,
        trust_proxy: bool,
    ) -> Self {
        let quota = Quota::with_period(window / budget.get())
            .unwrap_or_else(|| Quota::per_second(budget))
            .allow_burst(budget);

        Self {
            name,
            message,
            trust_proxy,
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Peer address, or the first `X-Forwarded-For` hop when running behind a trusted proxy.
    fn client_ip(&self, request: &Request) -> IpAddr {
        if self.trust_proxy {
            let forwarded = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .and_then(|hop| hop.trim().parse().ok());
            if let Some(ip) = forwarded {
                return ip;
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    fn check(&self, client: IpAddr) -> Result<(), ForumError> {
        self.limiter.check_key(&client).map_err(|_| {
            debug!("{} rate limit exceeded by {client}", self.name);
            ForumError::RateLimited(self.message)
        })
    }
}

/// The forum's three budgets.
pub struct RateLimits {
    pub general: Arc<RateLimit>,
    pub registration: Arc<RateLimit>,
    pub search: Arc<RateLimit>,
}

impl RateLimits {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            general: Arc::new(RateLimit::new(
                "general",
                "Too many requests, please try again later",
                config.general,
                GENERAL_WINDOW,
                config.trust_proxy,
            )),
            registration: Arc::new(RateLimit::new(
                "registration",
                "Too many registration attempts, please try again later",
                config.registration,
                REGISTRATION_WINDOW,
                config.trust_proxy,
            )),
            search: Arc::new(RateLimit::new(
                "search",
                "Too many search requests, please slow down",
                config.search,
                SEARCH_WINDOW,
                config.trust_proxy,
            )),
        }
    }

    /// Forget clients whose budgets have fully recovered.
    pub fn retain_recent(&self) {
        for limit in [&self.general, &self.registration, &self.search] {
            limit.limiter.retain_recent();
            limit.limiter.shrink_to_fit();
        }
    }
}

/// Middleware answering 429 once the caller has spent its budget.
pub async fn enforce_rate_limit(
    State(limit): State<Arc<RateLimit>>,
    request: Request,
    next: Next,
) -> Response {
    let client = limit.client_ip(&request);
    match limit.check(client) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
