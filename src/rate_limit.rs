/// Rate Limiting System
use crate::config::RateLimitSettings;
use crate::error::{AppError, AppResult};
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

const DEFAULT_AUTHENTICATED_RPS: NonZeroU32 = match NonZeroU32::new(50) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};
const DEFAULT_UNAUTHENTICATED_RPS: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<DirectLimiter>,
    unauthenticated: Arc<DirectLimiter>,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        let auth_rps =
            NonZeroU32::new(settings.authenticated_rps).unwrap_or(DEFAULT_AUTHENTICATED_RPS);
        let unauth_rps =
            NonZeroU32::new(settings.unauthenticated_rps).unwrap_or(DEFAULT_UNAUTHENTICATED_RPS);

        // Burst equals one second's worth of requests
        let auth_quota = Quota::per_second(auth_rps).allow_burst(auth_rps);
        let unauth_quota = Quota::per_second(unauth_rps).allow_burst(unauth_rps);

        Self {
            enabled: settings.enabled,
            authenticated: Arc::new(GovernorLimiter::direct(auth_quota)),
            unauthenticated: Arc::new(GovernorLimiter::direct(unauth_quota)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check rate limit for a request carrying a bearer token
    pub fn check_authenticated(&self) -> AppResult<()> {
        Self::check(&self.authenticated)
    }

    /// Check rate limit for anonymous requests
    pub fn check_unauthenticated(&self) -> AppResult<()> {
        Self::check(&self.unauthenticated)
    }

    fn check(limiter: &DirectLimiter) -> AppResult<()> {
        limiter.check().map_err(|_| AppError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Response {
    if !ctx.rate_limiter.is_enabled() {
        return next.run(request).await;
    }

    let has_auth_header = request.headers().contains_key(header::AUTHORIZATION);

    let result = if has_auth_header {
        ctx.rate_limiter.check_authenticated()
    } else {
        ctx.rate_limiter.check_unauthenticated()
    };

    match result {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::debug!("Rate limit exceeded for {}", request.uri().path());
            crate::metrics::record_rate_limited();
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(authenticated_rps: u32, unauthenticated_rps: u32) -> RateLimitSettings {
        RateLimitSettings {
            enabled: true,
            authenticated_rps,
            unauthenticated_rps,
        }
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(&settings(50, 10));

        assert!(limiter.is_enabled());
        assert!(limiter.check_authenticated().is_ok());
        assert!(limiter.check_unauthenticated().is_ok());
    }

    #[test]
    fn test_burst_limit() {
        let limiter = RateLimiter::new(&settings(5, 2));

        for _ in 0..5 {
            assert!(limiter.check_authenticated().is_ok());
        }
        assert!(matches!(
            limiter.check_authenticated(),
            Err(AppError::RateLimitExceeded { .. })
        ));

        // Buckets are independent
        assert!(limiter.check_unauthenticated().is_ok());
        assert!(limiter.check_unauthenticated().is_ok());
        assert!(limiter.check_unauthenticated().is_err());
    }

    #[test]
    fn test_zero_rate_falls_back_to_default() {
        let limiter = RateLimiter::new(&settings(0, 0));
        for _ in 0..10 {
            assert!(limiter.check_unauthenticated().is_ok());
        }
    }
}
