/// Rate Limiting System
///
/// Two process-wide buckets: a tight one for credential endpoints (login,
/// registration, OTP) and a looser one for everything else.
use crate::{
    config::RateLimitConfig,
    error::{IcuError, IcuResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

const CREDENTIAL_PATHS: [&str; 3] = ["/auth/login", "/auth/register", "/patient-auth/"];

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    credential: Arc<DirectLimiter>,
    general: Arc<DirectLimiter>,
}

fn quota(rps: u32, burst: u32) -> Quota {
    let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(rps);
    Quota::per_second(rps).allow_burst(burst)
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            credential: Arc::new(GovernorLimiter::direct(quota(
                config.credential_rps,
                (config.burst_size / 5).max(1),
            ))),
            general: Arc::new(GovernorLimiter::direct(quota(
                config.general_rps,
                config.burst_size,
            ))),
        }
    }

    /// Whether a path draws from the credential bucket
    pub fn is_credential_path(path: &str) -> bool {
        CREDENTIAL_PATHS.iter().any(|p| path.starts_with(p))
    }

    /// Check the bucket for this path
    pub fn check(&self, path: &str) -> IcuResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let limiter = if Self::is_credential_path(path) {
            &self.credential
        } else {
            &self.general
        };

        limiter.check().map_err(|_| IcuError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, IcuError> {
    if let Err(e) = ctx.rate_limiter.check(request.uri().path()) {
        tracing::warn!("Rate limit exceeded on {}", request.uri().path());
        return Err(e);
    }

    Ok(next.run(request).await)
}
