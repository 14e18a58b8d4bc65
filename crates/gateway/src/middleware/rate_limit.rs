//! Rate limiting middleware using token bucket algorithm

use axum::{extract::Request, middleware::Next, response::Response};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use shopboard_common::AppError;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter using governor crate
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Shared limiter plus the configured rate, reported back on rejection
#[derive(Clone)]
pub struct RequestLimiter {
    limiter: Arc<GlobalRateLimiter>,
    per_second: u32,
}

/// Create a new rate limiter; zero values are raised to one
pub fn create_rate_limiter(requests_per_second: u32, burst: u32) -> RequestLimiter {
    let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(rate);
    let quota = Quota::per_second(rate).allow_burst(burst);

    RequestLimiter {
        limiter: Arc::new(RateLimiter::direct(quota)),
        per_second: rate.get(),
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    request: Request,
    next: Next,
    limiter: RequestLimiter,
) -> Result<Response, AppError> {
    match limiter.limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            Err(AppError::RateLimited {
                limit: limiter.per_second,
            })
        }
    }
}
