// Rate limiting middleware (global token bucket via governor)

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{extract::Request, middleware::Next, response::Response};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use once_cell::sync::Lazy;

use crate::types::AppError;

const REQUESTS_PER_SECOND: u32 = 50;
const BURST: u32 = 100;

static LIMITER: Lazy<Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>> = Lazy::new(|| {
    let quota = Quota::per_second(NonZeroU32::new(REQUESTS_PER_SECOND).expect("nonzero"))
        .allow_burst(NonZeroU32::new(BURST).expect("nonzero"));
    Arc::new(RateLimiter::direct(quota))
});

pub async fn rate_limiter_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    if LIMITER.check().is_err() {
        return Err(AppError::InvalidRequest("Rate limit exceeded".to_string()));
    }

    Ok(next.run(req).await)
}
