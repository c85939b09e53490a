//! Per-IP rate limiting middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::extractors::client_ip_from_headers;
use crate::response::ApiError;
use crate::state::AppState;

/// Token bucket rate limiter.
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    config: RateLimitConfig,
}

#[derive(Clone)]
pub struct RateLimitConfig {
    /// Requests per second
    pub rate: u32,
    /// Burst size
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rate: 50,
            burst: 100,
        }
    }
}

impl RateLimitConfig {
    /// Stricter bucket for credential endpoints.
    pub fn auth() -> Self {
        Self { rate: 2, burst: 10 }
    }
}

struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(burst: u32) -> Self {
        Self {
            tokens: burst as f64,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, rate: u32, burst: u32) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;

        // Replenish tokens
        self.tokens = (self.tokens + elapsed * rate as f64).min(burst as f64);

        // Try to consume a token
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Check if request is allowed for the given key.
    pub fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock();

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.config.burst));

        bucket.try_acquire(self.config.rate, self.config.burst)
    }

    /// Clean up stale buckets.
    pub fn cleanup(&self, max_age: Duration) {
        let mut buckets = self.buckets.lock();
        let now = Instant::now();

        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
    }
}

/// Shared rate limiter state.
pub type SharedRateLimiter = Arc<RateLimiter>;

/// Middleware applying the general per-IP bucket.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    check_limit(&state.rate_limiter, &request)?;
    Ok(next.run(request).await)
}

/// Middleware applying the stricter auth bucket.
pub async fn auth_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    check_limit(&state.auth_limiter, &request)?;
    Ok(next.run(request).await)
}

fn check_limit(limiter: &SharedRateLimiter, request: &Request) -> Result<(), ApiError> {
    let ip = client_ip_from_headers(request.headers()).unwrap_or_else(|| "unknown".to_string());

    if limiter.check(&ip) {
        Ok(())
    } else {
        Err(ApiError::rate_limited("rate limit exceeded", Some(1)))
    }
}
