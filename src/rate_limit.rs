//! Login throttling.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::AppState;

/// Global token bucket.
///
/// Not keyed by client address: all login attempts share one bucket.
#[derive(Debug)]
pub struct SimpleRateLimiter {
    /// (last refill, tokens available)
    state: Mutex<(Instant, f32)>,
    rate_per_sec: f32,
    burst_size: f32,
}

impl SimpleRateLimiter {
    #[must_use]
    pub fn new(rate_per_sec: f32, burst_size: f32) -> Self {
        Self {
            state: Mutex::new((Instant::now(), burst_size)),
            rate_per_sec,
            burst_size,
        }
    }

    /// Take one token if available.
    pub fn check(&self) -> bool {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (last_update, tokens) = *guard;
        let now = Instant::now();
        let elapsed = now.duration_since(last_update).as_secs_f32();

        let available = (tokens + elapsed * self.rate_per_sec).min(self.burst_size);
        if available >= 1.0 {
            *guard = (now, available - 1.0);
            true
        } else {
            *guard = (now, available);
            false
        }
    }
}

/// Reject login attempts beyond the configured rate.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if !state.login_limiter.check() {
        warn!(name: "auth.login.throttled", "Login attempt rejected by rate limiter");
        return (StatusCode::TOO_MANY_REQUESTS, "Too many login attempts, try again shortly")
            .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_simple_rate_limiter() {
        let limiter = SimpleRateLimiter::new(2.0, 5.0); // 2 req/s, 5 burst

        for _ in 0..5 {
            assert!(limiter.check());
        }

        // Next should fail (immediate)
        assert!(!limiter.check());

        // Wait for 0.6s -> +1.2 tokens -> check consumes 1 -> 0.2 left
        std::thread::sleep(Duration::from_millis(600));
        assert!(limiter.check());

        assert!(!limiter.check());
    }
}
