//! Fixed-window rate limiter middleware.
//!
//! Limits requests to a configurable number per second. The current window
//! (epoch second) and its request count share one atomic word, so a window
//! reset and the first increment in it are a single compare-exchange.
//! Applied as an axum middleware.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Extension, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ErrorBody;

/// Low bits of the state word hold the count, high bits the window.
const COUNT_BITS: u32 = 20;
const COUNT_MASK: u64 = (1 << COUNT_BITS) - 1;

/// Shared state for the rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    /// Maximum requests allowed per second.
    max_per_sec: u64,
    /// `window << COUNT_BITS | count`.
    state: Arc<AtomicU64>,
}

impl RateLimiter {
    /// Create a new rate limiter allowing `max_per_sec` requests per second.
    pub fn new(max_per_sec: u64) -> Self {
        Self {
            max_per_sec: max_per_sec.min(COUNT_MASK),
            state: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Try to acquire a permit. Returns true if the request is allowed.
    pub fn try_acquire(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.try_acquire_at(now)
    }

    fn try_acquire_at(&self, now: u64) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let window = current >> COUNT_BITS;
            let count = current & COUNT_MASK;

            let next_count = if window == now {
                if count >= self.max_per_sec {
                    return false;
                }
                count + 1
            } else {
                1
            };

            let next = (now << COUNT_BITS) | next_count;
            match self
                .state
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Axum middleware that enforces the rate limit.
pub async fn rate_limit_middleware(
    Extension(limiter): Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.try_acquire() {
        next.run(req).await
    } else {
        tracing::warn!(path = %req.uri().path(), "Rate limit exceeded");
        (
            axum::http::StatusCode::TOO_MANY_REQUESTS,
            axum::Json(ErrorBody {
                error: "too_many_requests".to_string(),
                message: "Rate limit exceeded".to_string(),
            }),
        )
            .into_response()
    }
}
