use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use dealscope_core::config::RateLimitConfig;

use crate::error::ApiError;
use crate::routes::AppState;

/// Fixed-window request limiter for the whole surface. Only active when
/// both rate limit variables are configured.
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    state: Mutex<Window>,
}

struct Window {
    started: Instant,
    count: u32,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            window: Duration::from_millis(config.window_ms),
            max_requests: config.max_requests,
            state: Mutex::new(Window { started: Instant::now(), count: 0 }),
        }
    }

    pub fn try_acquire(&self) -> bool {
        let mut window = self.state.lock().expect("rate limiter lock poisoned");
        if window.started.elapsed() >= self.window {
            window.started = Instant::now();
            window.count = 0;
        }
        if window.count >= self.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}

pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(limiter) = &state.rate_limiter {
        if !limiter.try_acquire() {
            return ApiError::TooManyRequests.into_response();
        }
    }
    next.run(request).await
}
