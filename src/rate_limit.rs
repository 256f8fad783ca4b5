/// Rate limiting
///
/// Fixed-window counters keyed by caller address, with independent
/// buckets for authentication and document export. Exceeding a cap is
/// a throttling signal (429), distinct from validation failures.
use crate::{
    context::AppContext,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Request class with its own window cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// register / login / reset / change-password
    Auth,
    /// document generation
    Export,
}

impl Bucket {
    fn as_str(&self) -> &'static str {
        match self {
            Bucket::Auth => "auth",
            Bucket::Export => "export",
        }
    }
}

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window: Duration,
    pub auth_max: u32,
    pub export_max: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: Duration::from_secs(15 * 60),
            auth_max: 20,
            export_max: 50,
        }
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<(String, Bucket), Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request against `bucket` for `key`
    pub fn check(&self, key: &str, bucket: Bucket) -> ApiResult<()> {
        self.check_at(key, bucket, Instant::now())
    }

    fn check_at(&self, key: &str, bucket: Bucket, now: Instant) -> ApiResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let cap = match bucket {
            Bucket::Auth => self.config.auth_max,
            Bucket::Export => self.config.export_max,
        };

        let mut windows = self.windows.lock().expect("rate limit map poisoned");

        // Keep the map bounded when many distinct addresses churn through
        if windows.len() > 100_000 {
            let window = self.config.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows
            .entry((key.to_string(), bucket))
            .or_insert(Window { started: now, count: 0 });

        let elapsed = now.duration_since(entry.started);
        if elapsed >= self.config.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= cap {
            crate::metrics::RATE_LIMIT_REJECTIONS_TOTAL
                .with_label_values(&[bucket.as_str()])
                .inc();
            let retry_after = self.config.window.saturating_sub(elapsed);
            return Err(ApiError::RateLimited { retry_after });
        }

        entry.count += 1;
        Ok(())
    }
}

/// Middleware guarding authentication endpoints
pub async fn auth_rate_limit(
    State(ctx): State<AppContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    ctx.rate_limiter.check(&addr.ip().to_string(), Bucket::Auth)?;
    Ok(next.run(request).await)
}

/// Middleware guarding export endpoints
pub async fn export_rate_limit(
    State(ctx): State<AppContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    ctx.rate_limiter.check(&addr.ip().to_string(), Bucket::Export)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimitConfig::default())
    }

    #[test]
    fn auth_bucket_caps_at_twenty() {
        let limiter = limiter();
        let start = Instant::now();

        for _ in 0..20 {
            limiter.check_at("10.0.0.1", Bucket::Auth, start).unwrap();
        }

        let err = limiter.check_at("10.0.0.1", Bucket::Auth, start).unwrap_err();
        assert!(matches!(err, ApiError::RateLimited { .. }));
    }

    #[test]
    fn fresh_window_resets_the_counter() {
        let limiter = limiter();
        let start = Instant::now();

        for _ in 0..20 {
            limiter.check_at("10.0.0.1", Bucket::Auth, start).unwrap();
        }
        assert!(limiter.check_at("10.0.0.1", Bucket::Auth, start).is_err());

        let next_window = start + Duration::from_secs(15 * 60);
        limiter.check_at("10.0.0.1", Bucket::Auth, next_window).unwrap();
    }

    #[test]
    fn buckets_are_independent() {
        let limiter = limiter();
        let start = Instant::now();

        for _ in 0..20 {
            limiter.check_at("10.0.0.1", Bucket::Auth, start).unwrap();
        }
        assert!(limiter.check_at("10.0.0.1", Bucket::Auth, start).is_err());

        // Export bucket still has room for the same key
        limiter.check_at("10.0.0.1", Bucket::Export, start).unwrap();
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter();
        let start = Instant::now();

        for _ in 0..20 {
            limiter.check_at("10.0.0.1", Bucket::Auth, start).unwrap();
        }
        limiter.check_at("10.0.0.2", Bucket::Auth, start).unwrap();
    }

    #[test]
    fn export_bucket_caps_at_fifty() {
        let limiter = limiter();
        let start = Instant::now();

        for _ in 0..50 {
            limiter.check_at("10.0.0.1", Bucket::Export, start).unwrap();
        }
        assert!(limiter.check_at("10.0.0.1", Bucket::Export, start).is_err());
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        });
        let start = Instant::now();

        for _ in 0..100 {
            limiter.check_at("10.0.0.1", Bucket::Auth, start).unwrap();
        }
    }
}
