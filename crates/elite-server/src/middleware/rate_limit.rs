// Rate limiting for the public API
// A per-IP token bucket guards every route. Login, PIN and every endpoint
// that checks a one-time code get a stricter attempt counter with lockout,
// keyed by scope, email and client address.

use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        StatusCode,
        header::{HeaderName, HeaderValue},
    },
};
use dashmap::DashMap;
use elite_common::error::TOO_MANY_REQUESTS;

use crate::model::response;

/// Request rate limiter configuration
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Maximum requests per window
    pub max_requests: u32,
    pub window_duration: Duration,
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_duration: Duration::from_secs(60),
            enabled: true,
        }
    }
}

/// Token bucket refilled in full once per window
struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
    max_tokens: u32,
    refill_interval: Duration,
}

impl TokenBucket {
    fn new(max_tokens: u32, refill_interval: Duration) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: Instant::now(),
            max_tokens,
            refill_interval,
        }
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_refill) >= self.refill_interval {
            self.tokens = self.max_tokens;
            self.last_refill = now;
        }
    }
}

/// Buckets keyed by client address
pub struct RateLimiterState {
    buckets: DashMap<String, TokenBucket>,
    config: RateLimitConfig,
}

impl RateLimiterState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
        }
    }

    /// Returns whether the request may proceed and the tokens left
    fn check_rate_limit(&self, key: &str) -> (bool, u32) {
        if !self.config.enabled {
            return (true, self.config.max_requests);
        }

        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| {
            TokenBucket::new(self.config.max_requests, self.config.window_duration)
        });

        let allowed = bucket.try_consume();
        (allowed, bucket.tokens)
    }

    pub fn cleanup(&self) {
        let now = Instant::now();
        self.buckets.retain(|_, bucket| {
            now.duration_since(bucket.last_refill) < self.config.window_duration * 2
        });
    }
}

/// Rate limiting middleware factory
pub struct RateLimiter {
    state: Arc<RateLimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            state: Arc::new(RateLimiterState::new(config)),
        }
    }

    pub fn from_state(state: Arc<RateLimiterState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> Arc<RateLimiterState> {
        self.state.clone()
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            state: self.state.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    state: Arc<RateLimiterState>,
}

fn header_value(value: u64) -> HeaderValue {
    HeaderValue::from_str(&value.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Health checks must never be throttled
        if req.path() == "/health" {
            let fut = self.service.call(req);
            return Box::pin(async move { Ok(fut.await?.map_into_left_body()) });
        }

        let client_ip = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();

        let (allowed, remaining) = self.state.check_rate_limit(&client_ip);
        let max_requests = self.state.config.max_requests;

        if !allowed {
            let window_secs = self.state.config.window_duration.as_secs();
            metrics::counter!("elite_rate_limited_total", "scope" => "request").increment(1);
            tracing::warn!(client_ip = %client_ip, "Request rate limit exceeded");

            let mut response = response::Result::<()>::http_response(
                StatusCode::TOO_MANY_REQUESTS.as_u16(),
                TOO_MANY_REQUESTS.code,
                "Too many requests. Please try again later.".to_string(),
                (),
            );
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static("x-ratelimit-limit"),
                header_value(u64::from(max_requests)),
            );
            headers.insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                HeaderValue::from_static("0"),
            );
            headers.insert(
                actix_web::http::header::RETRY_AFTER,
                header_value(window_secs),
            );

            return Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) });
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let mut res = fut.await?;

            res.headers_mut().insert(
                HeaderName::from_static("x-ratelimit-limit"),
                header_value(u64::from(max_requests)),
            );
            res.headers_mut().insert(
                HeaderName::from_static("x-ratelimit-remaining"),
                header_value(u64::from(remaining)),
            );

            Ok(res.map_into_left_body())
        })
    }
}

// ============================================================================
// Credential Rate Limiter
// ============================================================================

/// Credential attempt limiter configuration
#[derive(Clone, Debug)]
pub struct AuthRateLimitConfig {
    /// Attempts allowed per window before the key is locked
    pub max_attempts: u32,
    pub window_duration: Duration,
    pub lockout_duration: Duration,
    pub enabled: bool,
}

impl Default for AuthRateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_duration: Duration::from_secs(60),
            lockout_duration: Duration::from_secs(300),
            enabled: true,
        }
    }
}

/// Result of recording an attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub allowed: bool,
    pub remaining: u32,
    pub lockout_secs: u64,
}

struct AuthAttemptEntry {
    attempts: u32,
    first_attempt: Instant,
    locked_until: Option<Instant>,
}

impl AuthAttemptEntry {
    fn new() -> Self {
        Self {
            attempts: 0,
            first_attempt: Instant::now(),
            locked_until: None,
        }
    }

    fn is_locked(&self) -> bool {
        self.locked_until.is_some_and(|until| Instant::now() < until)
    }

    fn remaining_lockout_secs(&self) -> u64 {
        self.locked_until
            .map(|until| until.saturating_duration_since(Instant::now()).as_secs().max(1))
            .unwrap_or(0)
    }
}

/// Attempt counter for login, PIN and one-time code checks
pub struct AuthRateLimiter {
    entries: DashMap<String, AuthAttemptEntry>,
    config: AuthRateLimitConfig,
}

impl AuthRateLimiter {
    pub fn new(config: AuthRateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Key combining the account and the client address
    pub fn key(scope: &str, email: &str, client_ip: &str) -> String {
        format!("{}:{}:{}", scope, email, client_ip)
    }

    /// Whether the key may attempt without recording anything
    pub fn check_attempt(&self, key: &str) -> AttemptOutcome {
        if !self.config.enabled {
            return self.unlimited();
        }

        let Some(entry) = self.entries.get(key) else {
            return AttemptOutcome {
                allowed: true,
                remaining: self.config.max_attempts,
                lockout_secs: 0,
            };
        };

        if entry.is_locked() {
            return AttemptOutcome {
                allowed: false,
                remaining: 0,
                lockout_secs: entry.remaining_lockout_secs(),
            };
        }

        let remaining = if entry.first_attempt.elapsed() >= self.config.window_duration {
            self.config.max_attempts
        } else {
            self.config.max_attempts.saturating_sub(entry.attempts)
        };
        AttemptOutcome {
            allowed: true,
            remaining,
            lockout_secs: 0,
        }
    }

    /// Count an attempt before credentials are checked. The attempt that goes
    /// past `max_attempts` is refused and starts the lockout.
    pub fn record_attempt(&self, key: &str) -> AttemptOutcome {
        if !self.config.enabled {
            return self.unlimited();
        }

        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(AuthAttemptEntry::new);

        if entry.is_locked() {
            return AttemptOutcome {
                allowed: false,
                remaining: 0,
                lockout_secs: entry.remaining_lockout_secs(),
            };
        }

        let now = Instant::now();
        if entry.locked_until.is_some()
            || now.duration_since(entry.first_attempt) >= self.config.window_duration
        {
            entry.attempts = 0;
            entry.first_attempt = now;
            entry.locked_until = None;
        }

        entry.attempts += 1;

        if entry.attempts > self.config.max_attempts {
            entry.locked_until = Some(now + self.config.lockout_duration);
            metrics::counter!("elite_rate_limited_total", "scope" => "auth").increment(1);
            tracing::warn!(
                key,
                lockout_secs = self.config.lockout_duration.as_secs(),
                "Auth rate limit exceeded"
            );
            return AttemptOutcome {
                allowed: false,
                remaining: 0,
                lockout_secs: self.config.lockout_duration.as_secs(),
            };
        }

        AttemptOutcome {
            allowed: true,
            remaining: self.config.max_attempts - entry.attempts,
            lockout_secs: 0,
        }
    }

    /// Forget the key after a successful attempt
    pub fn record_success(&self, key: &str) {
        if self.config.enabled {
            self.entries.remove(key);
        }
    }

    pub fn cleanup(&self) {
        let max_age = self.config.window_duration + self.config.lockout_duration;
        self.entries
            .retain(|_, entry| entry.is_locked() || entry.first_attempt.elapsed() < max_age);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn unlimited(&self) -> AttemptOutcome {
        AttemptOutcome {
            allowed: true,
            remaining: self.config.max_attempts,
            lockout_secs: 0,
        }
    }
}

/// Cleanup interval for limiter entries
const CLEANUP_INTERVAL_SECS: u64 = 300;

/// Periodically drop stale limiter entries. Abort the handle to stop.
pub fn start_cleanup_task(
    request_limiter: Arc<RateLimiterState>,
    auth_limiter: Arc<AuthRateLimiter>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            request_limiter.cleanup();
            auth_limiter.cleanup();
            tracing::debug!("Rate limiter cleanup completed");
        }
    })
}
