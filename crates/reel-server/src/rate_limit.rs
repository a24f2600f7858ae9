use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::ConnectInfo,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

/// Identity a bucket is keyed by: the calling principal when the request
/// carries one, the client IP otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientKey {
    Principal(String),
    Ip(IpAddr),
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Principal(p) => write!(f, "principal:{p}"),
            Self::Ip(ip) => write!(f, "ip:{ip}"),
        }
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, rate: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;

        self.tokens = (self.tokens + elapsed * rate).min(capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<ClientKey, TokenBucket>>>,
    rate: f64,
    capacity: f64,
}

impl RateLimiter {
    pub fn new(rate: f64, capacity: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate,
            capacity,
        }
    }

    pub async fn check(&self, key: ClientKey) -> bool {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry(key)
            .or_insert_with(|| TokenBucket::new(self.capacity));
        bucket.try_consume(self.rate, self.capacity)
    }

    pub async fn purge_stale(&self, max_idle_secs: f64) {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        buckets.retain(|_, bucket| {
            now.duration_since(bucket.last_refill).as_secs_f64() < max_idle_secs
        });
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(10.0, 30.0)
    }
}

pub async fn rate_limit_middleware(
    axum::extract::State(limiter): axum::extract::State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(key) = extract_client_key(&req) {
        if !limiter.check(key.clone()).await {
            warn!(client = %key, "Rate limit exceeded");
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
    }

    Ok(next.run(req).await)
}

/// Prefer the authenticated principal; fall back to ConnectInfo, then
/// X-Forwarded-For, then X-Real-IP.
fn extract_client_key<B>(req: &Request<B>) -> Option<ClientKey> {
    if let Some(principal) = req.headers().get("x-principal") {
        if let Ok(value) = principal.to_str() {
            let value = value.trim();
            if !value.is_empty() {
                return Some(ClientKey::Principal(value.to_string()));
            }
        }
    }

    if let Some(connect_info) = req.extensions().get::<ConnectInfo<std::net::SocketAddr>>() {
        return Some(ClientKey::Ip(connect_info.0.ip()));
    }

    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return Some(ClientKey::Ip(ip));
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if let Ok(ip) = value.trim().parse::<IpAddr>() {
                return Some(ClientKey::Ip(ip));
            }
        }
    }

    None
}
