use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderName, Request, Response, StatusCode};
use dashmap::DashMap;
use tower::{Layer, Service};
use tracing::{debug, warn};

const LOG_INTERVAL: Duration = Duration::from_secs(60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_CLIENT_HEADER: &str = "x-forwarded-for";

#[derive(Clone)]
pub struct RateLimiter<S> {
    inner: S,
    state: SharedState,
    client_header: HeaderName,
    rate_per_sec: f64,
    burst: f64,
}

#[derive(Clone)]
struct SharedState {
    buckets: Arc<DashMap<String, Bucket>>,
    dropped_since_log: Arc<AtomicU64>,
    last_log: Arc<Mutex<Instant>>,
    last_sweep: Arc<Mutex<Instant>>,
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn full(burst: f64, now: Instant) -> Self {
        Self {
            tokens: burst,
            last_refill: now,
        }
    }

    /// Refill for the time elapsed since the last call, then take one token.
    fn try_take(&mut self, now: Instant, rate_per_sec: f64, burst: f64) -> bool {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * rate_per_sec).min(burst);
            self.last_refill = now;
        }
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-client token bucket.
///
/// Clients are identified by the last hop of the configured header (the
/// address appended by the nearest proxy), or by the peer address from
/// [`ConnectInfo`] when the header is absent. Requests with neither are not
/// throttled. Buckets idle long enough to have refilled completely are
/// dropped periodically.
#[derive(Clone)]
pub struct RateLimiterLayer {
    client_header: HeaderName,
    rate_per_sec: f64,
    burst: f64,
}

impl RateLimiterLayer {
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        Self {
            client_header: HeaderName::from_static(DEFAULT_CLIENT_HEADER),
            rate_per_sec: rate_per_sec as f64,
            burst: burst as f64,
        }
    }

    pub fn with_client_header(mut self, header: HeaderName) -> Self {
        self.client_header = header;
        self
    }
}

impl<S> Layer<S> for RateLimiterLayer {
    type Service = RateLimiter<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiter {
            inner,
            state: SharedState {
                buckets: Arc::new(DashMap::new()),
                dropped_since_log: Arc::new(AtomicU64::new(0)),
                last_log: Arc::new(Mutex::new(Instant::now())),
                last_sweep: Arc::new(Mutex::new(Instant::now())),
            },
            client_header: self.client_header.clone(),
            rate_per_sec: self.rate_per_sec,
            burst: self.burst,
        }
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for RateLimiter<S>
where
    S: Service<Request<ReqBody>, Response = Response<Body>> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        if let Some(client) = client_id(&req, &self.client_header)
            && !self.check_and_consume(&client)
        {
            self.state.dropped_since_log.fetch_add(1, Ordering::Relaxed);
            log_drops_if_needed(&self.state);
            return Box::pin(async move {
                let mut response = Response::new(Body::from("rate limited"));
                *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
                Ok(response)
            });
        }

        let fut = self.inner.call(req);
        Box::pin(fut)
    }
}

/// Last hop of the client header, else the connecting peer's IP.
fn client_id<B>(req: &Request<B>, header: &HeaderName) -> Option<String> {
    let forwarded = req
        .headers()
        .get(header)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.rsplit(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    forwarded.or_else(|| {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

impl<S> RateLimiter<S> {
    fn check_and_consume(&self, client: &str) -> bool {
        let now = Instant::now();
        self.sweep_if_needed(now);
        self.state
            .buckets
            .entry(client.to_string())
            .or_insert_with(|| Bucket::full(self.burst, now))
            .try_take(now, self.rate_per_sec, self.burst)
    }

    fn sweep_if_needed(&self, now: Instant) {
        let mut last = self
            .state
            .last_sweep
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if now.saturating_duration_since(*last) < SWEEP_INTERVAL {
            return;
        }
        *last = now;
        drop(last);
        let refill = Duration::from_secs_f64(self.burst / self.rate_per_sec.max(f64::EPSILON));
        let evicted = evict_idle(&self.state.buckets, now, refill);
        if evicted > 0 {
            debug!("rate limiter evicted {evicted} idle clients");
        }
    }
}

/// Drop buckets untouched for at least `max_idle`; returns how many went.
fn evict_idle(buckets: &DashMap<String, Bucket>, now: Instant, max_idle: Duration) -> usize {
    let before = buckets.len();
    buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < max_idle);
    before - buckets.len()
}

fn log_drops_if_needed(state: &SharedState) {
    let now = Instant::now();
    let mut last = state
        .last_log
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if now.saturating_duration_since(*last) >= LOG_INTERVAL {
        let dropped = state.dropped_since_log.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            warn!("rate limiter dropped {dropped} requests in the last minute");
        }
        *last = now;
    }
}
