//! Rate limiting middleware
//!
//! Per-client sliding window admission control. Single-process, in-memory.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;

use crate::{AppError, AppState};

/// Sliding window limiter keyed by client identity
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    inner: Mutex<Windows>,
}

#[derive(Debug)]
struct Windows {
    clients: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_seconds),
            inner: Mutex::new(Windows {
                clients: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn window_seconds(&self) -> u64 {
        self.window.as_secs()
    }

    /// Admit or deny one request from `client_id`
    pub fn allow(&self, client_id: &str) -> bool {
        let mut inner = self.inner.lock();
        // Read the clock under the lock so each window stays sorted
        let now = Instant::now();
        self.admit(&mut inner, client_id, now)
    }

    #[cfg(test)]
    fn allow_at(&self, client_id: &str, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        self.admit(&mut inner, client_id, now)
    }

    fn admit(&self, inner: &mut Windows, client_id: &str, now: Instant) -> bool {
        if now.saturating_duration_since(inner.last_sweep) >= self.window {
            let window = self.window;
            inner.clients.retain(|_, stamps| {
                prune(stamps, now, window);
                !stamps.is_empty()
            });
            inner.last_sweep = now;
            tracing::debug!(clients = inner.clients.len(), "Swept idle rate limit windows");
        }

        let stamps = inner.clients.entry(client_id.to_string()).or_default();
        prune(stamps, now, self.window);

        if stamps.len() < self.max_requests {
            stamps.push_back(now);
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.inner.lock().clients.len()
    }
}

/// Drop timestamps at least `window` old (boundary is exclusive).
fn prune(stamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = stamps.front() {
        if now.saturating_duration_since(*oldest) >= window {
            stamps.pop_front();
        } else {
            break;
        }
    }
}

/// Middleware: reject requests over the per-client quota before any other work
pub async fn enforce(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client_id = client_identity(&req, state.config.trust_forwarded_for);

    if !state.limiter.allow(&client_id) {
        tracing::warn!(client = %client_id, "Rate limit exceeded");
        return Err(AppError::RateLimitExceeded {
            retry_after_secs: state.limiter.window_seconds(),
        });
    }

    Ok(next.run(req).await)
}

/// Peer address; the last X-Forwarded-For hop only when a trusted proxy appends it
fn client_identity(req: &Request, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| req.headers().get("X-Forwarded-For"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.rsplit(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    forwarded
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_denies_after_max_requests() {
        let limiter = RateLimiter::new(100, 60);
        let start = Instant::now();

        for i in 0..100 {
            assert!(limiter.allow_at("client-c", start + Duration::from_millis(i * 5)));
        }
        assert!(!limiter.allow_at("client-c", start + Duration::from_millis(999)));
    }

    #[test]
    fn test_admits_after_window_passes() {
        let limiter = RateLimiter::new(100, 60);
        let start = Instant::now();

        for i in 0..100 {
            limiter.allow_at("client-c", start + Duration::from_millis(i * 5));
        }
        let last = start + Duration::from_millis(99 * 5);
        assert!(!limiter.allow_at("client-c", last + Duration::from_secs(30)));
        assert!(limiter.allow_at("client-c", last + Duration::from_secs(61)));
    }

    #[test]
    fn test_boundary_entry_is_expired() {
        let limiter = RateLimiter::new(1, 60);
        let start = Instant::now();

        assert!(limiter.allow_at("a", start));
        assert!(!limiter.allow_at("a", start + Duration::from_millis(59_999)));
        // Exactly window_seconds old counts as expired
        assert!(limiter.allow_at("a", start + Duration::from_secs(60)));
    }

    #[test]
    fn test_denied_requests_do_not_extend_window() {
        let limiter = RateLimiter::new(1, 10);
        let start = Instant::now();

        assert!(limiter.allow_at("a", start));
        for s in 1..10 {
            assert!(!limiter.allow_at("a", start + Duration::from_secs(s)));
        }
        assert!(limiter.allow_at("a", start + Duration::from_secs(10)));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(2, 60);
        let now = Instant::now();

        assert!(limiter.allow_at("a", now));
        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
    }

    #[test]
    fn test_stale_clients_are_swept() {
        let limiter = RateLimiter::new(5, 60);
        let start = Instant::now();

        for i in 0..10 {
            limiter.allow_at(&format!("client-{i}"), start);
        }
        assert_eq!(limiter.tracked_clients(), 10);

        limiter.allow_at("late", start + Duration::from_secs(120));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_concurrent_allow_admits_exactly_max() {
        let limiter = RateLimiter::new(50, 60);
        let admitted = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..25 {
                        if limiter.allow("c") {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::Relaxed), 50);
        assert!(!limiter.allow("c"));
    }

    fn request_from(peer: [u8; 4], forwarded: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder();
        if let Some(value) = forwarded {
            builder = builder.header("X-Forwarded-For", value);
        }
        let mut req = builder.body(axum::body::Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 4000))));
        req
    }

    #[test]
    fn test_client_identity_uses_peer_by_default() {
        let req = request_from([192, 168, 1, 9], Some("203.0.113.7"));
        assert_eq!(client_identity(&req, false), "192.168.1.9");

        let req = axum::http::Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(client_identity(&req, false), "unknown");
    }

    #[test]
    fn test_client_identity_trusted_proxy_takes_last_hop() {
        let req = request_from([10, 0, 0, 1], Some("1.2.3.4, 203.0.113.7"));
        assert_eq!(client_identity(&req, true), "203.0.113.7");

        // No header falls back to the peer
        let req = request_from([10, 0, 0, 1], None);
        assert_eq!(client_identity(&req, true), "10.0.0.1");
    }
}
