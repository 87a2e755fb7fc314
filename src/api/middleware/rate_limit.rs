//! Per-client-IP token buckets.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::{ApiError, AppState};
use crate::config::LimiterConfig;

type Bucket = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct Client {
    bucket: Bucket,
    last_seen: Instant,
}

pub struct RateLimiter {
    enabled: bool,
    quota: Quota,
    sweep_interval: Duration,
    idle_threshold: Duration,
    clients: Mutex<HashMap<IpAddr, Client>>,
}

impl RateLimiter {
    pub fn new(config: &LimiterConfig) -> anyhow::Result<Self> {
        let burst = NonZeroU32::new(config.burst)
            .ok_or_else(|| anyhow::anyhow!("Limiter burst must be at least 1"))?;
        let period = Duration::try_from_secs_f64(1.0 / config.rps)
            .map_err(|e| anyhow::anyhow!("Invalid limiter rps {}: {e}", config.rps))?;
        let quota = Quota::with_period(period)
            .ok_or_else(|| anyhow::anyhow!("Limiter rps {} is too large", config.rps))?
            .allow_burst(burst);

        Ok(Self {
            enabled: config.enabled,
            quota,
            sweep_interval: config.sweep_interval(),
            idle_threshold: config.idle_threshold(),
            clients: Mutex::new(HashMap::new()),
        })
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Takes one cell from `ip`'s bucket, creating the bucket on first sight.
    pub fn check(&self, ip: IpAddr) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let client = clients.entry(ip).or_insert_with(|| Client {
            bucket: Bucket::direct(self.quota),
            last_seen: Instant::now(),
        });
        client.last_seen = Instant::now();
        client.bucket.check().is_ok()
    }

    /// Drops clients idle for longer than the threshold. Returns how many
    /// were evicted.
    pub fn sweep(&self) -> usize {
        self.evict_idle_since(Instant::now())
    }

    fn evict_idle_since(&self, now: Instant) -> usize {
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        let before = clients.len();
        clients.retain(|_, c| now.saturating_duration_since(c.last_seen) <= self.idle_threshold);
        before - clients.len()
    }

    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Sweeps on a fixed interval until the returned handle is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.sweep_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = limiter.sweep();
                if evicted > 0 {
                    debug!(evicted, remaining = limiter.tracked_clients(), "Rate limiter sweep");
                }
            }
        })
    }
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let limiter = state.rate_limiter();
    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    let Some(ConnectInfo(addr)) = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .copied()
    else {
        return ApiError::internal("client address unavailable for rate limiting").into_response();
    };

    if !limiter.check(addr.ip()) {
        return ApiError::RateLimitExceeded.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn limiter(rps: f64, burst: u32) -> RateLimiter {
        RateLimiter::new(&LimiterConfig {
            rps,
            burst,
            ..LimiterConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = limiter(1.0, 2);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        assert!(limiter.check(ip));
        assert!(limiter.check(ip));
        assert!(!limiter.check(ip));

        let other = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        assert!(limiter.check(other));
    }

    #[test]
    fn test_refill() {
        let limiter = limiter(20.0, 1);
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert!(limiter.check(ip));
        assert!(!limiter.check(ip));
        std::thread::sleep(Duration::from_millis(80));
        assert!(limiter.check(ip));
    }

    #[test]
    fn test_sweep_evicts_idle_clients() {
        let limiter = limiter(2.0, 4);
        limiter.check(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)));
        limiter.check(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)));
        assert_eq!(limiter.sweep(), 0);
        assert_eq!(limiter.tracked_clients(), 2);

        let later = Instant::now() + limiter.idle_threshold + Duration::from_secs(1);
        assert_eq!(limiter.evict_idle_since(later), 2);
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(
            RateLimiter::new(&LimiterConfig {
                burst: 0,
                ..LimiterConfig::default()
            })
            .is_err()
        );
        assert!(
            RateLimiter::new(&LimiterConfig {
                rps: 0.0,
                ..LimiterConfig::default()
            })
            .is_err()
        );
    }
}
