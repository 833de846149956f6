//! Per-client request throttling.
//!
//! A fixed window per client IP: the first request opens a window of
//! [`RateLimitConfig::window`], and up to [`RateLimitConfig::max_requests`]
//! requests are admitted until it expires.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::config::RateLimitConfig;

// Sweep expired windows once the table grows past this many clients.
const SWEEP_THRESHOLD: usize = 4096;

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Over the limit; the window reopens after `retry_after`.
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Shared counter table, sharded by client. The only state shared across
/// connections.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: DashMap<IpAddr, Window>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Counts one request from `client`.
    pub fn check(&self, client: IpAddr) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> RateDecision {
        let window = self.config.window;

        // No entry guard may be alive here: `retain` locks every shard.
        if self.clients.len() >= SWEEP_THRESHOLD {
            let before = self.clients.len();
            self.clients
                .retain(|_, w| now.duration_since(w.started) < window);
            debug!(
                removed = before.saturating_sub(self.clients.len()),
                "swept expired rate-limit windows"
            );
        }

        let mut entry = self.clients.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.config.max_requests {
            let retry_after = window.saturating_sub(now.duration_since(entry.started));
            return RateDecision::Limited { retry_after };
        }
        entry.count += 1;
        RateDecision::Allowed
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

/// `Retry-After` value in whole seconds, never zero.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    retry_after.as_secs_f64().ceil().max(1.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const A: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));
    const B: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 2));

    fn limiter(max: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::new(Duration::from_secs(10), max))
    }

    #[test]
    fn admits_up_to_threshold() {
        let limiter = limiter(2);
        let t0 = Instant::now();
        assert_eq!(limiter.check_at(A, t0), RateDecision::Allowed);
        assert_eq!(limiter.check_at(A, t0), RateDecision::Allowed);
        assert_eq!(
            limiter.check_at(A, t0 + Duration::from_secs(4)),
            RateDecision::Limited {
                retry_after: Duration::from_secs(6)
            }
        );
    }

    #[test]
    fn clients_are_counted_separately() {
        let limiter = limiter(1);
        let t0 = Instant::now();
        assert_eq!(limiter.check_at(A, t0), RateDecision::Allowed);
        assert_eq!(limiter.check_at(B, t0), RateDecision::Allowed);
        assert!(matches!(limiter.check_at(A, t0), RateDecision::Limited { .. }));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn window_reopens() {
        let limiter = limiter(1);
        let t0 = Instant::now();
        assert_eq!(limiter.check_at(A, t0), RateDecision::Allowed);
        assert!(matches!(limiter.check_at(A, t0), RateDecision::Limited { .. }));
        assert_eq!(
            limiter.check_at(A, t0 + Duration::from_secs(10)),
            RateDecision::Allowed
        );
    }

    #[test]
    fn retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(2500)), 3);
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
    }

    #[test]
    fn sweep_drops_expired_windows() {
        let limiter = limiter(5);
        let t0 = Instant::now();
        for i in 0..SWEEP_THRESHOLD as u32 {
            limiter.check_at(IpAddr::V4(Ipv4Addr::from(i)), t0);
        }
        assert_eq!(limiter.tracked_clients(), SWEEP_THRESHOLD);

        assert_eq!(
            limiter.check_at(A, t0 + Duration::from_secs(11)),
            RateDecision::Allowed
        );
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn concurrent_checks_share_one_budget() {
        let limiter = std::sync::Arc::new(limiter(100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = std::sync::Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| limiter.check(A) == RateDecision::Allowed)
                        .count()
                })
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 100);
    }
}
