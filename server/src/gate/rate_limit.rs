use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Sliding-window limiter keyed by identifier.
///
/// Each identifier keeps the instants of its admitted requests inside the
/// trailing window. A request timestamp leaves the window once `window` has
/// fully elapsed since it was admitted.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    windows: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_allowed(&self, identifier: &str) -> bool {
        self.is_allowed_at(identifier, Instant::now())
    }

    /// Admit and record a request at `now`, or deny without recording.
    pub fn is_allowed_at(&self, identifier: &str, now: Instant) -> bool {
        let mut window = self.windows.entry(identifier.to_string()).or_default();
        prune(&mut window, now, self.window);
        if window.len() < self.max_requests {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    pub fn get_reset_time(&self, identifier: &str) -> Duration {
        self.get_reset_time_at(identifier, Instant::now())
    }

    /// Time until the oldest live request leaves the window. Zero when the
    /// identifier has no live requests. A window too large to add to the
    /// clock reports the full window.
    pub fn get_reset_time_at(&self, identifier: &str, now: Instant) -> Duration {
        self.windows
            .get(identifier)
            .and_then(|window| window.front().copied())
            .map(|oldest| {
                oldest
                    .checked_add(self.window)
                    .map(|reset| reset.saturating_duration_since(now))
                    .unwrap_or(self.window)
            })
            .unwrap_or(Duration::ZERO)
    }

    /// Drop identifiers whose windows are empty after pruning. Returns how
    /// many were removed.
    pub fn sweep_idle(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            prune(window, now, self.window);
            !window.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }

    pub fn tracked_identifiers(&self) -> usize {
        self.windows.len()
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant, span: Duration) {
    while let Some(&oldest) = window.front() {
        if now.saturating_duration_since(oldest) >= span {
            window.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn three_per_minute_with_simulated_clock() {
        let limiter = RateLimiter::new(3, MINUTE);
        let t0 = Instant::now();

        assert!(limiter.is_allowed_at("client", t0));
        assert!(limiter.is_allowed_at("client", t0 + Duration::from_secs(10)));
        assert!(limiter.is_allowed_at("client", t0 + Duration::from_secs(20)));
        assert!(!limiter.is_allowed_at("client", t0 + Duration::from_secs(30)));

        assert_eq!(
            limiter.get_reset_time_at("client", t0 + Duration::from_secs(30)),
            Duration::from_secs(30)
        );

        // first request expires exactly at the window boundary
        assert!(limiter.is_allowed_at("client", t0 + MINUTE));
        assert!(!limiter.is_allowed_at("client", t0 + MINUTE + Duration::from_secs(1)));
    }

    #[test]
    fn identifiers_are_independent() {
        let limiter = RateLimiter::new(1, MINUTE);
        let now = Instant::now();
        assert!(limiter.is_allowed_at("a", now));
        assert!(!limiter.is_allowed_at("a", now));
        assert!(limiter.is_allowed_at("b", now));
    }

    #[test]
    fn denied_requests_are_not_recorded() {
        let limiter = RateLimiter::new(2, MINUTE);
        let t0 = Instant::now();
        assert!(limiter.is_allowed_at("client", t0));
        assert!(limiter.is_allowed_at("client", t0));
        for i in 1..10 {
            assert!(!limiter.is_allowed_at("client", t0 + Duration::from_secs(i)));
        }
        assert!(limiter.is_allowed_at("client", t0 + MINUTE));
    }

    #[test]
    fn reset_time_zero_for_unknown() {
        let limiter = RateLimiter::new(3, MINUTE);
        assert_eq!(limiter.get_reset_time("nobody"), Duration::ZERO);
    }

    #[test]
    fn oversized_window_reports_full_window() {
        let limiter = RateLimiter::new(1, Duration::MAX);
        let t0 = Instant::now();
        assert!(limiter.is_allowed_at("client", t0));
        assert!(!limiter.is_allowed_at("client", t0 + MINUTE));
        assert_eq!(limiter.get_reset_time_at("client", t0 + MINUTE), Duration::MAX);
    }

    #[test]
    fn sweep_removes_idle_identifiers() {
        let limiter = RateLimiter::new(3, MINUTE);
        let t0 = Instant::now();
        limiter.is_allowed_at("old", t0);
        limiter.is_allowed_at("fresh", t0 + Duration::from_secs(50));
        assert_eq!(limiter.tracked_identifiers(), 2);

        assert_eq!(limiter.sweep_idle(t0 + Duration::from_secs(70)), 1);
        assert_eq!(limiter.tracked_identifiers(), 1);
        assert_eq!(limiter.get_reset_time_at("fresh", t0 + Duration::from_secs(70)), Duration::from_secs(40));
    }
}
