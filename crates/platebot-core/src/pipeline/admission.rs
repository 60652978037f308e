//! Sliding-window admission control
//!
//! Every identity may make at most `max_requests` requests inside any trailing
//! `window`. Timestamps leaving the window are purged lazily on each check, and
//! a background sweep drops identities that have been idle for twice the
//! window.

use super::sweeper::SweepTask;
use crate::config::PipelineSettings;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Configured limit
    pub limit: usize,
    /// Requests left inside the current window
    pub remaining: usize,
    /// When the oldest counted request leaves the window
    pub reset_at: Instant,
    /// Whole seconds until a rejected identity may retry; zero when allowed
    pub retry_after_secs: u64,
}

/// Snapshot of the limiter state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimiterStats {
    /// Window length in milliseconds
    pub window_ms: u128,
    /// Configured limit
    pub max_requests: usize,
    /// Identities currently tracked
    pub tracked_identities: usize,
    /// Identities with at least one request inside the window
    pub active_identities: usize,
    /// Requests inside the window across all identities
    pub total_active_requests: usize,
    /// Mean requests per active identity, rounded to two decimals
    pub average_requests_per_identity: f64,
}

#[derive(Debug)]
struct RateWindow {
    timestamps: VecDeque<Instant>,
    last_seen: Instant,
}

impl RateWindow {
    fn new(now: Instant) -> Self {
        Self {
            timestamps: VecDeque::new(),
            last_seen: now,
        }
    }

    fn purge(&mut self, now: Instant, window: Duration) {
        while self
            .timestamps
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= window)
        {
            self.timestamps.pop_front();
        }
    }
}

#[derive(Debug)]
struct LimiterState {
    windows: DashMap<i64, RateWindow>,
    window: Duration,
    max_requests: usize,
}

impl LimiterState {
    fn sweep(&self, now: Instant) -> usize {
        let idle_limit = self.window.saturating_mul(2);
        let before = self.windows.len();
        self.windows.retain(|_, w| {
            w.purge(now, self.window);
            !(w.timestamps.is_empty() && now.saturating_duration_since(w.last_seen) >= idle_limit)
        });
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!(removed, "Rate limiter sweep removed idle identities");
        }
        removed
    }
}

/// Per-identity sliding-window rate limiter.
///
/// # Examples
///
/// ```
/// use platebot_core::pipeline::RateLimiter;
/// use std::time::Duration;
///
/// let limiter = RateLimiter::new(Duration::from_secs(60), 2);
/// assert!(limiter.check(1).allowed);
/// assert!(limiter.check(1).allowed);
/// assert!(!limiter.check(1).allowed);
/// assert!(limiter.check(2).allowed);
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    state: Arc<LimiterState>,
    sweeper: Option<SweepTask>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per trailing `window`.
    ///
    /// When called inside a tokio runtime a sweep task is started that runs
    /// once per `window`.
    #[must_use]
    pub fn new(window: Duration, max_requests: usize) -> Self {
        let state = Arc::new(LimiterState {
            windows: DashMap::new(),
            window,
            max_requests,
        });
        let sweeper = SweepTask::spawn("rate_limiter", Arc::downgrade(&state), window, |s| {
            s.sweep(Instant::now());
        });
        Self { state, sweeper }
    }

    /// Create a limiter from pipeline settings
    #[must_use]
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(settings.rate_limit_window(), settings.rate_limit_max_requests)
    }

    /// Check and record one request from `identity`. Never blocks.
    pub fn check(&self, identity: i64) -> RateDecision {
        self.check_at(identity, Instant::now())
    }

    /// Same as [`RateLimiter::check`] with an explicit clock reading.
    pub fn check_at(&self, identity: i64, now: Instant) -> RateDecision {
        let state = &self.state;
        let mut entry = state
            .windows
            .entry(identity)
            .or_insert_with(|| RateWindow::new(now));
        let window = entry.value_mut();
        window.last_seen = now;
        window.purge(now, state.window);

        if window.timestamps.len() < state.max_requests {
            window.timestamps.push_back(now);
            let oldest = window.timestamps.front().copied().unwrap_or(now);
            return RateDecision {
                allowed: true,
                limit: state.max_requests,
                remaining: state.max_requests - window.timestamps.len(),
                reset_at: oldest + state.window,
                retry_after_secs: 0,
            };
        }

        let oldest = window.timestamps.front().copied().unwrap_or(now);
        let reset_at = oldest + state.window;
        let wait = reset_at.saturating_duration_since(now);
        let retry_after_secs = u64::try_from(wait.as_millis().div_ceil(1000)).unwrap_or(u64::MAX);
        debug!(identity, retry_after_secs, "Request rejected by rate limiter");

        RateDecision {
            allowed: false,
            limit: state.max_requests,
            remaining: 0,
            reset_at,
            retry_after_secs,
        }
    }

    /// Forget everything about `identity`
    pub fn reset(&self, identity: i64) {
        self.state.windows.remove(&identity);
    }

    /// Current limiter statistics
    #[must_use]
    pub fn stats(&self) -> RateLimiterStats {
        self.stats_at(Instant::now())
    }

    /// Same as [`RateLimiter::stats`] with an explicit clock reading.
    #[must_use]
    pub fn stats_at(&self, now: Instant) -> RateLimiterStats {
        let state = &self.state;
        let mut active_identities = 0usize;
        let mut total_active_requests = 0usize;
        for entry in &state.windows {
            let active = entry
                .timestamps
                .iter()
                .filter(|t| now.saturating_duration_since(**t) < state.window)
                .count();
            if active > 0 {
                active_identities += 1;
                total_active_requests += active;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let average_requests_per_identity = if active_identities == 0 {
            0.0
        } else {
            (total_active_requests as f64 / active_identities as f64 * 100.0).round() / 100.0
        };

        RateLimiterStats {
            window_ms: state.window.as_millis(),
            max_requests: state.max_requests,
            tracked_identities: state.windows.len(),
            active_identities,
            total_active_requests,
            average_requests_per_identity,
        }
    }

    /// Drop identities with no requests in the window and idle for `2 * window`.
    /// Returns the number of removed identities.
    pub fn sweep(&self) -> usize {
        self.state.sweep(Instant::now())
    }

    /// Same as [`RateLimiter::sweep`] with an explicit clock reading.
    pub fn sweep_at(&self, now: Instant) -> usize {
        self.state.sweep(now)
    }

    /// Number of tracked identities
    #[must_use]
    pub fn tracked_identities(&self) -> usize {
        self.state.windows.len()
    }

    /// Stop the sweep task and forget all identities.
    pub fn destroy(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
        self.state.windows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: Duration = Duration::from_secs(60);

    #[test]
    fn test_exactly_n_requests_are_admitted() {
        let limiter = RateLimiter::new(W, 3);
        let t0 = Instant::now();

        let decisions: Vec<_> = (0..3)
            .map(|i| limiter.check_at(7, t0 + Duration::from_secs(i)))
            .collect();
        assert!(decisions.iter().all(|d| d.allowed));
        assert_eq!(decisions[0].remaining, 2);
        assert_eq!(decisions[2].remaining, 0);

        let rejected = limiter.check_at(7, t0 + Duration::from_secs(10));
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.limit, 3);
        assert_eq!(rejected.retry_after_secs, 50);
        assert_eq!(rejected.reset_at, t0 + W);
    }

    #[test]
    fn test_window_slides() {
        let limiter = RateLimiter::new(W, 2);
        let t0 = Instant::now();

        assert!(limiter.check_at(1, t0).allowed);
        assert!(limiter.check_at(1, t0 + Duration::from_secs(30)).allowed);
        assert!(!limiter.check_at(1, t0 + Duration::from_secs(59)).allowed);

        // Oldest request has left the window, second one has not
        let after = t0 + W + Duration::from_millis(1);
        assert!(limiter.check_at(1, after).allowed);
        assert!(!limiter.check_at(1, after).allowed);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let limiter = RateLimiter::new(W, 1);
        let t0 = Instant::now();
        assert!(limiter.check_at(1, t0).allowed);

        let rejected = limiter.check_at(1, t0 + Duration::from_millis(59_001));
        assert_eq!(rejected.retry_after_secs, 1);
    }

    #[test]
    fn test_rejected_checks_are_not_counted() {
        let limiter = RateLimiter::new(W, 1);
        let t0 = Instant::now();
        assert!(limiter.check_at(1, t0).allowed);
        for s in 1..10 {
            assert!(!limiter.check_at(1, t0 + Duration::from_secs(s)).allowed);
        }
        assert!(limiter.check_at(1, t0 + W).allowed);
    }

    #[test]
    fn test_identities_are_independent() {
        let limiter = RateLimiter::new(W, 1);
        let t0 = Instant::now();
        assert!(limiter.check_at(1, t0).allowed);
        assert!(limiter.check_at(2, t0).allowed);
        assert!(!limiter.check_at(1, t0).allowed);
    }

    #[test]
    fn test_reset_forgets_identity() {
        let limiter = RateLimiter::new(W, 1);
        let t0 = Instant::now();
        assert!(limiter.check_at(1, t0).allowed);
        assert!(!limiter.check_at(1, t0).allowed);
        limiter.reset(1);
        assert!(limiter.check_at(1, t0).allowed);
    }

    #[test]
    fn test_sweep_removes_only_idle_identities() {
        let limiter = RateLimiter::new(W, 5);
        let t0 = Instant::now();
        limiter.check_at(1, t0);
        limiter.check_at(2, t0 + W);

        assert_eq!(limiter.sweep_at(t0 + W), 0);
        assert_eq!(limiter.sweep_at(t0 + W * 2), 1);
        assert_eq!(limiter.tracked_identities(), 1);
        assert_eq!(limiter.sweep_at(t0 + W * 3), 1);
        assert_eq!(limiter.tracked_identities(), 0);
    }

    #[test]
    fn test_stats() {
        let limiter = RateLimiter::new(W, 5);
        let t0 = Instant::now();
        limiter.check_at(1, t0);
        limiter.check_at(1, t0);
        limiter.check_at(2, t0);

        let stats = limiter.stats_at(t0);
        assert_eq!(stats.tracked_identities, 2);
        assert_eq!(stats.active_identities, 2);
        assert_eq!(stats.total_active_requests, 3);
        assert!((stats.average_requests_per_identity - 1.5).abs() < f64::EPSILON);

        let later = limiter.stats_at(t0 + W);
        assert_eq!(later.active_identities, 0);
        assert!(later.average_requests_per_identity.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_destroy_clears_state() {
        let limiter = RateLimiter::new(Duration::from_millis(20), 1);
        assert!(limiter.check(1).allowed);
        limiter.destroy();
        assert_eq!(limiter.tracked_identities(), 0);
        assert!(limiter.check(1).allowed);
    }

    #[tokio::test]
    async fn test_background_sweep_runs() {
        let limiter = RateLimiter::new(Duration::from_millis(20), 1);
        limiter.check(1);
        // Idle for more than 2 * window plus one sweep period
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(limiter.tracked_identities(), 0);
    }
}
