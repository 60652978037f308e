//! Flood protection for "too many requests" notices
//!
//! A throttled user keeps sending messages; answering each one would get the
//! bot itself rate limited by Telegram. The notice is sent at most once per
//! cooldown and every rejected request is still counted.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tracks which throttled users were recently told so.
#[derive(Clone)]
pub struct ThrottleNoticeCache {
    /// user_id -> () with the cooldown as TTL
    cache: Cache<i64, ()>,
    cooldown: Duration,
    /// Throttled requests that got no notice
    silenced_count: Arc<AtomicU64>,
}

impl ThrottleNoticeCache {
    /// Create a cache that allows one notice per user per `cooldown_secs`.
    ///
    /// ```
    /// use platebot_transport_telegram::bot::ThrottleNoticeCache;
    ///
    /// let cache = ThrottleNoticeCache::new(30, 10_000);
    /// assert_eq!(cache.cooldown().as_secs(), 30);
    /// ```
    #[must_use]
    pub fn new(cooldown_secs: u64, max_capacity: u64) -> Self {
        let cooldown = Duration::from_secs(cooldown_secs);
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(cooldown)
            .build();

        Self {
            cache,
            cooldown,
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns `true` if `user_id` has not been notified within the cooldown.
    ///
    /// Silenced requests are counted; every 100th is logged.
    pub async fn should_notify(&self, user_id: i64) -> bool {
        if self.cache.get(&user_id).await.is_none() {
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count.is_multiple_of(100) {
            debug!(count, recent_user = user_id, "Silenced throttled requests");
        }
        false
    }

    /// Start the cooldown for `user_id` after a notice was delivered
    pub async fn mark_notified(&self, user_id: i64) {
        self.cache.insert(user_id, ()).await;
    }

    /// Users currently in cooldown
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Total throttled requests that got no notice
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }

    /// Configured cooldown
    #[must_use]
    pub const fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_throttle_notifies() {
        let cache = ThrottleNoticeCache::new(60, 100);
        assert!(cache.should_notify(12345).await);
    }

    #[tokio::test]
    async fn test_cooldown_silences_repeat() {
        let cache = ThrottleNoticeCache::new(60, 100);

        assert!(cache.should_notify(12345).await);
        cache.mark_notified(12345).await;

        assert!(!cache.should_notify(12345).await);
        assert!(cache.should_notify(777).await);
    }

    #[tokio::test]
    async fn test_undelivered_notice_does_not_start_cooldown() {
        let cache = ThrottleNoticeCache::new(60, 100);

        assert!(cache.should_notify(12345).await);
        // Send failed, mark_notified never called
        assert!(cache.should_notify(12345).await);
    }

    #[tokio::test]
    async fn test_silenced_count_and_entries() {
        let cache = ThrottleNoticeCache::new(60, 100);
        cache.mark_notified(1).await;
        cache.mark_notified(2).await;

        for _ in 0..5 {
            cache.should_notify(1).await;
        }
        assert_eq!(cache.silenced_count(), 5);

        cache.cache.run_pending_tasks().await;
        assert_eq!(cache.entry_count(), 2);
    }

    #[tokio::test]
    async fn test_cooldown_expires() {
        let cache = ThrottleNoticeCache::new(1, 100);
        cache.mark_notified(1).await;
        assert!(!cache.should_notify(1).await);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(cache.should_notify(1).await);
    }
}
