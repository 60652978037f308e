//! Per-process protection for the upstream datastore
//!
//! Admission control, result caching and in-flight deduplication. Each
//! component is an explicit instance with its own configuration; components
//! with periodic cleanup own their sweep task and stop it in `destroy()`.

pub mod admission;
pub mod cache;
pub mod guard;
mod sweeper;

pub use admission::{RateDecision, RateLimiter, RateLimiterStats};
pub use cache::{cache_key, CacheInfo, CacheStats, ResultCache};
pub use guard::{SearchGuard, SearchPermit};
