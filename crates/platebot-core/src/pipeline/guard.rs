//! Duplicate-search guard
//!
//! Holds the set of `(requester, plate)` lookups currently in flight so that a
//! second identical request is turned away instead of hitting the datastore
//! again.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Set of in-flight lookup keys.
///
/// Every hold carries a generation number so a [`SearchPermit`] only ever
/// clears its own hold.
#[derive(Debug, Clone, Default)]
pub struct SearchGuard {
    held: Arc<DashMap<String, u64>>,
    generation: Arc<AtomicU64>,
}

impl SearchGuard {
    /// Create an empty guard
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Key for a requester and a normalized plate
    ///
    /// ```
    /// use platebot_core::pipeline::SearchGuard;
    /// assert_eq!(SearchGuard::key(1, "123"), "u1_123");
    /// ```
    #[must_use]
    pub fn key(requester: i64, plate: &str) -> String {
        format!("u{requester}_{plate}")
    }

    /// Mark `key` as held. Returns `false` if it already was.
    pub fn try_acquire(&self, key: &str) -> bool {
        self.hold(key).is_some()
    }

    fn hold(&self, key: &str) -> Option<u64> {
        match self.held.entry(key.to_string()) {
            Entry::Occupied(_) => {
                debug!(key, "Search already in progress");
                None
            }
            Entry::Vacant(slot) => {
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                slot.insert(generation);
                Some(generation)
            }
        }
    }

    /// Clear the hold on `key`, whether or not it was held.
    ///
    /// This also clears a hold taken through [`SearchGuard::acquire`]; the
    /// outstanding permit then leaves any later hold on `key` alone.
    pub fn release(&self, key: &str) {
        self.held.remove(key);
    }

    /// Acquire `key` and return a permit that releases it when dropped.
    #[must_use]
    pub fn acquire(&self, key: impl Into<String>) -> Option<SearchPermit> {
        let key = key.into();
        let generation = self.hold(&key)?;
        Some(SearchPermit {
            guard: self.clone(),
            key,
            generation,
        })
    }

    /// Returns `true` if `key` is held
    #[must_use]
    pub fn is_held(&self, key: &str) -> bool {
        self.held.contains_key(key)
    }

    /// Number of held keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.held.len()
    }

    /// Returns `true` if no key is held
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

/// Hold on one guard key; released on drop unless the key was released
/// and taken again in the meantime.
#[derive(Debug)]
pub struct SearchPermit {
    guard: SearchGuard,
    key: String,
    generation: u64,
}

impl SearchPermit {
    /// The held key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for SearchPermit {
    fn drop(&mut self) {
        self.guard
            .held
            .remove_if(&self.key, |_, generation| *generation == self.generation);
    }
}
