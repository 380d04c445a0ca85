//! Keyed response cache with a freshness window.
//!
//! Entries are never evicted; a successful refetch overwrites the previous
//! entry. Stale entries stay around so they can be served when a refetch
//! fails.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default freshness window: 10 minutes.
pub const DEFAULT_FRESHNESS_MINUTES: i64 = 10;

pub fn default_freshness() -> Duration {
    Duration::minutes(DEFAULT_FRESHNESS_MINUTES)
}

/// A stored response body and the time its fetch was issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, payload: Value, fetched_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            payload,
            fetched_at,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.fetched_at < window
    }
}

/// What the cache holds for one key at a given instant.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheState {
    Empty,
    Fresh(CacheEntry),
    Stale(CacheEntry),
}

impl CacheState {
    pub fn entry(&self) -> Option<&CacheEntry> {
        match self {
            CacheState::Empty => None,
            CacheState::Fresh(e) | CacheState::Stale(e) => Some(e),
        }
    }
}

/// Storage behind [`crate::CachedFetcher`]. Swap in a test double or a
/// persistent backend by implementing this.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Store `entry`, replacing any entry for the same key unless the stored
    /// one was fetched later. Returns whether the entry was stored.
    fn set(&self, entry: CacheEntry) -> bool;

    fn has_fresh(&self, key: &str, now: DateTime<Utc>, window: Duration) -> bool {
        self.get(key)
            .is_some_and(|entry| entry.is_fresh(now, window))
    }

    fn state(&self, key: &str, now: DateTime<Utc>, window: Duration) -> CacheState {
        match self.get(key) {
            None => CacheState::Empty,
            Some(entry) if entry.is_fresh(now, window) => CacheState::Fresh(entry),
            Some(entry) => CacheState::Stale(entry),
        }
    }
}

/// In-process cache; lives as long as the fetcher that owns it.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, entry: CacheEntry) -> bool {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&entry.key) {
            if existing.fetched_at > entry.fetched_at {
                tracing::debug!("Discarding older response for {}", entry.key);
                return false;
            }
        }
        entries.insert(entry.key.clone(), entry);
        true
    }
}

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-15T06:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_state_transitions() {
        let cache = MemoryCache::new();
        let window = default_freshness();
        let key = "weather_23.0225_72.5714";

        assert_eq!(cache.state(key, t0(), window), CacheState::Empty);

        cache.set(CacheEntry::new(key, json!({"temp": 30}), t0()));
        assert!(matches!(
            cache.state(key, t0() + Duration::minutes(9), window),
            CacheState::Fresh(_)
        ));
        assert!(matches!(
            cache.state(key, t0() + Duration::minutes(10), window),
            CacheState::Stale(_)
        ));

        cache.set(CacheEntry::new(key, json!({"temp": 31}), t0() + Duration::minutes(12)));
        let state = cache.state(key, t0() + Duration::minutes(13), window);
        assert!(matches!(state, CacheState::Fresh(_)));
        assert_eq!(state.entry().unwrap().payload, json!({"temp": 31}));
    }

    #[test]
    fn test_has_fresh() {
        let cache = MemoryCache::new();
        let window = default_freshness();
        assert!(!cache.has_fresh("k", t0(), window));

        cache.set(CacheEntry::new("k", json!(1), t0()));
        assert!(cache.has_fresh("k", t0() + Duration::minutes(5), window));
        assert!(!cache.has_fresh("k", t0() + Duration::minutes(11), window));
    }

    #[test]
    fn test_older_write_does_not_replace_newer() {
        let cache = MemoryCache::new();
        assert!(cache.set(CacheEntry::new("k", json!("new"), t0() + Duration::minutes(1))));
        assert!(!cache.set(CacheEntry::new("k", json!("old"), t0())));
        assert_eq!(cache.get("k").unwrap().payload, json!("new"));
    }

    #[test]
    fn test_equal_timestamps_last_writer_wins() {
        let cache = MemoryCache::new();
        cache.set(CacheEntry::new("k", json!("first"), t0()));
        assert!(cache.set(CacheEntry::new("k", json!("second"), t0())));
        assert_eq!(cache.get("k").unwrap().payload, json!("second"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(t0());
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), t0() + Duration::minutes(5));
        clock.set(t0());
        assert_eq!(clock.now(), t0());
    }
}
