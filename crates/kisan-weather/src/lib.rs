//! Weather service for Kisan
//!
//! Provides current conditions, daily forecasts and geocoding via the
//! OpenWeatherMap API, behind a cache that serves fresh responses without a
//! network call and falls back to stale ones when a request fails.

pub mod cache;
pub mod fetch;
pub mod geocode;
pub mod provider;
pub mod types;

pub use cache::{
    CacheEntry, CacheState, CacheStore, Clock, ManualClock, MemoryCache, SystemClock,
    DEFAULT_FRESHNESS_MINUTES,
};
pub use fetch::{redact, server_message, CachedFetcher, FetchError};
pub use geocode::geocode_cache_key;
pub use provider::{WeatherProvider, DEFAULT_BASE_URL};
pub use types::*;
