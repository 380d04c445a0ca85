//! HTTP GET with a time-bounded response cache and stale fallback.
//!
//! A fresh entry is returned without touching the network. Otherwise the
//! request is made; a success refreshes the entry, a failure falls back to
//! whatever entry exists for the key, however old.

use std::sync::Arc;

use chrono::Duration;
use kisan_core::{AppError, ConfigError, NetworkError, ReqwestErrorExt, WeatherError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

use crate::cache::{default_freshness, CacheEntry, CacheStore, Clock, MemoryCache, SystemClock};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0} is not configured")]
    MissingCredential(&'static str),

    /// Non-success status. `message` is the server's own text when it sent one.
    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } => Some(*status),
            FetchError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            FetchError::MissingCredential(what) => {
                ConfigError::MissingSetting(what.to_string()).user_message().to_string()
            }
            FetchError::Http { status: 401, .. } => {
                WeatherError::InvalidApiKey.user_message().to_string()
            }
            FetchError::Http { status: 404, message } => {
                WeatherError::LocationNotFound(message.clone())
                    .user_message()
                    .to_string()
            }
            FetchError::Http { status, message } => NetworkError::ServerError {
                status: *status,
                message: message.clone(),
            }
            .user_message()
            .to_string(),
            FetchError::Transport(e) if e.is_timeout() => {
                NetworkError::Timeout.user_message().to_string()
            }
            FetchError::Transport(e) => NetworkError::ConnectionFailed(e.to_string())
                .user_message()
                .to_string(),
            FetchError::Parse(msg) => NetworkError::InvalidResponse(msg.clone())
                .user_message()
                .to_string(),
        }
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::MissingCredential(what) => {
                AppError::Config(ConfigError::MissingSetting(what.to_string()))
            }
            FetchError::Http { status: 401, .. } => AppError::Weather(WeatherError::InvalidApiKey),
            FetchError::Http { status: 404, message } => {
                AppError::Weather(WeatherError::LocationNotFound(message))
            }
            FetchError::Http { status, message } => {
                AppError::Network(NetworkError::ServerError { status, message })
            }
            FetchError::Transport(e) => AppError::Network(e.into_network_error()),
            FetchError::Parse(msg) => AppError::Network(NetworkError::InvalidResponse(msg)),
        }
    }
}

/// Cached JSON fetcher shared by every OpenWeatherMap call.
#[derive(Clone)]
pub struct CachedFetcher {
    client: reqwest::Client,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    freshness: Duration,
}

impl CachedFetcher {
    /// Fetcher with an in-memory cache, the system clock and a 10 minute window.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            store: Arc::new(MemoryCache::new()),
            clock: Arc::new(SystemClock),
            freshness: default_freshness(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Fetch `url`, consulting and refreshing the entry under `key`.
    #[instrument(skip(self, url), fields(url = %redact(url)), level = "debug")]
    pub async fn fetch(&self, url: &str, key: &str) -> Result<Value, FetchError> {
        let now = self.clock.now();

        if let Some(entry) = self.store.get(key) {
            if entry.is_fresh(now, self.freshness) {
                tracing::debug!("Returning cached data for: {}", key);
                return Ok(entry.payload);
            }
        }

        match self.fetch_remote(url).await {
            Ok(payload) => {
                self.store
                    .set(CacheEntry::new(key, payload.clone(), now));
                Ok(payload)
            }
            Err(e) => match self.store.get(key) {
                Some(entry) => {
                    tracing::warn!(
                        "Request failed ({}), returning stale cache for: {}",
                        e,
                        key
                    );
                    Ok(entry.payload)
                }
                None => {
                    tracing::error!("Request failed for {}: {}", key, e);
                    Err(e)
                }
            },
        }
    }

    /// Fetch and decode into `T`. Decoding happens after caching, so a body
    /// that is valid JSON but the wrong shape is still cached.
    pub async fn fetch_as<T: DeserializeOwned>(
        &self,
        url: &str,
        key: &str,
    ) -> Result<T, FetchError> {
        let payload = self.fetch(url, key).await?;
        serde_json::from_value(payload).map_err(|e| FetchError::Parse(e.to_string()))
    }

    async fn fetch_remote(&self, url: &str) -> Result<Value, FetchError> {
        tracing::debug!("Fetching from API: {}", redact(url));
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = server_message(&body)
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            return Err(FetchError::Http {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|e| FetchError::Parse(e.to_string()))
    }
}

/// The `message` (or `error`) field of a JSON error body, if any.
pub fn server_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|field| value.get(field).and_then(Value::as_str))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Mask the `appid` query value so keys never reach the logs.
pub fn redact(url: &str) -> String {
    let Some(start) = url.find("appid=") else {
        return url.to_string();
    };
    let value_start = start + "appid=".len();
    let value_end = url[value_start..]
        .find('&')
        .map_or(url.len(), |i| value_start + i);
    format!("{}***{}", &url[..value_start], &url[value_end..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_masks_api_key() {
        assert_eq!(
            redact("https://x/weather?lat=1&lon=2&appid=SECRET&units=metric"),
            "https://x/weather?lat=1&lon=2&appid=***&units=metric"
        );
        assert_eq!(redact("https://x/geo?q=a&appid=SECRET"), "https://x/geo?q=a&appid=***");
        assert_eq!(redact("https://x/health"), "https://x/health");
    }

    #[test]
    fn test_server_message() {
        assert_eq!(
            server_message(br#"{"cod":401,"message":"Invalid API key"}"#).as_deref(),
            Some("Invalid API key")
        );
        assert_eq!(
            server_message(br#"{"error":"Missing city"}"#).as_deref(),
            Some("Missing city")
        );
        assert_eq!(server_message(b"<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_missing_credential_maps_to_config_error() {
        let app: AppError = FetchError::MissingCredential("OpenWeatherMap API key").into();
        assert!(matches!(
            app,
            AppError::Config(ConfigError::MissingSetting(_))
        ));
    }

    #[test]
    fn test_http_errors_map_by_status() {
        let app: AppError = FetchError::Http {
            status: 401,
            message: "Invalid API key".into(),
        }
        .into();
        assert!(matches!(app, AppError::Weather(WeatherError::InvalidApiKey)));

        let app: AppError = FetchError::Http {
            status: 502,
            message: "HTTP error! status: 502".into(),
        }
        .into();
        assert!(matches!(
            app,
            AppError::Network(NetworkError::ServerError { status: 502, .. })
        ));
    }

    #[test]
    fn test_parse_error_has_distinct_message() {
        let err = FetchError::Parse("expected value at line 1".into());
        assert_eq!(
            err.user_message(),
            "Received an invalid response from the server. Please try again."
        );
    }
}
