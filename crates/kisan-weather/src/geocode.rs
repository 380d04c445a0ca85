//! Forward geocoding: resolve a selected state/city to coordinates.
//! Uses the OpenWeatherMap direct geocoding API, restricted to India.

use kisan_core::Location;
use serde::Deserialize;
use tracing::instrument;

use crate::provider::WeatherProvider;
use crate::types::{Coordinates, ProviderError};

const COUNTRY_CODE: &str = "IN";

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    lat: f64,
    lon: f64,
}

/// Cache key for a geocoding lookup. Case-insensitive in the place names.
pub fn geocode_cache_key(location: &Location) -> String {
    format!("geo_{}_{}", location.city(), location.state()).to_lowercase()
}

impl WeatherProvider {
    /// Coordinates of `location`, served from the shared response cache when fresh.
    #[instrument(skip(self), fields(location = %location), level = "info")]
    pub async fn geocode(&self, location: &Location) -> Result<Coordinates, ProviderError> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/geo/1.0/direct?q={},{},{}&limit=1&appid={}",
            self.base_url(),
            urlencoding::encode(location.city()),
            urlencoding::encode(location.state()),
            COUNTRY_CODE,
            api_key
        );

        let hits: Vec<GeocodeHit> = self
            .fetcher()
            .fetch_as(&url, &geocode_cache_key(location))
            .await?;

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::LocationNotFound(location.to_string()))?;

        tracing::debug!("Resolved {} to ({}, {})", location, hit.lat, hit.lon);
        Ok(Coordinates::new(hit.lat, hit.lon))
    }
}
