//! OpenWeatherMap client: current conditions, daily forecast, icons.

use std::time::Duration;

use kisan_core::WeatherConfig;
use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::fetch::{CachedFetcher, FetchError};
use crate::types::{
    ApiCheck, Condition, Coordinates, CurrentWeather, DailyForecast, Forecast, IconSize,
    ProviderError, Wind,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";
const DEFAULT_ICON: &str = "https://openweathermap.org/img/wn/01d@2x.png";
const API_KEY_SETTING: &str = "OpenWeatherMap API key";

#[derive(Clone)]
pub struct WeatherProvider {
    fetcher: CachedFetcher,
    api_key: Option<String>,
    base_url: String,
}

impl WeatherProvider {
    /// Build a provider from config with a fresh in-memory cache.
    pub fn new(config: &WeatherConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;

        let fetcher = CachedFetcher::new(client).with_freshness(chrono::Duration::minutes(
            i64::from(config.freshness_minutes),
        ));

        Ok(Self::with_fetcher(
            fetcher,
            config.resolved_api_key(),
            &config.base_url,
        ))
    }

    pub fn with_fetcher(fetcher: CachedFetcher, api_key: Option<String>, base_url: &str) -> Self {
        Self {
            fetcher,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn fetcher(&self) -> &CachedFetcher {
        &self.fetcher
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Checked before any request so a missing key never reaches the network.
    pub(crate) fn api_key(&self) -> Result<&str, FetchError> {
        self.api_key
            .as_deref()
            .ok_or(FetchError::MissingCredential(API_KEY_SETTING))
    }

    /// Current conditions at `coords` (metric units).
    #[instrument(skip(self), level = "info")]
    pub async fn current(&self, coords: Coordinates) -> Result<CurrentWeather, ProviderError> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/data/2.5/weather?lat={}&lon={}&appid={}&units=metric",
            self.base_url, coords.lat, coords.lon, api_key
        );

        let payload = self.fetcher.fetch(&url, &coords.cache_key("weather")).await?;
        serde_json::from_value(payload).map_err(|e| ProviderError::InvalidData(e.to_string()))
    }

    /// Daily forecast at `coords` from the One Call 3.0 API.
    #[instrument(skip(self), level = "info")]
    pub async fn forecast(&self, coords: Coordinates) -> Result<Forecast, ProviderError> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/data/3.0/onecall?lat={}&lon={}&exclude=minutely,hourly,alerts&appid={}&units=metric",
            self.base_url, coords.lat, coords.lon, api_key
        );

        let payload = self.fetcher.fetch(&url, &coords.cache_key("forecast")).await?;
        let raw: OneCallResponse = serde_json::from_value(payload)
            .map_err(|e| ProviderError::InvalidData(e.to_string()))?;
        Ok(raw.into_forecast())
    }

    /// Fetch current weather and forecast together and summarize the result.
    pub async fn check(&self, coords: Coordinates) -> ApiCheck {
        tracing::info!("Testing weather API...");
        match tokio::try_join!(self.current(coords), self.forecast(coords)) {
            Ok((current, forecast)) => {
                let description = current
                    .primary()
                    .map_or("unknown", |c| c.description.as_str());
                ApiCheck {
                    success: true,
                    message: format!(
                        "API is working! Current weather: {}, {}°C",
                        description,
                        current.main.temp.round()
                    ),
                    current: Some(current),
                    forecast: Some(forecast),
                }
            }
            Err(e) => {
                tracing::error!("Weather API test failed: {}", e);
                ApiCheck {
                    success: false,
                    message: format!("API test failed: {}", e),
                    current: None,
                    forecast: None,
                }
            }
        }
    }

    /// URL of the icon for an OpenWeatherMap icon code.
    pub fn icon_url(code: &str, size: IconSize) -> String {
        if code.is_empty() {
            tracing::warn!("No icon code provided, using default icon");
            return DEFAULT_ICON.to_string();
        }
        format!("{}/{}{}.png", ICON_BASE_URL, code, size.suffix())
    }
}

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    timezone: Option<String>,
    timezone_offset: Option<i64>,
    daily: Vec<OneCallDay>,
}

#[derive(Debug, Deserialize)]
struct OneCallDay {
    dt: i64,
    temp: DayTemps,
    feels_like: DayFeelsLike,
    pressure: f64,
    humidity: f64,
    #[serde(default)]
    weather: Vec<Condition>,
    wind_speed: f64,
    #[serde(default)]
    wind_deg: f64,
    wind_gust: Option<f64>,
    pop: Option<f64>,
    rain: Option<f64>,
    snow: Option<f64>,
    clouds: Option<f64>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DayTemps {
    day: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct DayFeelsLike {
    day: f64,
}

impl OneCallResponse {
    fn into_forecast(self) -> Forecast {
        let place = place_from_timezone(self.timezone.as_deref());
        let days = self
            .daily
            .into_iter()
            .map(|day| DailyForecast {
                dt: day.dt,
                temp: day.temp.day,
                feels_like: day.feels_like.day,
                temp_min: day.temp.min,
                temp_max: day.temp.max,
                pressure: day.pressure,
                humidity: day.humidity,
                weather: day.weather,
                wind: Wind {
                    speed: day.wind_speed,
                    deg: day.wind_deg,
                    gust: day.wind_gust,
                },
                pop: day.pop,
                rain: day.rain,
                snow: day.snow,
                clouds: day.clouds,
                sunrise: day.sunrise,
                sunset: day.sunset,
            })
            .collect();

        Forecast {
            place,
            timezone_offset: self.timezone_offset,
            days,
        }
    }
}

/// `Asia/Kolkata` → `Kolkata`, `America/New_York` → `New York`.
fn place_from_timezone(timezone: Option<&str>) -> String {
    timezone
        .and_then(|tz| tz.split('/').nth(1))
        .map(|city| city.replace('_', " "))
        .unwrap_or_else(|| "Unknown Location".to_string())
}
