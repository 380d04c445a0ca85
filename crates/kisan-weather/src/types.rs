use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fetch::FetchError;

/// A latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Deterministic cache key for a resource at these coordinates,
    /// e.g. `weather_23.0225_72.5714`.
    pub fn cache_key(&self, kind: &str) -> String {
        format!("{}_{}_{}", kind, self.lat, self.lon)
    }
}

impl Default for Coordinates {
    fn default() -> Self {
        Self::new(kisan_core::config::DEFAULT_LATITUDE, kisan_core::config::DEFAULT_LONGITUDE)
    }
}

/// Weather condition groups derived from OpenWeatherMap condition ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Thunderstorm,
}

impl WeatherCondition {
    /// Map an OpenWeatherMap condition id.
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_owm_id(id: i32) -> Self {
        match id {
            200..=299 => Self::Thunderstorm,
            300..=399 => Self::Drizzle,
            502..=504 | 522 | 531 => Self::HeavyRain,
            500..=599 => Self::Rain,
            600..=699 => Self::Snow,
            700..=799 => Self::Fog, // Mist, haze, dust, smoke
            800 => Self::Clear,
            801 | 802 => Self::PartlyCloudy,
            803 | 804 => Self::Cloudy,
            _ => Self::Clear, // Unknown ids default to clear
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Thunderstorm => "Thunderstorm",
        }
    }
}

/// One entry of the `weather[]` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: i32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl Condition {
    pub fn category(&self) -> WeatherCondition {
        WeatherCondition::from_owm_id(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sea_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grnd_level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    #[serde(default)]
    pub deg: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gust: Option<f64>,
}

impl Wind {
    pub fn speed_kmh(&self) -> f64 {
        self.speed * 3.6
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunrise: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clouds {
    pub all: f64,
}

/// Current conditions from `/data/2.5/weather`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub dt: i64,
    pub main: MainReadings,
    pub weather: Vec<Condition>,
    pub wind: Wind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clouds: Option<Clouds>,
    #[serde(default)]
    pub sys: Sys,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CurrentWeather {
    /// The first reported condition, if any
    pub fn primary(&self) -> Option<&Condition> {
        self.weather.first()
    }

    /// Short condition label (`Clear`, `Rain`, ...), `Unknown` when absent
    pub fn condition_main(&self) -> &str {
        self.primary().map_or("Unknown", |c| c.main.as_str())
    }

    pub fn sunrise(&self) -> Option<DateTime<Utc>> {
        self.sys.sunrise.and_then(|s| DateTime::from_timestamp(s, 0))
    }

    pub fn sunset(&self) -> Option<DateTime<Utc>> {
        self.sys.sunset.and_then(|s| DateTime::from_timestamp(s, 0))
    }
}

/// One forecast day, flattened from the One Call `daily` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub dt: i64,
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub weather: Vec<Condition>,
    pub wind: Wind,
    /// Probability of precipitation, 0.0 to 1.0
    pub pop: Option<f64>,
    /// Precipitation volume, mm
    pub rain: Option<f64>,
    pub snow: Option<f64>,
    pub clouds: Option<f64>,
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

impl DailyForecast {
    pub fn date(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.dt, 0)
    }
}

/// Daily forecast for one place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    /// Place name derived from the IANA timezone (`Asia/Kolkata` → `Kolkata`)
    pub place: String,
    pub timezone_offset: Option<i64>,
    pub days: Vec<DailyForecast>,
}

/// Icon sizes served by openweathermap.org
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IconSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl IconSize {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Small => "",
            Self::Medium => "@2x",
            Self::Large => "@4x",
        }
    }
}

/// Result of an API connectivity check
#[derive(Debug, Clone)]
pub struct ApiCheck {
    pub success: bool,
    pub message: String,
    pub current: Option<CurrentWeather>,
    pub forecast: Option<Forecast>,
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Invalid weather data received from API: {0}")]
    InvalidData(String),

    #[error("No location data found for {0}")]
    LocationNotFound(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl ProviderError {
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::Fetch(e) => e.user_message(),
            ProviderError::InvalidData(_) => {
                "Received invalid weather data. Please try again.".to_string()
            }
            ProviderError::LocationNotFound(_) => {
                kisan_core::WeatherError::LocationNotFound(String::new())
                    .user_message()
                    .to_string()
            }
            ProviderError::Client(_) => kisan_core::WeatherError::ServiceUnavailable
                .user_message()
                .to_string(),
        }
    }
}

impl From<ProviderError> for kisan_core::AppError {
    fn from(e: ProviderError) -> Self {
        use kisan_core::{AppError, NetworkError, WeatherError};
        match e {
            ProviderError::Fetch(e) => e.into(),
            ProviderError::InvalidData(msg) => AppError::Network(NetworkError::InvalidResponse(msg)),
            ProviderError::LocationNotFound(place) => {
                AppError::Weather(WeatherError::LocationNotFound(place))
            }
            ProviderError::Client(msg) => AppError::Weather(WeatherError::ApiError(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_format() {
        let coords = Coordinates::new(23.0225, 72.5714);
        assert_eq!(coords.cache_key("weather"), "weather_23.0225_72.5714");
        assert_eq!(coords.cache_key("forecast"), "forecast_23.0225_72.5714");
    }

    #[test]
    fn test_default_coordinates_are_ahmedabad() {
        assert_eq!(Coordinates::default(), Coordinates::new(23.0225, 72.5714));
    }

    #[test]
    fn test_owm_thunderstorm_and_drizzle() {
        assert_eq!(WeatherCondition::from_owm_id(211), WeatherCondition::Thunderstorm);
        assert_eq!(WeatherCondition::from_owm_id(301), WeatherCondition::Drizzle);
    }

    #[test]
    fn test_owm_rain() {
        assert_eq!(WeatherCondition::from_owm_id(500), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_owm_id(501), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_owm_id(502), WeatherCondition::HeavyRain);
        assert_eq!(WeatherCondition::from_owm_id(522), WeatherCondition::HeavyRain);
    }

    #[test]
    fn test_owm_clouds() {
        assert_eq!(WeatherCondition::from_owm_id(800), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_owm_id(801), WeatherCondition::PartlyCloudy);
        assert_eq!(WeatherCondition::from_owm_id(804), WeatherCondition::Cloudy);
    }

    #[test]
    fn test_owm_atmosphere_and_snow() {
        assert_eq!(WeatherCondition::from_owm_id(721), WeatherCondition::Fog);
        assert_eq!(WeatherCondition::from_owm_id(601), WeatherCondition::Snow);
    }

    #[test]
    fn test_owm_unknown_defaults_to_clear() {
        assert_eq!(WeatherCondition::from_owm_id(999), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_owm_id(-1), WeatherCondition::Clear);
    }

    #[test]
    fn test_current_weather_decodes_sample() {
        let json = serde_json::json!({
            "dt": 1768456800,
            "main": {"temp": 30.2, "feels_like": 31.0, "humidity": 40, "pressure": 1012,
                     "temp_min": 29.0, "temp_max": 31.5},
            "weather": [{"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}],
            "wind": {"speed": 2.5, "deg": 310},
            "sys": {"country": "IN", "sunrise": 1768440000, "sunset": 1768480000},
            "name": "Ahmedabad"
        });

        let current: CurrentWeather = serde_json::from_value(json).unwrap();
        assert_eq!(current.condition_main(), "Clear");
        assert_eq!(current.primary().unwrap().category(), WeatherCondition::Clear);
        assert_eq!(current.main.humidity, 40.0);
        assert_eq!((current.wind.speed_kmh()).round(), 9.0);
        assert!(current.sunrise().is_some());
    }

    #[test]
    fn test_current_weather_requires_main() {
        let json = serde_json::json!({"dt": 1, "weather": [], "wind": {"speed": 1.0}});
        assert!(serde_json::from_value::<CurrentWeather>(json).is_err());
    }

    #[test]
    fn test_icon_size_suffix() {
        assert_eq!(IconSize::Small.suffix(), "");
        assert_eq!(IconSize::default().suffix(), "@2x");
        assert_eq!(IconSize::Large.suffix(), "@4x");
    }
}
