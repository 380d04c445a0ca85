use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;
use crate::session::Location;

/// Environment variable consulted when no API key is stored in the config file.
pub const OPENWEATHER_API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Ahmedabad, used whenever no location has been selected.
pub const DEFAULT_LATITUDE: f64 = 23.0225;
pub const DEFAULT_LONGITUDE: f64 = 72.5714;
pub const DEFAULT_STATE: &str = "Gujarat";
pub const DEFAULT_CITY: &str = "Ahmedabad";

pub const DEFAULT_CHAT_WEBHOOK_URL: &str =
    "https://n8n-lamm.onrender.com/webhook/9d63f026-b368-413b-827b-2a7048b26366/chat";
pub const DEFAULT_CHAT_CDN_BASE_URL: &str = "https://cdn.jsdelivr.net/npm/@n8n/chat/dist";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (preferences live here too)
    pub config_dir: PathBuf,

    /// OpenWeatherMap settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Recommendation/chat backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Embedded chat widget settings
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key. Falls back to `OPENWEATHER_API_KEY` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenWeatherMap API
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,

    /// How long a fetched response is served without refetching
    #[serde(default = "default_freshness_minutes")]
    pub freshness_minutes: u32,

    /// HTTP client timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Coordinates used when no location is selected
    #[serde(default = "default_latitude")]
    pub default_lat: f64,
    #[serde(default = "default_longitude")]
    pub default_lon: f64,

    /// Location selected on first start. Leave either blank to start with none.
    #[serde(default = "default_state")]
    pub default_state: String,
    #[serde(default = "default_city")]
    pub default_city: String,
}

fn default_weather_base_url() -> String {
    "https://api.openweathermap.org".to_string()
}

fn default_freshness_minutes() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_latitude() -> f64 {
    DEFAULT_LATITUDE
}

fn default_longitude() -> f64 {
    DEFAULT_LONGITUDE
}

fn default_state() -> String {
    DEFAULT_STATE.to_string()
}

fn default_city() -> String {
    DEFAULT_CITY.to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
            freshness_minutes: default_freshness_minutes(),
            timeout_secs: default_timeout_secs(),
            default_lat: DEFAULT_LATITUDE,
            default_lon: DEFAULT_LONGITUDE,
            default_state: default_state(),
            default_city: default_city(),
        }
    }
}

impl WeatherConfig {
    /// The effective API key: the configured one, else the environment.
    /// Blank values count as missing.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(OPENWEATHER_API_KEY_ENV).ok())
            .filter(|k| !k.trim().is_empty())
    }

    /// The first-start location, if both parts are set.
    pub fn default_location(&self) -> Option<Location> {
        Location::new(self.default_state.as_str(), self.default_city.as_str()).ok()
    }
}

/// How the recommendation endpoint is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendMethod {
    /// JSON body `{city, soil}`
    #[default]
    Post,
    /// Query string `?city=..&soil=..`
    Get,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the recommendation/chat backend
    #[serde(default = "default_backend_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub method: BackendMethod,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend_base_url() -> String {
    "http://localhost:5000".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_base_url(),
            method: BackendMethod::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_webhook_url")]
    pub webhook_url: String,

    /// Directory on the CDN holding `style.css` and `chat.bundle.es.js`
    #[serde(default = "default_cdn_base_url")]
    pub cdn_base_url: String,
}

fn default_webhook_url() -> String {
    DEFAULT_CHAT_WEBHOOK_URL.to_string()
}

fn default_cdn_base_url() -> String {
    DEFAULT_CHAT_CDN_BASE_URL.to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            webhook_url: default_webhook_url(),
            cdn_base_url: default_cdn_base_url(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kisan");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            backend: BackendConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let mut config = Self::default();
            if let Some(parent) = path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; errors abort the load.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::load_validated_from(&Self::config_path()?)
    }

    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult)> {
        let config = Self::load_from(path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.base_url, "weather.base_url", &mut result);
        self.validate_url(&self.backend.base_url, "backend.base_url", &mut result);
        self.validate_url(&self.chat.webhook_url, "chat.webhook_url", &mut result);
        self.validate_url(&self.chat.cdn_base_url, "chat.cdn_base_url", &mut result);

        if self.weather.resolved_api_key().is_none() {
            result.add_warning(
                "weather.api_key",
                format!(
                    "No OpenWeatherMap API key configured (set weather.api_key or {})",
                    OPENWEATHER_API_KEY_ENV
                ),
            );
        }

        if self.weather.freshness_minutes == 0 {
            result.add_warning(
                "weather.freshness_minutes",
                "Response caching disabled (0 minutes)",
            );
        } else if self.weather.freshness_minutes > 1440 {
            result.add_warning(
                "weather.freshness_minutes",
                "Freshness window is more than 24 hours",
            );
        }

        if !(-90.0..=90.0).contains(&self.weather.default_lat) {
            result.add_error("weather.default_lat", "Latitude must be between -90 and 90");
        }
        if !(-180.0..=180.0).contains(&self.weather.default_lon) {
            result.add_error(
                "weather.default_lon",
                "Longitude must be between -180 and 180",
            );
        }

        if self.weather.default_state.trim().is_empty()
            != self.weather.default_city.trim().is_empty()
        {
            result.add_warning(
                "weather.default_state",
                "Only one of default_state and default_city is set; no location will be preselected",
            );
        }

        if self.weather.timeout_secs == 0 || self.backend.timeout_secs == 0 {
            result.add_error("timeout_secs", "Timeouts must be greater than 0");
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("kisan");

        Ok(config_dir.join("config.toml"))
    }
}
