//! Centralized error types for the Kisan application.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides user-friendly messages suitable for display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Every crate error converts into this type. Use `user_message()` to get a
/// message suitable for showing to the farmer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Recommendation error: {0}")]
    Recommendation(#[from] RecommendationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    /// Recovers a typed config or storage error from an `anyhow` chain.
    fn from(e: anyhow::Error) -> Self {
        let e = match e.downcast::<ConfigError>() {
            Ok(config) => return AppError::Config(config),
            Err(e) => e,
        };
        match e.downcast::<StorageError>() {
            Ok(storage) => AppError::Storage(storage),
            Err(e) => AppError::Other(e),
        }
    }
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(e) => e.user_message().to_string(),
            AppError::Config(e) => e.user_message().to_string(),
            AppError::Weather(e) => e.user_message().to_string(),
            AppError::Recommendation(e) => e.user_message(),
            AppError::Storage(e) => e.user_message().to_string(),
            AppError::Io(_) => "A file operation failed. Please try again.".to_string(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.".to_string(),
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an invalid response from the server. Please try again."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

/// Weather service errors.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Weather API error: {0}")]
    ApiError(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::LocationNotFound(_) => "Location not found. Check and try again.",
            WeatherError::ApiError(_) => "Failed to fetch weather data. Please try again.",
            WeatherError::InvalidApiKey => "Weather API key is invalid. Check settings.",
            WeatherError::ServiceUnavailable => {
                "Weather service unavailable. Please try again later."
            }
        }
    }
}

/// Crop recommendation errors.
#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl RecommendationError {
    /// Upstream and validation messages are shown verbatim since they are
    /// already written for the user.
    pub fn user_message(&self) -> String {
        match self {
            RecommendationError::InvalidInput(msg) => msg.clone(),
            RecommendationError::BackendUnavailable(_) => {
                "Backend service is unavailable. Please try again later.".to_string()
            }
            RecommendationError::Upstream(msg) => format!("Crop recommendation error: {}", msg),
        }
    }
}

/// Preference storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read preferences: {0}")]
    Read(String),

    #[error("Failed to write preferences: {0}")]
    Write(String),

    #[error("Preferences are corrupted: {0}")]
    Corrupted(String),
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::Read(_) => "Unable to load your saved settings.",
            StorageError::Write(_) => "Failed to save your settings. Please try again.",
            StorageError::Corrupted(_) => {
                "Saved settings are corrupted. Consider resetting them."
            }
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_conversion() {
        let err = WeatherError::ServiceUnavailable;
        let app_err: AppError = err.into();
        assert!(matches!(
            app_err,
            AppError::Weather(WeatherError::ServiceUnavailable)
        ));
    }

    #[test]
    fn test_config_error_survives_anyhow() {
        let err = anyhow::Error::from(ConfigError::ParseError("expected `]`".into()))
            .context("Failed to start");
        let app_err: AppError = err.into();
        assert!(matches!(app_err, AppError::Config(ConfigError::ParseError(_))));
        assert_eq!(
            app_err.user_message(),
            "Configuration file is malformed. Check your settings."
        );

        let app_err: AppError = anyhow::anyhow!("boom").into();
        assert!(matches!(app_err, AppError::Other(_)));
    }

    #[test]
    fn test_user_message_propagation() {
        let app_err = AppError::Network(NetworkError::Timeout);
        assert_eq!(
            app_err.user_message(),
            "The request timed out. Please try again."
        );
    }

    #[test]
    fn test_server_error_message_depends_on_status() {
        let server = NetworkError::ServerError {
            status: 503,
            message: "down".into(),
        };
        let client = NetworkError::ServerError {
            status: 404,
            message: "missing".into(),
        };
        assert!(server.user_message().contains("later"));
        assert_eq!(client.user_message(), "The request failed. Please try again.");
    }

    #[test]
    fn test_upstream_recommendation_text_is_kept() {
        let err = RecommendationError::Upstream("Could not fetch weather for Xyz".into());
        assert!(err.user_message().contains("Could not fetch weather for Xyz"));

        let err = RecommendationError::InvalidInput("Please select a soil type".into());
        assert_eq!(err.user_message(), "Please select a soil type");
    }
}
