//! Error types for the backend-facing services.

use kisan_core::{AppError, NetworkError, RecommendationError, ReqwestErrorExt};
use kisan_weather::ProviderError;
use thiserror::Error;

/// Errors from the recommendation client and crop advisor.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Recommendation(#[from] RecommendationError),

    /// Non-success status; `message` is the backend's text when it sent one.
    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Invalid response format from server")]
    InvalidResponse(String),

    #[error(transparent)]
    Weather(#[from] ProviderError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl ServiceError {
    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Recommendation(e) => e.user_message(),
            Self::Http { message, .. } => format!("Crop recommendation error: {}", message),
            Self::InvalidResponse(_) => "Invalid response format from server".to_string(),
            Self::Weather(e) => e.user_message(),
            Self::Network(e) if e.is_timeout() => NetworkError::Timeout.user_message().to_string(),
            Self::Network(_) => "Network error. Check your connection.".to_string(),
            Self::Client(_) => "An unexpected error occurred. Please try again.".to_string(),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Recommendation(e) => AppError::Recommendation(e),
            ServiceError::Http { status, message } => {
                AppError::Network(NetworkError::ServerError { status, message })
            }
            ServiceError::InvalidResponse(raw) => {
                AppError::Network(NetworkError::InvalidResponse(raw))
            }
            ServiceError::Weather(e) => e.into(),
            ServiceError::Network(e) => AppError::Network(e.into_network_error()),
            ServiceError::Client(msg) => AppError::Other(anyhow::anyhow!(msg)),
        }
    }
}

/// Errors from the chat client.
#[derive(Error, Debug)]
pub enum ChatError {
    /// Non-success status; `message` is the backend's text when it sent one.
    #[error(
        "Failed to send message (status {status}): {}",
        .message.as_deref().unwrap_or("no details")
    )]
    Http {
        status: u16,
        message: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid chat response: {0}")]
    InvalidResponse(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl ChatError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Http {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Http { message: None, .. }
            | Self::Network(_)
            | Self::InvalidResponse(_)
            | Self::Client(_) => {
                "I'm having trouble connecting to the server. Please try again later.".to_string()
            }
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Http { status, message } => AppError::Network(NetworkError::ServerError {
                status,
                message: message.unwrap_or_else(|| "Failed to send message".to_string()),
            }),
            ChatError::Network(e) => AppError::Network(e.into_network_error()),
            ChatError::InvalidResponse(msg) => AppError::Network(NetworkError::InvalidResponse(msg)),
            ChatError::Client(msg) => AppError::Other(anyhow::anyhow!(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = ServiceError::Http {
            status: 400,
            message: "Missing city or soil type".into(),
        };
        assert_eq!(
            err.user_message(),
            "Crop recommendation error: Missing city or soil type"
        );

        let err = ServiceError::InvalidResponse("<html>".into());
        assert_eq!(err.user_message(), "Invalid response format from server");

        let err = ServiceError::Recommendation(RecommendationError::InvalidInput(
            "Please select a city".into(),
        ));
        assert_eq!(err.user_message(), "Please select a city");
    }

    #[test]
    fn test_chat_error_messages() {
        let err = ChatError::Http {
            status: 500,
            message: Some("Gemini API key is not configured.".into()),
        };
        assert_eq!(err.user_message(), "Gemini API key is not configured.");
        assert_eq!(
            err.to_string(),
            "Failed to send message (status 500): Gemini API key is not configured."
        );

        let err = ChatError::Http {
            status: 502,
            message: None,
        };
        assert!(err.user_message().contains("trouble connecting"));
        assert!(ChatError::InvalidResponse("eof".into())
            .user_message()
            .contains("trouble connecting"));
        assert!(ChatError::Client("tls".into())
            .user_message()
            .contains("trouble connecting"));
    }

    #[test]
    fn test_into_app_error() {
        let app: AppError = ServiceError::Http {
            status: 502,
            message: "bad gateway".into(),
        }
        .into();
        assert!(matches!(
            app,
            AppError::Network(NetworkError::ServerError { status: 502, .. })
        ));

        let app: AppError =
            ServiceError::Recommendation(RecommendationError::Upstream("x".into())).into();
        assert!(matches!(app, AppError::Recommendation(_)));

        let app: AppError = ChatError::Http {
            status: 500,
            message: Some("quota exceeded".into()),
        }
        .into();
        match app {
            AppError::Network(NetworkError::ServerError { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
