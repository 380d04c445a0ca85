//! Backend liveness check shared by the recommendation and chat clients.

use std::fmt;

use tracing::instrument;

/// Result of probing `{base}/health`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    Ok,
    Error(String),
}

impl Health {
    pub fn is_ok(&self) -> bool {
        matches!(self, Health::Ok)
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Ok => f.write_str("Backend is running and healthy"),
            Health::Error(message) => f.write_str(message),
        }
    }
}

/// Any 2xx counts as healthy; the body is not inspected.
#[instrument(skip(client), level = "debug")]
pub(crate) async fn check(client: &reqwest::Client, base_url: &str) -> Health {
    let url = format!("{}/health", base_url);

    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => Health::Ok,
        Ok(response) => {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Health::Error(format!("Backend returned status {}: {}", status, body))
        }
        Err(e) => Health::Error(format!(
            "Failed to connect to backend at {}: {}",
            base_url, e
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_check_healthy() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "message": "Backend service is running",
                "version": "1.0.0"
            })))
            .mount(&mock_server)
            .await;

        let health = check(&reqwest::Client::new(), &mock_server.uri()).await;
        assert!(health.is_ok());
        assert_eq!(health.to_string(), "Backend is running and healthy");
    }

    #[tokio::test]
    async fn test_check_reports_status_and_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&mock_server)
            .await;

        let health = check(&reqwest::Client::new(), &mock_server.uri()).await;
        assert_eq!(
            health,
            Health::Error("Backend returned status 503: maintenance".to_string())
        );
    }
}
