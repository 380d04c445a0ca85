//! Backend chat assistant client.

use std::time::Duration;

use kisan_core::BackendConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::error::ChatError;
use crate::health::{self, Health};

pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't process your request.";

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    query: &'a str,
}

/// The backend has replied under both names.
#[derive(Debug, Deserialize)]
struct ChatReply {
    response: Option<String>,
    answer: Option<String>,
}

impl ChatReply {
    fn into_text(self) -> String {
        self.response
            .or(self.answer)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| FALLBACK_REPLY.to_string())
    }
}

/// `error` or `message` from a JSON failure body.
fn upstream_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|field| value.get(field).and_then(Value::as_str))
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}

pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    history: Vec<ChatMessage>,
}

impl ChatClient {
    pub fn new(config: &BackendConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            history: Vec::new(),
        })
    }

    pub fn new_with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub async fn health(&self) -> Health {
        health::check(&self.client, &self.base_url).await
    }

    /// Send `message` and return the assistant's reply.
    ///
    /// Both sides of the exchange are appended to the history, even when the
    /// request fails; the reply recorded then is the user-facing error text.
    #[instrument(skip(self, message), level = "info")]
    pub async fn send(&mut self, message: &str) -> Result<String, ChatError> {
        self.history.push(ChatMessage {
            role: Role::User,
            content: message.to_string(),
        });

        let result = self.request(message).await;
        let content = match &result {
            Ok(reply) => reply.clone(),
            Err(e) => {
                tracing::error!("Error sending chat message: {}", e);
                e.user_message()
            }
        };
        self.history.push(ChatMessage {
            role: Role::Assistant,
            content,
        });

        result
    }

    async fn request(&self, message: &str) -> Result<String, ChatError> {
        let response = self
            .client
            .post(format!("{}/chat", self.base_url))
            .json(&ChatRequest { query: message })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Http {
                status: status.as_u16(),
                message: upstream_message(&body),
            });
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| ChatError::InvalidResponse(e.to_string()))?;
        Ok(reply.into_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_field_precedence() {
        let reply: ChatReply =
            serde_json::from_str(r#"{"response":"from response","answer":"from answer"}"#)
                .unwrap();
        assert_eq!(reply.into_text(), "from response");

        let reply: ChatReply = serde_json::from_str(r#"{"answer":"Sow after rain."}"#).unwrap();
        assert_eq!(reply.into_text(), "Sow after rain.");

        let reply: ChatReply = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert_eq!(reply.into_text(), FALLBACK_REPLY);
    }

    #[test]
    fn test_upstream_message_from_failure_body() {
        assert_eq!(
            upstream_message(r#"{"error":"Gemini API key is not configured."}"#).as_deref(),
            Some("Gemini API key is not configured.")
        );
        assert_eq!(
            upstream_message(r#"{"message":"Query is required"}"#).as_deref(),
            Some("Query is required")
        );
        assert_eq!(upstream_message(r#"{"error":""}"#), None);
        assert_eq!(upstream_message("<html>Bad Gateway</html>"), None);
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_string(&ChatRequest { query: "When to sow wheat?" }).unwrap();
        assert_eq!(body, r#"{"query":"When to sow wheat?"}"#);
    }
}
