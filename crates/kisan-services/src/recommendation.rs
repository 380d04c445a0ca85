//! Crop recommendation backend client.
//!
//! The backend has answered in several shapes over time: a bare array, an
//! object wrapping `recommendations`, a single recommendation object, an
//! "info" object when nothing matched, and an `error` object. All of them are
//! decoded into [`RecommendationResponse`] and reduced to one list by
//! [`RecommendationResponse::normalize`].

use std::time::Duration;

use kisan_core::{BackendConfig, BackendMethod, RecommendationError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::instrument;

use crate::error::ServiceError;
use crate::health::{self, Health};

pub const NO_SPECIFIC_CROP: &str = "No specific recommendation";
pub const GENERIC_ADVICE: &str =
    "Please consult with a local agricultural expert for more specific advice.";

/// Weather and soil a recommendation applies to, as shown to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowingConditions {
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub weather: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_temperature",
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub soil: Option<String>,
}

impl GrowingConditions {
    fn is_empty(&self) -> bool {
        self.weather.is_none() && self.temperature.is_none() && self.soil.is_none()
    }
}

/// A normalized crop recommendation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub crop: String,
    pub advice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<GrowingConditions>,
}

/// One recommendation as the backend sent it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecommendation {
    #[serde(default, deserialize_with = "lenient_text")]
    pub crop: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub advice: Option<String>,
    #[serde(default, deserialize_with = "lenient_conditions")]
    pub conditions: Option<GrowingConditions>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub weather_condition: Option<String>,
    /// `"31.2°C"` from the backend, sometimes a bare number.
    #[serde(default)]
    pub temperature: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub soil: Option<String>,
}

impl RawRecommendation {
    fn into_recommendation(self) -> Recommendation {
        let conditions = self.conditions.filter(|c| !c.is_empty()).or_else(|| {
            let inline = GrowingConditions {
                weather: self.weather_condition,
                temperature: self.temperature.as_ref().and_then(temperature_text),
                soil: self.soil,
            };
            (!inline.is_empty()).then_some(inline)
        });

        Recommendation {
            crop: non_empty(self.crop).unwrap_or_else(|| NO_SPECIFIC_CROP.to_string()),
            advice: non_empty(self.advice).unwrap_or_else(|| GENERIC_ADVICE.to_string()),
            conditions,
        }
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

fn temperature_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(format!("{}°C", n)),
        _ => None,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// Display fields are free-form on the backend; a value of the wrong type
// drops that field only, never the surrounding recommendation.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_text))
}

fn lenient_temperature<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(temperature_text))
}

fn lenient_conditions<'de, D>(deserializer: D) -> Result<Option<GrowingConditions>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Object(_) => GrowingConditions::deserialize(v).ok(),
        _ => None,
    }))
}

/// Every response shape the backend is known to produce.
///
/// Variant order matters: serde tries them top to bottom.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RecommendationResponse {
    List(Vec<RawRecommendation>),
    Failure {
        error: String,
        #[serde(default)]
        details: Option<Value>,
    },
    Wrapped {
        recommendations: Vec<RawRecommendation>,
    },
    Single {
        crop: String,
        #[serde(default, deserialize_with = "lenient_text")]
        advice: Option<String>,
        #[serde(default, deserialize_with = "lenient_conditions")]
        conditions: Option<GrowingConditions>,
    },
    Info {
        message: String,
        #[serde(default)]
        suggestions: Vec<String>,
    },
    Unrecognized(Value),
}

impl RecommendationResponse {
    /// Reduce any response shape to a list of recommendations.
    ///
    /// An info response or an unrecognized object yields an empty list; an
    /// error object yields the backend's error text.
    pub fn normalize(self) -> Result<Vec<Recommendation>, RecommendationError> {
        let raw = match self {
            Self::List(items) | Self::Wrapped {
                recommendations: items,
            } => items,
            Self::Single {
                crop,
                advice,
                conditions,
            } => vec![RawRecommendation {
                crop: Some(crop),
                advice,
                conditions,
                ..RawRecommendation::default()
            }],
            Self::Info { message, .. } => {
                tracing::info!("Backend returned no recommendations: {}", message);
                Vec::new()
            }
            Self::Failure { error, .. } => return Err(RecommendationError::Upstream(error)),
            Self::Unrecognized(value) => {
                tracing::warn!("Unrecognized recommendation response: {}", value);
                Vec::new()
            }
        };

        Ok(raw
            .into_iter()
            .map(RawRecommendation::into_recommendation)
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct RecommendRequest<'a> {
    city: &'a str,
    soil: &'a str,
}

pub struct RecommendationClient {
    client: reqwest::Client,
    base_url: String,
    method: BackendMethod,
}

impl RecommendationClient {
    pub fn new(config: &BackendConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            method: config.method,
        })
    }

    pub fn new_with_base_url(base_url: &str, method: BackendMethod) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            method,
        }
    }

    pub async fn health(&self) -> Health {
        health::check(&self.client, &self.base_url).await
    }

    /// Recommendations for `city` and `soil`, normalized.
    pub async fn recommend(
        &self,
        city: &str,
        soil: &str,
    ) -> Result<Vec<Recommendation>, ServiceError> {
        let response = self.fetch(city, soil).await?;
        Ok(response.normalize()?)
    }

    /// Raw decoded response, after a health check.
    #[instrument(skip(self), level = "info")]
    pub async fn fetch(
        &self,
        city: &str,
        soil: &str,
    ) -> Result<RecommendationResponse, ServiceError> {
        if let Health::Error(details) = self.health().await {
            tracing::warn!("Backend health check failed: {}", details);
            return Err(RecommendationError::BackendUnavailable(details).into());
        }

        let request = match self.method {
            BackendMethod::Post => self
                .client
                .post(format!("{}/recommend", self.base_url))
                .json(&RecommendRequest { city, soil }),
            BackendMethod::Get => {
                let url = url::Url::parse_with_params(
                    &format!("{}/recommend", self.base_url),
                    &[("city", city), ("soil", soil)],
                )
                .map_err(|e| ServiceError::Client(e.to_string()))?;
                self.client.get(url)
            }
        };

        let response = request.header("Accept", "application/json").send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!("Recommendation response status: {}", status);

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse response as JSON: {}", e);
            ServiceError::InvalidResponse(body.clone())
        })?;

        if !status.is_success() {
            let message = ["error", "message"]
                .iter()
                .find_map(|field| value.get(field).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            return Err(ServiceError::Http {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_value(value).map_err(|_| ServiceError::InvalidResponse(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: Value) -> RecommendationResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_shapes_decode_to_expected_variants() {
        assert!(matches!(
            decode(json!([{"crop": "Wheat"}])),
            RecommendationResponse::List(_)
        ));
        assert!(matches!(
            decode(json!({"status": "success", "recommendations": []})),
            RecommendationResponse::Wrapped { .. }
        ));
        assert!(matches!(
            decode(json!({"crop": "Rice", "advice": "Keep fields flooded."})),
            RecommendationResponse::Single { .. }
        ));
        assert!(matches!(
            decode(json!({"status": "info", "message": "No match", "suggestions": ["Ask"]})),
            RecommendationResponse::Info { .. }
        ));
        assert!(matches!(
            decode(json!({"status": "error", "error": "Could not fetch weather"})),
            RecommendationResponse::Failure { .. }
        ));
        assert!(matches!(
            decode(json!({"status": "success"})),
            RecommendationResponse::Unrecognized(_)
        ));
    }

    #[test]
    fn test_wrapped_and_bare_list_normalize_alike() {
        let wheat = json!({"crop": "Wheat", "advice": "Requires moderate watering."});
        let bare = decode(json!([wheat.clone()])).normalize().unwrap();
        let wrapped = decode(json!({"recommendations": [wheat]})).normalize().unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare[0].crop, "Wheat");
    }

    #[test]
    fn test_missing_fields_get_defaults() {
        let recs = decode(json!([{}])).normalize().unwrap();
        assert_eq!(recs[0].crop, NO_SPECIFIC_CROP);
        assert_eq!(recs[0].advice, GENERIC_ADVICE);
        assert_eq!(recs[0].conditions, None);
    }

    #[test]
    fn test_inline_weather_becomes_conditions() {
        let recs = decode(json!({
            "recommendations": [{
                "crop": "Wheat",
                "advice": "Ideal for current conditions.",
                "weather_condition": "Clear",
                "temperature": "24.5°C"
            }]
        }))
        .normalize()
        .unwrap();

        assert_eq!(
            recs[0].conditions,
            Some(GrowingConditions {
                weather: Some("Clear".into()),
                temperature: Some("24.5°C".into()),
                soil: None,
            })
        );
    }

    #[test]
    fn test_numeric_temperature() {
        let recs = decode(json!([{"crop": "Bajra", "temperature": 31}]))
            .normalize()
            .unwrap();
        assert_eq!(
            recs[0].conditions.as_ref().unwrap().temperature.as_deref(),
            Some("31°C")
        );
    }

    #[test]
    fn test_loose_condition_types_keep_every_crop() {
        let response = decode(json!({
            "recommendations": [
                {"crop": "Wheat", "conditions": {"temperature": 28, "weather": ["Clear"]}},
                {"crop": "Rice"},
                {"crop": "Cotton", "advice": 7, "conditions": "hot and dry"}
            ]
        }));
        assert!(matches!(response, RecommendationResponse::Wrapped { .. }));

        let recs = response.normalize().unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].crop, "Wheat");
        assert_eq!(
            recs[0].conditions,
            Some(GrowingConditions {
                weather: None,
                temperature: Some("28°C".into()),
                soil: None,
            })
        );
        assert_eq!(recs[1].crop, "Rice");
        assert_eq!(recs[2].advice, "7");
        assert_eq!(recs[2].conditions, None);
    }

    #[test]
    fn test_single_with_numeric_conditions() {
        let recs = decode(json!({
            "crop": "Maize",
            "conditions": {"soil": "Loamy", "temperature": 26.5}
        }))
        .normalize()
        .unwrap();
        assert_eq!(recs.len(), 1);
        let conditions = recs[0].conditions.as_ref().unwrap();
        assert_eq!(conditions.temperature.as_deref(), Some("26.5°C"));
        assert_eq!(conditions.soil.as_deref(), Some("Loamy"));
    }

    #[test]
    fn test_info_normalizes_to_empty() {
        let recs = decode(json!({
            "status": "info",
            "message": "No specific crop recommendations found for the current conditions.",
            "suggestions": ["Consult with local agricultural experts for personalized advice."]
        }))
        .normalize()
        .unwrap();
        assert!(recs.is_empty());
    }

    #[test]
    fn test_failure_carries_upstream_text() {
        let err = decode(json!({"error": "Missing city or soil type"}))
            .normalize()
            .unwrap_err();
        assert_eq!(
            err.user_message(),
            "Crop recommendation error: Missing city or soil type"
        );
    }
}
