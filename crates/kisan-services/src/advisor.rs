//! Crop advice: location → coordinates → current weather → recommendations.

use kisan_core::{Location, RecommendationError};
use kisan_weather::{CurrentWeather, WeatherProvider};
use serde::Serialize;
use tracing::instrument;

use crate::error::ServiceError;
use crate::recommendation::{
    GrowingConditions, Recommendation, RecommendationClient, NO_SPECIFIC_CROP,
};

/// Soil types offered to the user.
pub const SOIL_TYPES: [&str; 6] = ["Sandy Loam", "Clay", "Loamy", "Alluvial", "Black", "Red"];

const NO_MATCH_ADVICE: &str = "No specific crop recommendations found for the given location \
     and conditions. Please consult with a local agricultural expert.";

/// Weather at the time the advice was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSummary {
    pub temp: f64,
    pub humidity: f64,
    pub condition: String,
}

impl From<&CurrentWeather> for WeatherSummary {
    fn from(weather: &CurrentWeather) -> Self {
        Self {
            temp: weather.main.temp,
            humidity: weather.main.humidity,
            condition: weather.condition_main().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropAdvice {
    pub recommendations: Vec<Recommendation>,
    pub weather: WeatherSummary,
}

pub struct CropAdvisor {
    weather: WeatherProvider,
    recommendations: RecommendationClient,
}

impl CropAdvisor {
    pub fn new(weather: WeatherProvider, recommendations: RecommendationClient) -> Self {
        Self {
            weather,
            recommendations,
        }
    }

    /// Validate the user's selections, then produce advice for them.
    pub async fn advise(
        &self,
        state: &str,
        city: &str,
        soil: &str,
    ) -> Result<CropAdvice, ServiceError> {
        let soil = validate_selection(state, city, soil)?;
        let location = Location::new(state, city)
            .map_err(|e| RecommendationError::InvalidInput(e.to_string()))?;
        self.advise_at(&location, soil).await
    }

    #[instrument(skip(self), fields(location = %location), level = "info")]
    pub async fn advise_at(
        &self,
        location: &Location,
        soil: &str,
    ) -> Result<CropAdvice, ServiceError> {
        if !SOIL_TYPES.iter().any(|s| s.eq_ignore_ascii_case(soil)) {
            tracing::warn!("Soil type '{}' is not one of the offered types", soil);
        }

        let coords = self.weather.geocode(location).await?;
        let current = self.weather.current(coords).await?;
        let recommendations = self
            .recommendations
            .recommend(location.city(), soil)
            .await?;

        Ok(assemble(recommendations, &current, soil))
    }
}

/// Returns the trimmed soil type once every field is present.
fn validate_selection<'a>(
    state: &str,
    city: &str,
    soil: &'a str,
) -> Result<&'a str, RecommendationError> {
    if state.trim().is_empty() {
        return Err(RecommendationError::InvalidInput(
            "Please select a state".to_string(),
        ));
    }
    if city.trim().is_empty() {
        return Err(RecommendationError::InvalidInput(
            "Please select a city".to_string(),
        ));
    }
    let soil = soil.trim();
    if soil.is_empty() {
        return Err(RecommendationError::InvalidInput(
            "Please select a soil type".to_string(),
        ));
    }
    Ok(soil)
}

fn assemble(
    recommendations: Vec<Recommendation>,
    current: &CurrentWeather,
    soil: &str,
) -> CropAdvice {
    let weather = WeatherSummary::from(current);

    let recommendations = if recommendations.is_empty() {
        vec![Recommendation {
            crop: NO_SPECIFIC_CROP.to_string(),
            advice: NO_MATCH_ADVICE.to_string(),
            conditions: None,
        }]
    } else {
        recommendations
            .into_iter()
            .map(|mut rec| {
                if rec.conditions.is_none() {
                    rec.conditions = Some(GrowingConditions {
                        weather: Some(weather.condition.clone()),
                        temperature: Some(format!("{}°C", weather.temp)),
                        soil: Some(soil.to_string()),
                    });
                }
                rec
            })
            .collect()
    };

    CropAdvice {
        recommendations,
        weather,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current(temp: f64, main: &str) -> CurrentWeather {
        serde_json::from_value(serde_json::json!({
            "dt": 1768456800,
            "main": {
                "temp": temp, "feels_like": temp, "humidity": 55,
                "pressure": 1010, "temp_min": temp, "temp_max": temp
            },
            "weather": [{"id": 800, "main": main, "description": "clear sky", "icon": "01d"}],
            "wind": {"speed": 1.0}
        }))
        .unwrap()
    }

    #[test]
    fn test_validation_messages() {
        let msg = |r: Result<&str, RecommendationError>| r.unwrap_err().user_message();
        assert_eq!(msg(validate_selection("", "Surat", "Clay")), "Please select a state");
        assert_eq!(msg(validate_selection("Gujarat", " ", "Clay")), "Please select a city");
        assert_eq!(msg(validate_selection("Gujarat", "Surat", "")), "Please select a soil type");
        assert_eq!(validate_selection("Gujarat", "Surat", " Clay ").unwrap(), "Clay");
    }

    #[test]
    fn test_empty_list_gets_fallback_entry() {
        let advice = assemble(Vec::new(), &current(28.0, "Clear"), "Loamy");
        assert_eq!(advice.recommendations.len(), 1);
        assert_eq!(advice.recommendations[0].crop, NO_SPECIFIC_CROP);
        assert_eq!(advice.weather.condition, "Clear");
        assert_eq!(advice.weather.humidity, 55.0);
    }

    #[test]
    fn test_missing_conditions_are_filled() {
        let recs = vec![
            Recommendation {
                crop: "Wheat".into(),
                advice: "Moderate watering.".into(),
                conditions: None,
            },
            Recommendation {
                crop: "Rice".into(),
                advice: "Flooded fields.".into(),
                conditions: Some(GrowingConditions {
                    weather: Some("Rain".into()),
                    ..GrowingConditions::default()
                }),
            },
        ];

        let advice = assemble(recs, &current(24.5, "Clear"), "Loamy");
        assert_eq!(
            advice.recommendations[0].conditions,
            Some(GrowingConditions {
                weather: Some("Clear".into()),
                temperature: Some("24.5°C".into()),
                soil: Some("Loamy".into()),
            })
        );
        assert_eq!(
            advice.recommendations[1]
                .conditions
                .as_ref()
                .unwrap()
                .weather
                .as_deref(),
            Some("Rain")
        );
    }
}
