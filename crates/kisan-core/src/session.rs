//! User session state: the selected location and display language.
//!
//! Both are persisted through a [`KeyValueStore`] and only change through an
//! explicit selection.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage::KeyValueStore;

pub const LOCATION_KEY: &str = "userLocation";
pub const LANGUAGE_KEY: &str = "language";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Both state and city are required")]
pub struct InvalidLocation;

/// A selected state/city pair. Always has both parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LocationParts")]
pub struct Location {
    state: String,
    city: String,
}

#[derive(Deserialize)]
struct LocationParts {
    state: Option<String>,
    city: Option<String>,
}

impl TryFrom<LocationParts> for Location {
    type Error = InvalidLocation;

    fn try_from(parts: LocationParts) -> Result<Self, Self::Error> {
        match (parts.state, parts.city) {
            (Some(state), Some(city)) => Location::new(state, city),
            _ => Err(InvalidLocation),
        }
    }
}

impl Location {
    pub fn new(state: impl Into<String>, city: impl Into<String>) -> Result<Self, InvalidLocation> {
        let state = state.into().trim().to_string();
        let city = city.into().trim().to_string();
        if state.is_empty() || city.is_empty() {
            return Err(InvalidLocation);
        }
        Ok(Self { state, city })
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn city(&self) -> &str {
        &self.city
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.state)
    }
}

/// Supported display languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    #[default]
    Hi,
    Gu,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported language code: {0}")]
pub struct UnknownLanguage(pub String);

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Hi, Language::Gu];

    pub fn code(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Hi => "hi",
            Self::Gu => "gu",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Hi => "Hindi",
            Self::Gu => "Gujarati",
        }
    }

    pub fn native_name(&self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Hi => "हिंदी",
            Self::Gu => "ગુજરાતી",
        }
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Typed access to the persisted preference entries.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The stored location. A partial or unreadable entry reads as unset.
    pub fn location(&self) -> Result<Option<Location>, StorageError> {
        let Some(raw) = self.store.get(LOCATION_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str::<Location>(&raw) {
            Ok(location) => Ok(Some(location)),
            Err(e) => {
                tracing::warn!("Ignoring invalid saved location: {}", e);
                Ok(None)
            }
        }
    }

    /// Persist `location`. Returns `false` when it was already stored.
    pub fn set_location(&self, location: &Location) -> Result<bool, StorageError> {
        if self.location()?.as_ref() == Some(location) {
            return Ok(false);
        }

        let json =
            serde_json::to_string(location).map_err(|e| StorageError::Write(e.to_string()))?;
        self.store.set(LOCATION_KEY, &json)?;
        tracing::info!("Saved location: {}", location);
        Ok(true)
    }

    pub fn clear_location(&self) -> Result<(), StorageError> {
        self.store.remove(LOCATION_KEY)
    }

    /// The stored language, or the default when unset or unrecognised.
    pub fn language(&self) -> Result<Language, StorageError> {
        let stored = self.store.get(LANGUAGE_KEY)?;
        Ok(stored
            .and_then(|code| match code.parse::<Language>() {
                Ok(lang) => Some(lang),
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            })
            .unwrap_or_default())
    }

    /// Persist `language`. Returns `false` when it was already stored.
    pub fn set_language(&self, language: Language) -> Result<bool, StorageError> {
        if self.store.get(LANGUAGE_KEY)?.as_deref() == Some(language.code()) {
            return Ok(false);
        }
        self.store.set(LANGUAGE_KEY, language.code())?;
        tracing::info!("Saved language: {}", language.name());
        Ok(true)
    }

    /// Remove both entries so the next load uses defaults.
    pub fn reset(&self) -> Result<(), StorageError> {
        self.store.remove(LOCATION_KEY)?;
        self.store.remove(LANGUAGE_KEY)
    }
}

/// Top-level session state, loaded from preferences at startup.
pub struct Session {
    prefs: Preferences,
    location: Option<Location>,
    language: Language,
}

impl Session {
    pub fn load(prefs: Preferences) -> Result<Self, StorageError> {
        let location = prefs.location()?;
        let language = prefs.language()?;
        tracing::debug!(
            "Session loaded (location: {:?}, language: {})",
            location,
            language
        );
        Ok(Self {
            prefs,
            location,
            language,
        })
    }

    /// Load, selecting `seed` when no location has been saved yet.
    pub fn load_or_seed(
        prefs: Preferences,
        seed: Option<Location>,
    ) -> Result<Self, StorageError> {
        let mut session = Self::load(prefs)?;
        if session.location.is_none() {
            if let Some(seed) = seed {
                tracing::info!("No saved location, selecting {}", seed);
                session.select_location(seed)?;
            }
        }
        Ok(session)
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn select_location(&mut self, location: Location) -> Result<(), StorageError> {
        self.prefs.set_location(&location)?;
        self.location = Some(location);
        Ok(())
    }

    pub fn select_language(&mut self, language: Language) -> Result<(), StorageError> {
        self.prefs.set_language(language)?;
        self.language = language;
        Ok(())
    }

    pub fn clear_location(&mut self) -> Result<(), StorageError> {
        self.prefs.clear_location()?;
        self.location = None;
        Ok(())
    }

    /// Forget everything and fall back to defaults.
    pub fn reset(&mut self) -> Result<(), StorageError> {
        self.prefs.reset()?;
        self.location = None;
        self.language = Language::default();
        Ok(())
    }
}
