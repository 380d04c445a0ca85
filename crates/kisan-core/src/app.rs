use anyhow::Result;
use std::sync::Arc;

use crate::storage::{FileStore, KeyValueStore};
use crate::{Config, Preferences, Session};

/// Application state: loaded configuration plus the user's session.
pub struct App {
    config: Arc<Config>,
    session: Session,
}

impl App {
    /// Load config from disk and open the preferences file next to it
    pub fn new() -> Result<Self> {
        let (config, _warnings) = Config::load_validated()?;
        let store = FileStore::in_dir(&config.config_dir);
        Self::with_store(config, Arc::new(store))
    }

    /// Build an app around an explicit config and preference store
    pub fn with_store(config: Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let seed = config.weather.default_location();
        let session = Session::load_or_seed(Preferences::new(store), seed)?;

        tracing::info!(
            "Application initialized (config dir: {})",
            config.config_dir.display()
        );

        Ok(Self {
            config: Arc::new(config),
            session,
        })
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::{Language, Location};

    #[test]
    fn test_app_with_memory_store() {
        let store = Arc::new(MemoryStore::new());
        let mut app = App::with_store(Config::default(), store.clone()).unwrap();
        assert_eq!(app.session().language(), Language::Hi);

        app.session_mut()
            .select_location(Location::new("Maharashtra", "Pune").unwrap())
            .unwrap();

        let app = App::with_store(Config::default(), store).unwrap();
        assert_eq!(app.session().location().map(|l| l.city()), Some("Pune"));
    }

    #[test]
    fn test_first_start_preselects_default_location() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::in_dir(dir.path()));
        let app = App::with_store(Config::default(), store).unwrap();
        assert_eq!(
            app.session().location(),
            Some(&Location::new("Gujarat", "Ahmedabad").unwrap())
        );

        let mut config = Config::default();
        config.weather.default_state = String::new();
        let app = App::with_store(config, Arc::new(MemoryStore::new())).unwrap();
        assert!(app.session().location().is_none());
    }
}
