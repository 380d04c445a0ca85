pub mod app;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;

pub use app::App;
pub use config::{BackendConfig, BackendMethod, ChatConfig, Config, WeatherConfig};
pub use error::{
    AppError, ConfigError, NetworkError, RecommendationError, ReqwestErrorExt, StorageError,
    WeatherError,
};
pub use session::{InvalidLocation, Language, Location, Preferences, Session, UnknownLanguage};
pub use storage::{FileStore, KeyValueStore, MemoryStore};

use anyhow::Result;

/// Initialize logging
///
/// `RUST_LOG` overrides `default_filter`.
pub fn init(default_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::debug!("Kisan core initialized");
    Ok(())
}
