use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;
pub mod telemetry;

// Re-export the core types to provide a clean public API.
pub use settings::{
    DatabaseSettings, LoggingSettings, MarketDataSettings, ServerSettings, Settings, StorageBackend,
    StorageSettings, WorkerPoolSettings,
};
pub use telemetry::init_tracing;

/// The environment variable prefix for overrides, e.g. `MARKETLENS__SERVER__PORT=8080`.
pub const ENV_PREFIX: &str = "MARKETLENS";

/// Loads the application configuration.
///
/// Sources are layered, later ones winning:
/// 1. the built-in defaults of every settings struct,
/// 2. the TOML file at `path` (optional; a missing file is not an error),
/// 3. `MARKETLENS__<SECTION>__<KEY>` environment variables.
///
/// `DATABASE_URL` fills `database.url` when no other source set it. The result is
/// validated before it is returned.
pub fn load_config(path: &Path) -> Result<Settings, ConfigError> {
    load_config_with_overrides(path, &[])
}

/// Like `load_config`, with `(key, value)` pairs from the command line layered on top
/// of every other source, e.g. `("storage.backend", "memory")`.
pub fn load_config_with_overrides(path: &Path, overrides: &[(&str, &str)]) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );
    for (key, value) in overrides {
        builder = builder.set_override(*key, *value)?;
    }

    let mut settings = builder.build()?.try_deserialize::<Settings>()?;
    if settings.database.url.is_none() {
        settings.database.url = std::env::var("DATABASE_URL").ok();
    }

    settings.validate()?;
    Ok(settings)
}
