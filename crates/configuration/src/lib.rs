use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
#[cfg(feature = "clap")]
pub use settings::BacktestOverrides;
pub use settings::{
    Backtest, Config, Constraints, Health, Logging, MACrossoverParams, RsiReversionParams,
    ScriptedParams, Simulation, Strategies,
};

/// Loads the application configuration from a TOML file.
///
/// Environment variables prefixed with `ZENITH__` override file values, using
/// `__` between path segments (e.g. `ZENITH__BACKTEST__INITIAL_CAPITAL=50000`).
/// The result is validated before it is returned.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix("ZENITH")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;
    Ok(config)
}

/// Parses and validates a configuration held in memory.
pub fn parse_config(toml: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;
    Ok(config)
}
