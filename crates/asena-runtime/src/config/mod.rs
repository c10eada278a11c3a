//! Configuration for the asena runtime.
//!
//! Layered loading (defaults, TOML files, `ASENA_*` environment, overrides)
//! plus validation of the merged result.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, ENV_PREFIX, Profile, load_config, load_config_from_file};
pub use schema::{
    AsenaConfig, BotSettings, ConnectionConfig, GreetingsConfig, LogFormat, LogLevel, LogOutput,
    LogRotation, LoggingConfig, SpanEventConfig, StorageConfig,
};
pub use validation::validate_config;
