//! Configuration for the hexbot runtime.
//!
//! Settings are layered with figment and validated before the runtime
//! starts. See [`loader`] for the source order and [`schema`] for the keys.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, HexbotConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, NetworkConfig,
    ReactorSettings, SpanEventConfig,
};
pub use validation::validate_config;
