//! hexbot Runtime - configuration, logging and the event loop.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `HexbotConfig`)
//! - Logging setup (`LoggingBuilder`, `init_from_config`)
//! - The event loop (`BotRuntime`) with graceful shutdown and background
//!   housekeeping
//!
//! ```ignore
//! use hexbot_runtime::BotRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (gateway, events) = MyGateway::connect().await?;
//!
//!     let runtime = BotRuntime::builder()
//!         .command(Ping)
//!         .build(gateway)?;
//!
//!     // Run until Ctrl+C or the gateway closes
//!     runtime.run(events).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, HexbotConfig, Profile, load_config,
    load_config_from_file, validate_config,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents, init_from_config};
pub use runtime::{BotRuntime, DEFAULT_SHUTDOWN_GRACE, RuntimeBuilder};
