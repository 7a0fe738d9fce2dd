//! # hexbot
//!
//! A command-dispatch core for chat bots.
//!
//! ## Overview
//!
//! hexbot turns a stream of gateway events into command invocations. A
//! message that starts with the configured prefix is parsed into a command
//! name and arguments, checked against the permission table and the
//! per-user rate limits, and handed to the registered handler. Handlers can
//! post a message and then watch it for reactions.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌────────────┐     ┌─────────┐     ┌───────────────┐
//! │  Gateway  │────▶│ BotRuntime │────▶│ Router  │────▶│ Command "tip" │──▶ Gateway::send
//! │ (adapter) │     │ (one task  │     │ parse   │────▶│ Command "..." │
//! └───────────┘     │ per event) │     │ permit  │     └───────────────┘
//!                   │            │     │ limit   │
//!                   │            │────▶│ Reactor │────▶ watcher callbacks
//!                   └────────────┘     └─────────┘
//! ```
//!
//! - **Gateway**: platform adapter; delivers events and sends messages
//! - **Router**: parses, authorizes, rate-limits and invokes commands
//! - **WatchRegistry**: routes reactions on watched messages to callbacks
//! - **BotRuntime**: configuration, logging, event loop, housekeeping
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hexbot::prelude::*;
//!
//! struct Ping;
//!
//! #[async_trait]
//! impl Command for Ping {
//!     fn descriptor(&self) -> CommandDescriptor {
//!         CommandDescriptor::new("ping", "Checks that the bot is alive")
//!     }
//!
//!     async fn handle(&self, ctx: &InvocationContext) -> CommandResult<()> {
//!         ctx.send("Pong!").await?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (gateway, events) = MyGateway::connect().await?;
//!     let runtime = BotRuntime::builder().command(Ping).build(gateway)?;
//!     runtime.run(events).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: load `hexbot.toml` (default)
//! - `yaml-config`: load `hexbot.yaml`
//! - `json-log`: JSON log output
//! - `testing`: the recording gateway used in tests

pub use hexbot_core as core;
pub use hexbot_framework as framework;
pub use hexbot_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use hexbot::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use hexbot_runtime::{BotRuntime, HexbotConfig, RuntimeBuilder, RuntimeError};

    // Commands
    pub use hexbot_framework::{
        BoxedCommand, Command, CommandDescriptor, CommandError, CommandResult,
        InvocationContext, command_fn,
    };

    // Reaction watchers
    pub use hexbot_framework::{ReactionContext, WatchRegistry, Watcher};

    // Dispatch
    pub use hexbot_framework::{DispatchError, DispatchOutcome, Router};

    // Gateway and event types
    pub use hexbot_core::prelude::*;
    pub use hexbot_core::{Colors, GatewayError, GatewayResult};

    // Re-exported so command impls don't need their own dependency
    pub use async_trait::async_trait;
}
