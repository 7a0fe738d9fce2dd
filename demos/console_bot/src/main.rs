//! Console Bot Example
//!
//! Runs the hexbot dispatch core against a console gateway: gateway events
//! are read from stdin as JSON lines and everything the bot sends is printed
//! to stdout as JSON lines. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! cd demos/console_bot
//! echo '{"type":"message","message_id":"1","channel_id":"general","author_id":"alice","content":"!tip"}' \
//!     | cargo run --package console-bot
//! ```

mod commands;
mod gateway;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hexbot::prelude::*;
use hexbot::runtime::ConfigLoader;
use tracing::info;

use crate::commands::{Confirm, ConfirmSettings, Tip, TipSettings, TipSource, TipStore};
use crate::gateway::{ConsoleGateway, stdin_events};

#[derive(Debug, Parser)]
#[command(name = "console-bot", version, about = "hexbot over stdin and stdout")]
struct Cli {
    /// Configuration file (defaults to hexbot.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `development` or `production`
    #[arg(short, long)]
    profile: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new().with_current_dir().with_user_config_dir();
    if let Some(profile) = &cli.profile {
        loader = loader.profile(profile);
    }
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let tip_settings: TipSettings = config.command_settings("tip")?.unwrap_or_default();
    let tips = Arc::new(
        TipStore::new(
            TipSource::parse(tip_settings.source.as_deref()),
            config.network.timeout(),
        )
        .context("failed to build HTTP client")?,
    );
    let confirm_settings: ConfirmSettings =
        config.command_settings("confirm")?.unwrap_or_default();

    let gateway = Arc::new(ConsoleGateway::new());
    let runtime = BotRuntime::builder()
        .config(config)
        .command(commands::ping())
        .command(Tip::new(tips, tip_settings.editor_roles))
        .command(Confirm::new(confirm_settings))
        .build(gateway)?;

    info!("Reading events from stdin");
    runtime.run(stdin_events()).await?;

    Ok(())
}
