//! `confirm <text>`: posts a prompt and waits for someone to react with ✅.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use hexbot::core::{Colors, Embed, Emoji};
use hexbot::framework::{Command, CommandDescriptor, CommandResult, InvocationContext, Watcher};

pub const CONFIRM_EMOJI: &str = "✅";

/// `[commands.confirm]` settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmSettings {
    /// Overrides the reactor's default watcher lifetime.
    #[serde(default)]
    pub expires_in_secs: Option<u64>,
}

/// The `confirm` command.
#[derive(Debug, Default)]
pub struct Confirm {
    expires_in: Option<Duration>,
}

impl Confirm {
    pub fn new(settings: ConfirmSettings) -> Self {
        Self {
            expires_in: settings.expires_in_secs.map(Duration::from_secs),
        }
    }
}

#[async_trait]
impl Command for Confirm {
    fn descriptor(&self) -> CommandDescriptor {
        CommandDescriptor::new("confirm", "Asks the channel to confirm something")
            .rate_limit(3, Duration::from_secs(60))
    }

    async fn handle(&self, ctx: &InvocationContext) -> CommandResult<()> {
        let text = ctx.rest(0);
        if text.is_empty() {
            ctx.send(format!("Usage: `{}confirm <text>`", ctx.prefix()))
                .await?;
            return Ok(());
        }

        let prompt = Embed::new()
            .title("Confirmation requested")
            .description(text.as_str())
            .color(Colors::WARNING)
            .footer(format!("React with {CONFIRM_EMOJI} to confirm"));
        let prompt_id = ctx.send_embed(prompt).await?;
        ctx.react(&prompt_id, &Emoji::unicode(CONFIRM_EMOJI)).await?;

        let mut watcher = Watcher::new(CONFIRM_EMOJI, move |reaction| {
            let text = text.clone();
            async move {
                // One-shot.
                if !reaction.unwatch_self() {
                    return Ok(());
                }
                reaction
                    .send(format!("<@{}> confirmed: {text}", reaction.user_id()))
                    .await?;
                Ok(())
            }
        });
        if let Some(ttl) = self.expires_in {
            watcher = watcher.expires_in(ttl);
        }

        debug!(message = %prompt_id, "Watching confirmation prompt");
        ctx.watch(prompt_id, [watcher]);
        Ok(())
    }
}
