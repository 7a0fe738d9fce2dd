//! The context handed to a command handler.

use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::trace;

use hexbot_core::{
    ChannelId, Embed, Emoji, GuildId, MessageEvent, MessageId, OutboundMessage, RoleId,
    SharedGateway, UserId,
};

use crate::error::CommandResult;
use crate::parse::Invocation;
use crate::reactor::{WatchRegistry, Watcher, WatcherId};

/// Everything a handler knows about one invocation, plus the capabilities it
/// may use: sending through the gateway and registering reaction watchers.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct InvocationContext {
    command: String,
    args: Vec<String>,
    prefix: Arc<str>,
    message: Arc<MessageEvent>,
    gateway: SharedGateway,
    reactor: Arc<WatchRegistry>,
}

impl InvocationContext {
    pub(crate) fn new(
        invocation: Invocation,
        prefix: Arc<str>,
        message: Arc<MessageEvent>,
        gateway: SharedGateway,
        reactor: Arc<WatchRegistry>,
    ) -> Self {
        Self {
            command: invocation.name,
            args: invocation.args,
            prefix,
            message,
            gateway,
            reactor,
        }
    }

    /// The command name as typed.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Arguments from `index` on, joined by single spaces.
    pub fn rest(&self, index: usize) -> String {
        self.args.get(index..).map(|a| a.join(" ")).unwrap_or_default()
    }

    /// The command prefix in effect.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The message that triggered the invocation.
    pub fn message(&self) -> &MessageEvent {
        &self.message
    }

    pub fn user_id(&self) -> &UserId {
        &self.message.author_id
    }

    pub fn user_roles(&self) -> &[RoleId] {
        &self.message.author_roles
    }

    /// Returns `true` if the invoking user holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.message.author_roles.iter().any(|r| r.as_str() == role)
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.message.channel_id
    }

    pub fn guild_id(&self) -> Option<&GuildId> {
        self.message.guild_id.as_ref()
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message.message_id
    }

    pub fn received_at(&self) -> Instant {
        self.message.received_at
    }

    pub fn gateway(&self) -> &SharedGateway {
        &self.gateway
    }

    pub fn reactor(&self) -> &Arc<WatchRegistry> {
        &self.reactor
    }

    /// Sends a message to the invoking channel.
    pub async fn send(&self, message: impl Into<OutboundMessage>) -> CommandResult<MessageId> {
        Ok(self.gateway.send(self.channel_id(), message.into()).await?)
    }

    /// Sends an embed to the invoking channel.
    pub async fn send_embed(&self, embed: Embed) -> CommandResult<MessageId> {
        self.send(embed).await
    }

    /// Sends a message to the invoking channel mentioning the invoking user.
    pub async fn reply(&self, text: impl AsRef<str>) -> CommandResult<MessageId> {
        self.send(format!("<@{}> {}", self.user_id(), text.as_ref()))
            .await
    }

    /// Adds a reaction from the bot to a message in the invoking channel.
    pub async fn react(&self, message: &MessageId, emoji: &Emoji) -> CommandResult<()> {
        Ok(self
            .gateway
            .add_reaction(self.channel_id(), message, emoji)
            .await?)
    }

    /// Shows a typing indicator. Failures are ignored.
    pub async fn typing(&self) {
        if let Err(e) = self.gateway.typing(self.channel_id()).await {
            trace!(error = %e, "Typing indicator failed");
        }
    }

    /// Registers reaction watchers on `message`.
    ///
    /// Relative and default lifetimes are measured from the instant the
    /// invoking message was received.
    pub fn watch<I>(&self, message: impl Into<MessageId>, watchers: I) -> Vec<WatcherId>
    where
        I: IntoIterator<Item = Watcher>,
    {
        self.reactor.watch_at(message, watchers, self.received_at())
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("user", &self.message.author_id)
            .field("channel", &self.message.channel_id)
            .field("gateway", &self.gateway.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use hexbot_core::testing::RecordingGateway;

    use super::*;
    use crate::reactor::ReactorConfig;

    fn context(gateway: SharedGateway, content: &str) -> InvocationContext {
        let mut tokens = content.split_whitespace().map(str::to_string);
        let invocation = Invocation {
            name: tokens.next().unwrap(),
            args: tokens.collect(),
        };
        let message = MessageEvent::new("m1", "general", "alice", content).with_roles(["member"]);
        InvocationContext::new(
            invocation,
            Arc::from("!"),
            Arc::new(message),
            gateway,
            Arc::new(WatchRegistry::new(ReactorConfig::default())),
        )
    }

    #[test]
    fn test_argument_accessors() {
        let ctx = context(RecordingGateway::new(), "tip add be kind");
        assert_eq!(ctx.command(), "tip");
        assert_eq!(ctx.arg(0), Some("add"));
        assert_eq!(ctx.arg(9), None);
        assert_eq!(ctx.rest(1), "be kind");
        assert_eq!(ctx.rest(9), "");
        assert!(ctx.has_role("member"));
        assert!(!ctx.has_role("moderator"));
    }

    #[tokio::test]
    async fn test_send_goes_to_invoking_channel() {
        let gateway = RecordingGateway::new();
        let ctx = context(gateway.clone(), "ping");

        ctx.send("Pong!").await.unwrap();
        ctx.reply("hi").await.unwrap();

        assert_eq!(gateway.sent_to("general").len(), 2);
        assert_eq!(gateway.texts(), vec!["Pong!", "<@alice> hi"]);
    }
}
