//! Inbound gateway events.
//!
//! The gateway adapter turns whatever the platform delivers into one of the
//! [`GatewayEvent`] variants. Every event is stamped with the instant it was
//! received; the dispatch core measures rate-limit windows and watcher
//! expiration against that stamp rather than against wall-clock time.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::id::{ChannelId, GuildId, MessageId, RoleId, UserId};

/// An event delivered by the gateway adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// A text message was posted.
    Message(MessageEvent),
    /// A reaction was added to a message.
    ReactionAdd(ReactionAddEvent),
}

impl GatewayEvent {
    /// Returns a short static name for tracing.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::ReactionAdd(_) => "reaction_add",
        }
    }
}

impl From<MessageEvent> for GatewayEvent {
    fn from(event: MessageEvent) -> Self {
        Self::Message(event)
    }
}

impl From<ReactionAddEvent> for GatewayEvent {
    fn from(event: ReactionAddEvent) -> Self {
        Self::ReactionAdd(event)
    }
}

// ============================================================================
// Message events
// ============================================================================

/// A text message posted to a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    /// `None` for direct messages.
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    pub author_id: UserId,
    /// Roles the author holds in the guild the message was posted in.
    #[serde(default)]
    pub author_roles: Vec<RoleId>,
    #[serde(default)]
    pub author_is_bot: bool,
    pub content: String,
    #[serde(skip, default = "Instant::now")]
    pub received_at: Instant,
}

impl MessageEvent {
    /// Creates a guild-less message from a human author, received now.
    pub fn new(
        message_id: impl Into<MessageId>,
        channel_id: impl Into<ChannelId>,
        author_id: impl Into<UserId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            channel_id: channel_id.into(),
            guild_id: None,
            author_id: author_id.into(),
            author_roles: Vec::new(),
            author_is_bot: false,
            content: content.into(),
            received_at: Instant::now(),
        }
    }

    /// Sets the guild the message was posted in.
    pub fn in_guild(mut self, guild_id: impl Into<GuildId>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    /// Sets the author's roles.
    pub fn with_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleId>,
    {
        self.author_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the author as a bot account.
    pub fn from_bot(mut self) -> Self {
        self.author_is_bot = true;
        self
    }

    /// Overrides the receive instant.
    pub fn received_at(mut self, instant: Instant) -> Self {
        self.received_at = instant;
        self
    }
}

// ============================================================================
// Reaction events
// ============================================================================

/// An emoji, either a unicode character or a custom guild emoji.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Emoji {
    /// The unicode character(s), or the custom emoji's name.
    pub name: String,
    /// Custom emoji id; `None` for unicode emoji.
    #[serde(default)]
    pub id: Option<String>,
}

impl Emoji {
    /// Creates a unicode emoji.
    pub fn unicode(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }

    /// Creates a custom emoji.
    pub fn custom(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Some(id.into()),
        }
    }

    /// The `name:id` form used by platform APIs for custom emoji, or just the
    /// name for unicode emoji.
    pub fn api_name(&self) -> String {
        match &self.id {
            Some(id) => format!("{}:{}", self.name, id),
            None => self.name.clone(),
        }
    }

    /// Returns `true` if `trigger` names this emoji, by bare name or by
    /// `name:id`.
    pub fn matches(&self, trigger: &str) -> bool {
        if self.name == trigger {
            return true;
        }
        match &self.id {
            Some(id) => trigger
                .split_once(':')
                .is_some_and(|(name, tid)| name == self.name && tid == id),
            None => false,
        }
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.api_name())
    }
}

impl From<&str> for Emoji {
    fn from(name: &str) -> Self {
        Self::unicode(name)
    }
}

/// A reaction was added to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionAddEvent {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    pub user_id: UserId,
    #[serde(default)]
    pub user_is_bot: bool,
    pub emoji: Emoji,
    #[serde(skip, default = "Instant::now")]
    pub received_at: Instant,
}

impl ReactionAddEvent {
    /// Creates a reaction event from a human user, received now.
    pub fn new(
        message_id: impl Into<MessageId>,
        channel_id: impl Into<ChannelId>,
        user_id: impl Into<UserId>,
        emoji: impl Into<Emoji>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            channel_id: channel_id.into(),
            guild_id: None,
            user_id: user_id.into(),
            user_is_bot: false,
            emoji: emoji.into(),
            received_at: Instant::now(),
        }
    }

    /// Marks the reacting user as a bot account.
    pub fn from_bot(mut self) -> Self {
        self.user_is_bot = true;
        self
    }

    /// Overrides the receive instant.
    pub fn received_at(mut self, instant: Instant) -> Self {
        self.received_at = instant;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emoji_matches_unicode() {
        let emoji = Emoji::unicode("✅");
        assert!(emoji.matches("✅"));
        assert!(!emoji.matches("❌"));
    }

    #[test]
    fn test_emoji_matches_custom() {
        let emoji = Emoji::custom("party", "42");
        assert!(emoji.matches("party"));
        assert!(emoji.matches("party:42"));
        assert!(!emoji.matches("party:43"));
        assert_eq!(emoji.api_name(), "party:42");
    }

    #[test]
    fn test_gateway_event_from_json() {
        let json = r#"{
            "type": "message",
            "message_id": "1",
            "channel_id": "general",
            "author_id": "alice",
            "author_roles": ["moderator"],
            "content": "!ping"
        }"#;
        let event: GatewayEvent = serde_json::from_str(json).unwrap();
        let GatewayEvent::Message(msg) = event else {
            panic!("expected message event");
        };
        assert_eq!(msg.content, "!ping");
        assert_eq!(msg.author_roles, vec![RoleId::from("moderator")]);
        assert!(!msg.author_is_bot);
        assert!(msg.guild_id.is_none());
    }

    #[test]
    fn test_reaction_event_from_json() {
        let json = r#"{
            "type": "reaction_add",
            "message_id": "123",
            "channel_id": "general",
            "user_id": "bob",
            "emoji": {"name": "✅"}
        }"#;
        let event: GatewayEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_name(), "reaction_add");
    }
}
