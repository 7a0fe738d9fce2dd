//! Outbound messages.

use serde::{Deserialize, Serialize};

use crate::embed::Embed;

/// Something the bot posts to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Plain text.
    Text(String),
    /// A structured embed.
    Embed(Embed),
}

impl OutboundMessage {
    /// Returns the text content, if this is a plain text message.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Embed(_) => None,
        }
    }

    /// Returns the embed, if this is an embed message.
    pub fn as_embed(&self) -> Option<&Embed> {
        match self {
            Self::Text(_) => None,
            Self::Embed(embed) => Some(embed),
        }
    }
}

impl From<&str> for OutboundMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for OutboundMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Embed> for OutboundMessage {
    fn from(embed: Embed) -> Self {
        Self::Embed(embed)
    }
}
