//! Rich embeds.
//!
//! An [`Embed`] is the structured message card most chat platforms support:
//! a title, a description, a grid of fields, a color bar and a footer.
//! Built with chained setters:
//!
//! ```rust
//! use hexbot_core::{Colors, Embed};
//!
//! let embed = Embed::new()
//!     .title("Pong!")
//!     .color(Colors::PRIMARY)
//!     .field("Latency", "12ms", true);
//! assert_eq!(embed.fields.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

/// Color palette shared by every embed the bot sends.
pub struct Colors;

impl Colors {
    pub const PRIMARY: u32 = 0x004080;
    pub const SUCCESS: u32 = 0x13FF03;
    pub const WARNING: u32 = 0xFFD700;
    pub const ERROR: u32 = 0xFF0000;
}

/// A single name/value cell of an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// The author line shown above the title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

/// A structured message card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    /// Appends a field. Fields render in insertion order.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(text.into());
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }

    pub fn author(mut self, name: impl Into<String>, icon_url: Option<String>) -> Self {
        self.author = Some(EmbedAuthor {
            name: name.into(),
            icon_url,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_builder() {
        let embed = Embed::new()
            .title("Report")
            .description("Current season stats.")
            .color(Colors::ERROR)
            .field("Level", "42", true)
            .field("Rank", "Gold", true)
            .footer("updated just now");

        assert_eq!(embed.title.as_deref(), Some("Report"));
        assert_eq!(embed.color, Some(0xFF0000));
        assert_eq!(embed.fields[1].name, "Rank");
        assert!(embed.fields[0].inline);
    }

    #[test]
    fn test_embed_skips_empty_fields_when_serialized() {
        let json = serde_json::to_value(Embed::new().title("t")).unwrap();
        assert_eq!(json, serde_json::json!({"title": "t"}));
    }
}
