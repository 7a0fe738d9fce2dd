//! # hexbot Core
//!
//! Foundation types shared by every hexbot crate.
//!
//! - **Identifiers**: [`UserId`], [`ChannelId`], [`GuildId`], [`MessageId`], [`RoleId`]
//! - **Inbound events**: [`GatewayEvent`], [`MessageEvent`], [`ReactionAddEvent`]
//! - **Outbound messages**: [`OutboundMessage`], [`Embed`]
//! - **Send capability**: the [`Gateway`] trait implemented by platform adapters
//!
//! ```text
//! ┌─────────────┐  GatewayEvent   ┌──────────────┐
//! │   Gateway   │────────────────▶│ Router /     │
//! │   adapter   │◀────────────────│ WatchRegistry│
//! └─────────────┘  Gateway::send  └──────────────┘
//! ```

pub mod embed;
pub mod error;
pub mod event;
pub mod gateway;
pub mod id;
pub mod message;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use embed::{Colors, Embed, EmbedAuthor, EmbedField};
pub use error::{GatewayError, GatewayResult};
pub use event::{Emoji, GatewayEvent, MessageEvent, ReactionAddEvent};
pub use gateway::{Gateway, SharedGateway};
pub use id::{ChannelId, GuildId, MessageId, RoleId, UserId};
pub use message::OutboundMessage;

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        ChannelId, Embed, Emoji, Gateway, GatewayEvent, GuildId, MessageEvent, MessageId,
        OutboundMessage, ReactionAddEvent, RoleId, SharedGateway, UserId,
    };
}
