//! The outbound half of the gateway adapter.
//!
//! Inbound events reach the bot as a stream of [`GatewayEvent`](crate::GatewayEvent)s;
//! everything the bot says goes back out through the [`Gateway`] trait.
//! Implementations wrap a platform client (or, in tests, a recorder).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{GatewayError, GatewayResult};
use crate::event::Emoji;
use crate::id::{ChannelId, MessageId};
use crate::message::OutboundMessage;

/// Send capability exposed by the gateway adapter.
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct StdoutGateway;
///
/// #[async_trait]
/// impl Gateway for StdoutGateway {
///     fn name(&self) -> &str {
///         "stdout"
///     }
///
///     async fn send(&self, channel: &ChannelId, message: OutboundMessage) -> GatewayResult<MessageId> {
///         println!("#{channel}: {message:?}");
///         Ok(MessageId::from("0"))
///     }
/// }
/// ```
#[async_trait]
pub trait Gateway: Send + Sync + 'static {
    /// Returns a short name for logging.
    fn name(&self) -> &str;

    /// Posts a message to a channel, returning the new message's id.
    async fn send(&self, channel: &ChannelId, message: OutboundMessage)
    -> GatewayResult<MessageId>;

    /// Adds a reaction from the bot account to a message.
    ///
    /// The default implementation reports the operation as unsupported.
    async fn add_reaction(
        &self,
        _channel: &ChannelId,
        _message: &MessageId,
        _emoji: &Emoji,
    ) -> GatewayResult<()> {
        Err(GatewayError::Unsupported {
            operation: "add_reaction",
        })
    }

    /// Shows a typing indicator in a channel. Best effort; defaults to a no-op.
    async fn typing(&self, _channel: &ChannelId) -> GatewayResult<()> {
        Ok(())
    }
}

/// A shared gateway handle.
pub type SharedGateway = Arc<dyn Gateway>;
