//! An in-memory [`Gateway`] for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{GatewayError, GatewayResult};
use crate::event::Emoji;
use crate::gateway::Gateway;
use crate::id::{ChannelId, MessageId};
use crate::message::OutboundMessage;

/// A message captured by [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: MessageId,
    pub channel: ChannelId,
    pub message: OutboundMessage,
}

/// Records every outbound call instead of talking to a platform.
///
/// Sent messages get sequential ids starting at `"sent-1"`. Call
/// [`fail_sends`](Self::fail_sends) to make every subsequent send fail.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentMessage>>,
    reactions: Mutex<Vec<(ChannelId, MessageId, Emoji)>>,
    next_id: AtomicU64,
    failing: AtomicBool,
}

impl RecordingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every subsequent send fail with [`GatewayError::SendFailed`].
    pub fn fail_sends(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Returns every message sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Returns the text of every plain-text message sent so far.
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| m.message.as_text().map(str::to_string))
            .collect()
    }

    /// Returns every message sent to `channel`.
    pub fn sent_to(&self, channel: &str) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.channel.as_str() == channel)
            .map(|m| m.message.clone())
            .collect()
    }

    /// Returns every reaction the bot added.
    pub fn reactions(&self) -> Vec<(ChannelId, MessageId, Emoji)> {
        self.reactions.lock().clone()
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(
        &self,
        channel: &ChannelId,
        message: OutboundMessage,
    ) -> GatewayResult<MessageId> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::SendFailed("recording gateway set to fail".into()));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = MessageId::new(format!("sent-{n}"));
        self.sent.lock().push(SentMessage {
            id: id.clone(),
            channel: channel.clone(),
            message,
        });
        Ok(id)
    }

    async fn add_reaction(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        emoji: &Emoji,
    ) -> GatewayResult<()> {
        self.reactions
            .lock()
            .push((channel.clone(), message.clone(), emoji.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_gateway_assigns_sequential_ids() {
        let gateway = RecordingGateway::new();
        let channel = ChannelId::from("general");

        let first = gateway.send(&channel, "one".into()).await.unwrap();
        let second = gateway.send(&channel, "two".into()).await.unwrap();

        assert_eq!(first.as_str(), "sent-1");
        assert_eq!(second.as_str(), "sent-2");
        assert_eq!(gateway.texts(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_recording_gateway_failure_mode() {
        let gateway = RecordingGateway::new();
        gateway.fail_sends();
        let result = gateway.send(&ChannelId::from("general"), "x".into()).await;
        assert!(matches!(result, Err(GatewayError::SendFailed(_))));
        assert!(gateway.sent().is_empty());
    }
}
