//! A gateway that speaks JSON lines over stdin and stdout.
//!
//! Each stdin line is one [`GatewayEvent`]:
//!
//! ```text
//! {"type":"message","message_id":"1","channel_id":"general","author_id":"alice","content":"!ping"}
//! {"type":"reaction_add","message_id":"out-1","channel_id":"general","user_id":"bob","emoji":{"name":"✅"}}
//! ```
//!
//! Everything the bot does is printed to stdout as a [`ConsoleAction`] line.
//! Logs go to stderr so the two streams stay separate.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::Stream;
use hexbot::core::{
    ChannelId, Emoji, Gateway, GatewayError, GatewayEvent, GatewayResult, MessageId,
    OutboundMessage,
};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::Mutex;
use tracing::{error, warn};

/// One line of bot output.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ConsoleAction<'a> {
    Send {
        channel_id: &'a ChannelId,
        message_id: &'a MessageId,
        message: &'a OutboundMessage,
    },
    React {
        channel_id: &'a ChannelId,
        message_id: &'a MessageId,
        emoji: &'a Emoji,
    },
    Typing {
        channel_id: &'a ChannelId,
    },
}

/// Prints outbound traffic to stdout and hands out sequential message ids.
pub struct ConsoleGateway {
    stdout: Mutex<Stdout>,
    next_id: AtomicU64,
}

impl ConsoleGateway {
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_message_id(&self) -> MessageId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        MessageId::from(format!("out-{n}"))
    }

    async fn emit(&self, action: ConsoleAction<'_>) -> GatewayResult<()> {
        let mut line =
            serde_json::to_string(&action).map_err(|e| GatewayError::SendFailed(e.to_string()))?;
        line.push('\n');

        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|e| GatewayError::Io(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| GatewayError::Io(e.to_string()))
    }
}

impl Default for ConsoleGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for ConsoleGateway {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(
        &self,
        channel: &ChannelId,
        message: OutboundMessage,
    ) -> GatewayResult<MessageId> {
        let id = self.next_message_id();
        self.emit(ConsoleAction::Send {
            channel_id: channel,
            message_id: &id,
            message: &message,
        })
        .await?;
        Ok(id)
    }

    async fn add_reaction(
        &self,
        channel: &ChannelId,
        message: &MessageId,
        emoji: &Emoji,
    ) -> GatewayResult<()> {
        self.emit(ConsoleAction::React {
            channel_id: channel,
            message_id: message,
            emoji,
        })
        .await
    }

    async fn typing(&self, channel: &ChannelId) -> GatewayResult<()> {
        self.emit(ConsoleAction::Typing { channel_id: channel })
            .await
    }
}

/// Reads gateway events from stdin until EOF.
///
/// Blank lines are skipped and malformed lines are logged and skipped.
pub fn stdin_events() -> impl Stream<Item = GatewayEvent> {
    let lines = BufReader::new(tokio::io::stdin()).lines();
    futures::stream::unfold(lines, |mut lines| async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<GatewayEvent>(line) {
                        Ok(event) => return Some((event, lines)),
                        Err(e) => warn!(error = %e, "Skipping malformed event line"),
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    error!(error = %e, "Failed to read stdin");
                    return None;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_action_shape() {
        let channel = ChannelId::from("general");
        let id = MessageId::from("out-1");
        let message = OutboundMessage::from("Pong!");
        let json = serde_json::to_value(ConsoleAction::Send {
            channel_id: &channel,
            message_id: &id,
            message: &message,
        })
        .unwrap();

        assert_eq!(json["action"], "send");
        assert_eq!(json["channel_id"], "general");
        assert_eq!(json["message_id"], "out-1");
        assert_eq!(json["message"]["kind"], "text");
        assert_eq!(json["message"]["body"], "Pong!");
    }

    #[test]
    fn test_sequential_ids() {
        let gateway = ConsoleGateway::new();
        assert_eq!(gateway.next_message_id(), MessageId::from("out-1"));
        assert_eq!(gateway.next_message_id(), MessageId::from("out-2"));
    }
}
