//! `ping`: liveness check.

use std::time::Duration;

use hexbot::framework::{Command, CommandDescriptor, command_fn};

pub fn ping() -> impl Command {
    command_fn(
        CommandDescriptor::new("ping", "Checks that the bot is alive")
            .rate_limit(5, Duration::from_secs(10)),
        |ctx| async move {
            ctx.send("Pong!").await?;
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use hexbot::core::MessageEvent;
    use hexbot::core::testing::RecordingGateway;
    use hexbot::framework::Router;

    use super::*;

    #[tokio::test]
    async fn test_ping_pongs() {
        let gateway = RecordingGateway::new();
        let router = Router::new(gateway.clone()).command(ping()).unwrap();

        let outcome = router
            .dispatch(MessageEvent::new("1", "general", "alice", "!ping"))
            .await;

        assert!(outcome.is_completed());
        assert_eq!(gateway.texts(), vec!["Pong!"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_is_rate_limited() {
        let gateway = RecordingGateway::new();
        let router = Router::new(gateway.clone()).command(ping()).unwrap();

        for _ in 0..5 {
            let outcome = router
                .dispatch(MessageEvent::new("1", "general", "alice", "!ping"))
                .await;
            assert!(outcome.is_completed());
        }
        let outcome = router
            .dispatch(MessageEvent::new("1", "general", "alice", "!ping"))
            .await;
        assert!(!outcome.is_completed());
        assert_eq!(gateway.texts().len(), 6);
    }
}
