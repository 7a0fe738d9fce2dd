//! Error types for the hexbot framework.
//!
//! Three families:
//!
//! - [`CommandError`]: what a command handler (or reaction callback) returns.
//! - [`DispatchError`]: why the router did not run a handler to completion.
//!   Every variant knows how to phrase itself for the invoking user without
//!   leaking internals.
//! - [`RegistryError`]: configuration mistakes caught at registration time.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

use hexbot_core::{GatewayError, UserId};

/// Errors raised inside a command handler.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// A call to an external service failed. Handlers do not retry.
    #[error("{service} request failed: {reason}")]
    Upstream {
        /// The external service that failed.
        service: String,
        /// Reason for failure.
        reason: String,
    },

    /// Sending through the gateway failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The invocation's arguments could not be used.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Any other handler failure.
    #[error("{0}")]
    Internal(String),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl CommandError {
    /// Creates an upstream error.
    pub fn upstream(service: impl Into<String>, reason: impl ToString) -> Self {
        Self::Upstream {
            service: service.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Creates an invalid-arguments error.
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }
}

/// Result type for command handlers.
pub type CommandResult<T> = Result<T, CommandError>;

/// Reasons a message did not result in a successful handler run.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The message carried the prefix but no command name. Never reported.
    #[error("malformed command invocation")]
    Parse,

    /// No command is registered under this name.
    #[error("unknown command '{name}'")]
    UnknownCommand {
        /// The name the user typed.
        name: String,
    },

    /// The user holds none of the roles the command requires.
    #[error("user '{user}' is not authorized to run '{command}'")]
    Unauthorized {
        /// The command that was refused.
        command: String,
        /// The user that was refused.
        user: UserId,
    },

    /// The user exceeded the command's rate limit.
    #[error("'{command}' is rate limited for another {retry_after:?}")]
    RateLimited {
        /// The command that was refused.
        command: String,
        /// Time until the current window closes.
        retry_after: Duration,
    },

    /// The handler returned an error or panicked.
    #[error("command '{command}' failed: {source}")]
    Handler {
        /// The command that failed.
        command: String,
        /// The underlying handler error.
        #[source]
        source: CommandError,
    },
}

impl DispatchError {
    /// The notice shown to the invoking user, or `None` when the failure is
    /// silent.
    pub fn user_message(&self, prefix: &str) -> Option<String> {
        match self {
            Self::Parse => None,
            Self::UnknownCommand { name } => Some(format!(
                "Command not found: `{prefix}{name}`. Try `{prefix}help` for a list of commands."
            )),
            Self::Unauthorized { .. } => {
                Some("Sorry, you don't have permission to use that command.".to_string())
            }
            Self::RateLimited {
                command,
                retry_after,
            } => {
                let secs = retry_secs(*retry_after);
                let unit = if secs == 1 { "second" } else { "seconds" };
                Some(format!(
                    "Slow down! You can use `{prefix}{command}` again in {secs} {unit}."
                ))
            }
            Self::Handler { .. } => Some(
                "The bot seems to have encountered an issue while running that command. \
                 Please try again later."
                    .to_string(),
            ),
        }
    }

    /// Returns a short static label for tracing.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::UnknownCommand { .. } => "unknown_command",
            Self::Unauthorized { .. } => "unauthorized",
            Self::RateLimited { .. } => "rate_limited",
            Self::Handler { .. } => "handler",
        }
    }
}

/// Rounds a cooldown up to whole seconds, never below one.
pub fn retry_secs(retry_after: Duration) -> u64 {
    let secs = retry_after
        .as_secs()
        .saturating_add(u64::from(retry_after.subsec_nanos() > 0));
    secs.max(1)
}

/// Extracts the message from a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Errors raised while building the command registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Another command already uses this name.
    #[error("command '{0}' is already registered")]
    Duplicate(String),

    /// The command name is empty.
    #[error("command name must not be empty")]
    EmptyName,

    /// The command name contains whitespace and could never be typed.
    #[error("command name '{0}' must not contain whitespace")]
    InvalidName(String),

    /// The name belongs to a built-in command.
    #[error("command name '{0}' is reserved")]
    Reserved(String),
}
