//! # hexbot Framework
//!
//! The event-dispatch core of a chat bot.
//!
//! This layer provides:
//! - [`Router`]: turns messages into command invocations, with permission
//!   checks, rate limiting, a built-in `help`, and contained failures
//! - [`CommandRegistry`] and the [`Command`] trait
//! - [`PermissionStore`]: role requirements with configuration overrides
//! - [`RateLimiter`]: fixed-window per-user, per-command limits
//! - [`WatchRegistry`]: expiring reaction watchers keyed by message id
//!
//! Nothing here talks to a platform directly; everything outbound goes
//! through the [`Gateway`](hexbot_core::Gateway) the router is built with.

pub mod command;
pub mod context;
pub mod error;
pub mod parse;
pub mod permissions;
pub mod ratelimit;
pub mod reactor;
pub mod registry;
pub mod router;

pub use command::{BoxedCommand, Command, CommandDescriptor, FnCommand, RateLimitPolicy, command_fn};
pub use context::InvocationContext;
pub use error::{CommandError, CommandResult, DispatchError, RegistryError, retry_secs};
pub use parse::{Invocation, Parsed, parse_invocation};
pub use permissions::PermissionStore;
pub use ratelimit::{Cooldown, RateLimiter};
pub use reactor::{
    ReactionContext, ReactorConfig, WatchRegistry, Watcher, WatcherCallback, WatcherId,
    WatcherInfo,
};
pub use registry::{CommandRegistry, HELP_COMMAND, RegisteredCommand};
pub use router::{DEFAULT_PREFIX, DispatchOutcome, Router, RouterConfig};
