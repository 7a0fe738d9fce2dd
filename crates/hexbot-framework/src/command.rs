//! Command descriptors and the [`Command`] trait.
//!
//! A command is anything that can describe itself and handle an invocation.
//! Implement [`Command`] directly for commands that carry state, or wrap an
//! async closure with [`command_fn`] for the simple cases:
//!
//! ```rust,ignore
//! let ping = command_fn(
//!     CommandDescriptor::new("ping", "Checks that the bot is alive"),
//!     |ctx: InvocationContext| async move {
//!         ctx.send("Pong!").await?;
//!         Ok(())
//!     },
//! );
//! registry.register(ping)?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use hexbot_core::RoleId;

use crate::context::InvocationContext;
use crate::error::CommandResult;

// =============================================================================
// Rate-limit policy
// =============================================================================

/// How often a single user may invoke a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitPolicy {
    /// No limit.
    #[default]
    Unlimited,
    /// At most `max` invocations per `window`, counted from the first
    /// invocation in the window.
    PerWindow {
        /// Invocations allowed per window.
        max: u32,
        /// Window length.
        window: Duration,
    },
}

impl RateLimitPolicy {
    /// Creates a windowed policy. `max == 0` or a zero window means unlimited.
    pub fn per_window(max: u32, window: Duration) -> Self {
        if max == 0 || window.is_zero() {
            Self::Unlimited
        } else {
            Self::PerWindow { max, window }
        }
    }

    /// Returns `true` if this policy never rejects.
    pub fn is_unlimited(&self) -> bool {
        match self {
            Self::Unlimited => true,
            Self::PerWindow { max, window } => *max == 0 || window.is_zero(),
        }
    }
}

// =============================================================================
// Descriptor
// =============================================================================

/// Static description of a command: its name, help text, default role
/// requirement and rate limit.
///
/// Built once when the command is registered and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    name: String,
    help: String,
    required_roles: Vec<RoleId>,
    rate_limit: RateLimitPolicy,
}

impl CommandDescriptor {
    /// Creates a public, unlimited descriptor.
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            required_roles: Vec::new(),
            rate_limit: RateLimitPolicy::Unlimited,
        }
    }

    /// Adds a role that may run the command. Holding any one listed role is
    /// sufficient.
    pub fn require_role(mut self, role: impl Into<RoleId>) -> Self {
        self.required_roles.push(role.into());
        self
    }

    /// Adds several roles that may run the command.
    pub fn require_roles<I, R>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RoleId>,
    {
        self.required_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Limits each user to `max` invocations per `window`.
    pub fn rate_limit(mut self, max: u32, window: Duration) -> Self {
        self.rate_limit = RateLimitPolicy::per_window(max, window);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    /// Roles declared by the command itself. The permission table may
    /// override these; see [`PermissionStore`](crate::PermissionStore).
    pub fn required_roles(&self) -> &[RoleId] {
        &self.required_roles
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        self.rate_limit
    }
}

// =============================================================================
// Command trait
// =============================================================================

/// A chat command.
///
/// The router calls [`descriptor`](Command::descriptor) once at registration,
/// [`init`](Command::init) once at startup, then [`handle`](Command::handle)
/// for every authorized, non-rate-limited invocation.
#[async_trait]
pub trait Command: Send + Sync + 'static {
    /// Name, help text, default roles and rate limit.
    fn descriptor(&self) -> CommandDescriptor;

    /// Startup hook, run before the first event is dispatched.
    async fn init(&self) -> CommandResult<()> {
        Ok(())
    }

    /// Handles one invocation.
    ///
    /// Errors are reported to the user as a generic failure notice and logged
    /// with full context by the router.
    async fn handle(&self, ctx: &InvocationContext) -> CommandResult<()>;

    /// Renders detailed help for `help <name>`.
    ///
    /// Returns `Ok(true)` if help was sent. The default returns `Ok(false)`,
    /// and the router falls back to the descriptor's help text.
    async fn help(&self, _ctx: &InvocationContext) -> CommandResult<bool> {
        Ok(false)
    }
}

/// A shared command trait object.
pub type BoxedCommand = Arc<dyn Command>;

// =============================================================================
// Closure commands
// =============================================================================

/// A command built from a descriptor and an async closure.
///
/// Created by [`command_fn`].
pub struct FnCommand<F> {
    descriptor: CommandDescriptor,
    handler: F,
}

/// Wraps an async closure as a [`Command`].
///
/// The closure receives an owned clone of the invocation context so the
/// returned future can be `'static`.
pub fn command_fn<F, Fut>(descriptor: CommandDescriptor, handler: F) -> FnCommand<F>
where
    F: Fn(InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult<()>> + Send + 'static,
{
    FnCommand {
        descriptor,
        handler,
    }
}

#[async_trait]
impl<F, Fut> Command for FnCommand<F>
where
    F: Fn(InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CommandResult<()>> + Send + 'static,
{
    fn descriptor(&self) -> CommandDescriptor {
        self.descriptor.clone()
    }

    async fn handle(&self, ctx: &InvocationContext) -> CommandResult<()> {
        (self.handler)(ctx.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_policy_is_unlimited() {
        assert_eq!(
            RateLimitPolicy::per_window(0, Duration::from_secs(60)),
            RateLimitPolicy::Unlimited
        );
        assert_eq!(
            RateLimitPolicy::per_window(3, Duration::ZERO),
            RateLimitPolicy::Unlimited
        );
        assert!(!RateLimitPolicy::per_window(3, Duration::from_secs(60)).is_unlimited());
    }

    #[test]
    fn test_descriptor_builder() {
        let descriptor = CommandDescriptor::new("stats", "Shows player stats")
            .require_role("moderator")
            .require_roles(["admin", "owner"])
            .rate_limit(3, Duration::from_secs(60));

        assert_eq!(descriptor.name(), "stats");
        assert_eq!(descriptor.required_roles().len(), 3);
        assert_eq!(
            descriptor.rate_limit_policy(),
            RateLimitPolicy::PerWindow {
                max: 3,
                window: Duration::from_secs(60)
            }
        );
    }
}
