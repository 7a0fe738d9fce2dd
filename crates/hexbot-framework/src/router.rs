//! The message router.
//!
//! A [`Router`] turns inbound [`MessageEvent`]s into command invocations:
//!
//! 1. Bot authors and messages without the prefix are ignored.
//! 2. The content is split into a command name and arguments.
//! 3. The name is resolved against the [`CommandRegistry`]; `help` is built in.
//! 4. The author's roles are checked against the [`PermissionStore`].
//! 5. The invocation is counted against the command's rate limit.
//! 6. The handler runs. Errors and panics are caught, logged with full
//!    context, and answered with a generic notice; an error report goes to
//!    the configured error channel if there is one.
//!
//! Every refusal is answered with a short notice in the invoking channel,
//! except a bare prefix, which is ignored silently.
//!
//! # Tower Service Integration
//!
//! `Router` implements `tower::Service<MessageEvent>`, so middleware such as
//! timeouts or concurrency limits can wrap it:
//!
//! ```rust,ignore
//! let service = ServiceBuilder::new()
//!     .concurrency_limit(64)
//!     .service(router);
//! ```

use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use tower::Service;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use hexbot_core::{
    ChannelId, Colors, Embed, MessageEvent, OutboundMessage, SharedGateway,
};

use crate::command::Command;
use crate::context::InvocationContext;
use crate::error::{CommandError, CommandResult, DispatchError, RegistryError, panic_message};
use crate::parse::{Invocation, Parsed, parse_invocation};
use crate::permissions::PermissionStore;
use crate::ratelimit::RateLimiter;
use crate::reactor::{ReactorConfig, WatchRegistry};
use crate::registry::{CommandRegistry, HELP_COMMAND, RegisteredCommand};

/// Default command prefix.
pub const DEFAULT_PREFIX: &str = "!";

/// Discord caps embed field values at this many characters.
const FIELD_LIMIT: usize = 1024;

// =============================================================================
// Configuration and outcome
// =============================================================================

/// Router settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    /// Prefix that marks a message as a command.
    pub prefix: String,
    /// Channel that receives an error report for every failed handler.
    pub error_channel: Option<ChannelId>,
    /// Ignore messages authored by bot accounts.
    pub ignore_bots: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            error_channel: None,
            ignore_bots: true,
        }
    }
}

/// What happened to one message.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    /// Not a command, or authored by a bot.
    Ignored,
    /// The handler ran to completion.
    Completed {
        /// The command that ran.
        command: String,
    },
    /// The built-in help command answered.
    Help,
    /// The invocation was refused or the handler failed.
    Rejected(DispatchError),
}

impl DispatchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored)
    }

    /// Returns the dispatch error, if the message was rejected.
    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            Self::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

// =============================================================================
// Router
// =============================================================================

/// Cloned on write by the builder methods, shared once dispatch starts.
#[derive(Clone)]
struct RouterInner {
    registry: CommandRegistry,
    permissions: PermissionStore,
    rate_limiter: Arc<RateLimiter>,
    reactor: Arc<WatchRegistry>,
    gateway: SharedGateway,
    config: RouterConfig,
    prefix: Arc<str>,
}

/// Dispatches messages to registered commands.
///
/// Cheap to clone; clones share the registry, the rate limiter and the
/// watch registry.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    /// Creates a router with no commands, default settings and a fresh
    /// rate limiter and watch registry.
    pub fn new(gateway: SharedGateway) -> Self {
        let config = RouterConfig::default();
        Self {
            inner: Arc::new(RouterInner {
                registry: CommandRegistry::new(),
                permissions: PermissionStore::new(),
                rate_limiter: Arc::new(RateLimiter::new()),
                reactor: Arc::new(WatchRegistry::new(ReactorConfig::default())),
                gateway,
                prefix: Arc::from(config.prefix.as_str()),
                config,
            }),
        }
    }

    fn inner_mut(&mut self) -> &mut RouterInner {
        Arc::make_mut(&mut self.inner)
    }

    /// Replaces the router settings.
    pub fn config(mut self, config: RouterConfig) -> Self {
        let inner = self.inner_mut();
        inner.prefix = Arc::from(config.prefix.as_str());
        inner.config = config;
        self
    }

    /// Sets the command prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        let inner = self.inner_mut();
        inner.config.prefix = prefix.into();
        inner.prefix = Arc::from(inner.config.prefix.as_str());
        self
    }

    /// Sets the channel that receives error reports.
    pub fn error_channel(mut self, channel: impl Into<ChannelId>) -> Self {
        self.inner_mut().config.error_channel = Some(channel.into());
        self
    }

    /// Replaces the command registry.
    pub fn registry(mut self, registry: CommandRegistry) -> Self {
        self.inner_mut().registry = registry;
        self
    }

    /// Registers one more command.
    pub fn command<C: Command>(mut self, command: C) -> Result<Self, RegistryError> {
        self.inner_mut().registry.register(command)?;
        Ok(self)
    }

    /// Replaces the permission table.
    pub fn permissions(mut self, permissions: PermissionStore) -> Self {
        self.inner_mut().permissions = permissions;
        self
    }

    /// Shares an existing rate limiter.
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.inner_mut().rate_limiter = limiter;
        self
    }

    /// Shares an existing watch registry.
    pub fn reactor(mut self, reactor: Arc<WatchRegistry>) -> Self {
        self.inner_mut().reactor = reactor;
        self
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.inner.registry
    }

    pub fn permission_store(&self) -> &PermissionStore {
        &self.inner.permissions
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.inner.rate_limiter
    }

    pub fn watch_registry(&self) -> &Arc<WatchRegistry> {
        &self.inner.reactor
    }

    pub fn gateway(&self) -> &SharedGateway {
        &self.inner.gateway
    }

    pub fn settings(&self) -> &RouterConfig {
        &self.inner.config
    }

    /// Runs every command's init hook. Returns the number that failed.
    pub async fn init(&self) -> usize {
        self.inner.registry.init_all().await
    }

    /// Routes one message.
    pub async fn dispatch(&self, event: MessageEvent) -> DispatchOutcome {
        let span = info_span!(
            "dispatch_message",
            message = %event.message_id,
            channel = %event.channel_id,
            user = %event.author_id,
        );
        self.route(event).instrument(span).await
    }

    async fn route(&self, event: MessageEvent) -> DispatchOutcome {
        let inner = &self.inner;

        if inner.config.ignore_bots && event.author_is_bot {
            trace!("Ignoring message from bot");
            return DispatchOutcome::Ignored;
        }

        let invocation = match parse_invocation(&event.content, &inner.prefix) {
            Parsed::NotACommand => return DispatchOutcome::Ignored,
            Parsed::Empty => {
                trace!("Prefix without command name");
                return DispatchOutcome::Rejected(DispatchError::Parse);
            }
            Parsed::Command(invocation) => invocation,
        };
        debug!(command = %invocation.name, args = ?invocation.args, "Command received");

        if invocation.name == HELP_COMMAND {
            return self.help(event, invocation).await;
        }

        let Some(entry) = inner.registry.resolve(&invocation.name) else {
            return self
                .reject(
                    &event.channel_id,
                    DispatchError::UnknownCommand {
                        name: invocation.name,
                    },
                )
                .await;
        };
        let descriptor = entry.descriptor();

        if let Err(e) =
            inner
                .permissions
                .authorize(descriptor, &event.author_id, &event.author_roles)
        {
            info!(command = %descriptor.name(), roles = ?event.author_roles, "Permission denied");
            return self.reject(&event.channel_id, e).await;
        }

        if let Err(cooldown) = inner.rate_limiter.try_acquire(
            descriptor.name(),
            &event.author_id,
            descriptor.rate_limit_policy(),
            event.received_at,
        ) {
            debug!(command = %descriptor.name(), retry_after = ?cooldown.retry_after, "Rate limited");
            let err = DispatchError::RateLimited {
                command: descriptor.name().to_string(),
                retry_after: cooldown.retry_after,
            };
            return self.reject(&event.channel_id, err).await;
        }

        let event = Arc::new(event);
        let ctx = self.context(invocation, Arc::clone(&event));
        match guarded(entry.handler().handle(&ctx)).await {
            Ok(()) => {
                debug!(command = %descriptor.name(), "Command completed");
                DispatchOutcome::Completed {
                    command: descriptor.name().to_string(),
                }
            }
            Err(source) => self.fail(&event, entry, source).await,
        }
    }

    /// The built-in `help [command]`.
    async fn help(&self, event: MessageEvent, invocation: Invocation) -> DispatchOutcome {
        let inner = &self.inner;
        let prefix = &*inner.prefix;

        let mut args = invocation.args.into_iter();
        let Some(name) = args.next() else {
            let listing = self.help_listing(&event);
            self.send(&event.channel_id, listing.into()).await;
            return DispatchOutcome::Help;
        };

        if name == HELP_COMMAND {
            let text = format!(
                "`{prefix}{HELP_COMMAND}`: lists the commands you can use. \
                 `{prefix}{HELP_COMMAND} <command>` shows help for one command."
            );
            self.send(&event.channel_id, text.into()).await;
            return DispatchOutcome::Help;
        }

        let entry = match inner.registry.resolve(&name) {
            Some(entry) if inner.permissions.is_authorized(entry.descriptor(), &event.author_roles) => {
                entry
            }
            _ => {
                return self
                    .reject(&event.channel_id, DispatchError::UnknownCommand { name })
                    .await;
            }
        };

        let event = Arc::new(event);
        let ctx = self.context(
            Invocation {
                name,
                args: args.collect(),
            },
            Arc::clone(&event),
        );
        match guarded(entry.handler().help(&ctx)).await {
            Ok(true) => DispatchOutcome::Help,
            Ok(false) => {
                let descriptor = entry.descriptor();
                let text = format!("`{prefix}{}`: {}", descriptor.name(), descriptor.help());
                self.send(&event.channel_id, text.into()).await;
                DispatchOutcome::Help
            }
            Err(source) => self.fail(&event, entry, source).await,
        }
    }

    /// One embed listing every command the author may run.
    fn help_listing(&self, event: &MessageEvent) -> Embed {
        let inner = &self.inner;
        let prefix = &*inner.prefix;

        let visible: Vec<&RegisteredCommand> = inner
            .registry
            .iter()
            .filter(|c| inner.permissions.is_authorized(c.descriptor(), &event.author_roles))
            .collect();

        let mut embed = Embed::new().title("Commands").color(Colors::PRIMARY);
        if visible.is_empty() {
            embed = embed.description("There are no commands available to you.");
        }
        for command in visible {
            let help = match command.descriptor().help() {
                "" => "No description.",
                help => help,
            };
            embed = embed.field(format!("{prefix}{}", command.name()), help, false);
        }
        embed.footer(format!(
            "Use {prefix}{HELP_COMMAND} <command> for details on one command."
        ))
    }

    fn context(&self, invocation: Invocation, event: Arc<MessageEvent>) -> InvocationContext {
        InvocationContext::new(
            invocation,
            Arc::clone(&self.inner.prefix),
            event,
            Arc::clone(&self.inner.gateway),
            Arc::clone(&self.inner.reactor),
        )
    }

    /// Logs a handler failure, notifies the user and files an error report.
    async fn fail(
        &self,
        event: &MessageEvent,
        entry: &RegisteredCommand,
        source: CommandError,
    ) -> DispatchOutcome {
        error!(
            command = %entry.name(),
            user = %event.author_id,
            channel = %event.channel_id,
            guild = ?event.guild_id,
            message = %event.message_id,
            content = %event.content,
            error = %source,
            "Command failed"
        );

        if let Some(channel) = &self.inner.config.error_channel {
            let report = self.error_report(event, entry, &source);
            self.send(channel, report.into()).await;
        }

        let err = DispatchError::Handler {
            command: entry.name().to_string(),
            source,
        };
        self.reject(&event.channel_id, err).await
    }

    fn error_report(
        &self,
        event: &MessageEvent,
        entry: &RegisteredCommand,
        source: &CommandError,
    ) -> Embed {
        let prefix = &*self.inner.prefix;
        Embed::new()
            .title(format!("Error with command `{prefix}{}`", entry.name()))
            .color(Colors::ERROR)
            .field("User", format!("<@{}>", event.author_id), true)
            .field("Channel", format!("<#{}>", event.channel_id), true)
            .field("Command", format!("`{prefix}{}`", entry.name()), true)
            .field("Error", truncate(&source.to_string()), false)
            .field(
                "Command Text",
                format!("```{}```", truncate(&event.content)),
                false,
            )
    }

    /// Sends the user-facing notice for `err` and wraps it as the outcome.
    async fn reject(&self, channel: &ChannelId, err: DispatchError) -> DispatchOutcome {
        if let Some(notice) = err.user_message(&self.inner.prefix) {
            self.send(channel, notice.into()).await;
        }
        DispatchOutcome::Rejected(err)
    }

    /// Sends a router-originated message. Failures are logged, not returned.
    async fn send(&self, channel: &ChannelId, message: OutboundMessage) {
        if let Err(e) = self.inner.gateway.send(channel, message).await {
            warn!(channel = %channel, error = %e, "Failed to send message");
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.inner.config)
            .field("commands", &self.inner.registry.len())
            .field("gateway", &self.inner.gateway.name())
            .finish_non_exhaustive()
    }
}

/// Awaits a handler future, turning a panic into [`CommandError::Panicked`].
async fn guarded<F, T>(future: F) -> CommandResult<T>
where
    F: std::future::Future<Output = CommandResult<T>>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(CommandError::Panicked(panic_message(&*panic))))
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= FIELD_LIMIT {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(FIELD_LIMIT - 1).collect();
    cut.push('…');
    cut
}

// =============================================================================
// Tower Service
// =============================================================================

impl Service<MessageEvent> for Router {
    type Response = DispatchOutcome;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: MessageEvent) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { Ok(router.dispatch(event).await) })
    }
}
