//! The event loop.
//!
//! [`BotRuntime`] owns the router (and through it the command registry, the
//! rate limiter and the watch registry) and feeds it a stream of gateway
//! events. Each event is dispatched on its own task, so a slow handler never
//! holds up the next message. Background housekeeping prunes expired
//! reaction watchers and closed rate-limit windows.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! let runtime = BotRuntime::builder()
//!     .config_file("hexbot.toml")
//!     .command(Ping)
//!     .build(gateway)?;
//!
//! // Runs until Ctrl+C, SIGTERM, or the end of the event stream.
//! runtime.run(events).await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::signal;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use hexbot_core::{GatewayEvent, SharedGateway};
use hexbot_framework::{
    BoxedCommand, Command, CommandRegistry, RateLimiter, Router, WatchRegistry,
};

use crate::config::{ConfigLoader, HexbotConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// How long in-flight events may run after shutdown begins.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Drives a [`Router`] from a stream of gateway events.
pub struct BotRuntime {
    config: HexbotConfig,
    router: Router,
    gateway: SharedGateway,
    shutdown: CancellationToken,
    shutdown_grace: Duration,
}

impl BotRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &HexbotConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn watch_registry(&self) -> &Arc<WatchRegistry> {
        self.router.watch_registry()
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        self.router.limiter()
    }

    /// A token that stops the runtime when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Dispatches one event and waits for it to finish.
    pub async fn handle_event(&self, event: GatewayEvent) {
        dispatch(self.router.clone(), Arc::clone(&self.gateway), event).await;
    }

    /// Runs until Ctrl+C, SIGTERM, [`shutdown_token`](Self::shutdown_token)
    /// cancellation, or the end of `events`.
    pub async fn run<S>(&self, events: S) -> RuntimeResult<()>
    where
        S: Stream<Item = GatewayEvent>,
    {
        let signal = ShutdownSignal::install()?;
        self.run_until(events, signal.recv()).await
    }

    /// Runs until `shutdown` resolves, the shutdown token is cancelled, or
    /// `events` ends.
    pub async fn run_until<S, F>(&self, events: S, shutdown: F) -> RuntimeResult<()>
    where
        S: Stream<Item = GatewayEvent>,
        F: Future<Output = ()>,
    {
        let failed = self.router.init().await;
        if failed > 0 {
            warn!(failed, "Some command init hooks failed");
        }

        let housekeeping = self.shutdown.child_token();
        let sweeper = self
            .router
            .watch_registry()
            .spawn_sweeper(housekeeping.clone());
        let purger = self.router.limiter().spawn_purger(
            self.router.watch_registry().config().sweep_interval,
            housekeeping.clone(),
        );

        info!(
            gateway = %self.gateway.name(),
            commands = self.router.commands().len(),
            prefix = %self.router.settings().prefix,
            "hexbot runtime is running"
        );

        let mut tasks = JoinSet::new();
        tokio::pin!(events);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                next = events.next() => match next {
                    Some(event) => {
                        trace!(event = event.event_name(), "Event received");
                        tasks.spawn(dispatch(
                            self.router.clone(),
                            Arc::clone(&self.gateway),
                            event,
                        ));
                    }
                    None => {
                        info!("Event stream ended");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    log_task_result(joined);
                }
            }
        }

        self.drain(&mut tasks).await;
        housekeeping.cancel();
        for handle in [sweeper, purger] {
            if let Err(e) = handle.await {
                error!(error = %e, "Housekeeping task failed");
            }
        }

        info!("hexbot runtime stopped");
        Ok(())
    }

    async fn drain(&self, tasks: &mut JoinSet<()>) {
        if tasks.is_empty() {
            return;
        }
        info!(in_flight = tasks.len(), "Waiting for in-flight events");

        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while let Some(joined) = tasks.join_next().await {
                log_task_result(joined);
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                remaining = tasks.len(),
                "Shutdown grace period elapsed, aborting in-flight events"
            );
            tasks.abort_all();
        }
    }
}

impl std::fmt::Debug for BotRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotRuntime")
            .field("router", &self.router)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish_non_exhaustive()
    }
}

async fn dispatch(router: Router, gateway: SharedGateway, event: GatewayEvent) {
    match event {
        GatewayEvent::Message(message) => {
            let outcome = router.dispatch(message).await;
            trace!(?outcome, "Message dispatched");
        }
        GatewayEvent::ReactionAdd(reaction) => {
            router
                .watch_registry()
                .dispatch(&gateway, reaction)
                .await;
        }
    }
}

fn log_task_result(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "Event task panicked");
        } else {
            debug!(error = %e, "Event task cancelled");
        }
    }
}

/// Ctrl+C, plus SIGTERM on unix.
struct ShutdownSignal {
    #[cfg(unix)]
    sigterm: signal::unix::Signal,
}

impl ShutdownSignal {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            sigterm: signal::unix::signal(signal::unix::SignalKind::terminate())?,
        })
    }

    async fn recv(self) {
        #[cfg(unix)]
        {
            let mut sigterm = self.sigterm;
            tokio::select! {
                result = signal::ctrl_c() => match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down"),
                    Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
                },
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            match signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, shutting down"),
                Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
            }
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`BotRuntime`].
///
/// ```rust,ignore
/// let runtime = BotRuntime::builder()
///     .profile("production")
///     .command(Ping)
///     .command(Tip::new(store))
///     .build(gateway)?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<HexbotConfig>,
    commands: Vec<BoxedCommand>,
    init_logging: bool,
    shutdown_grace: Duration,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            commands: Vec::new(),
            init_logging: true,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Loads this configuration file instead of searching.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables `HEXBOT_*` environment overrides.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically.
    pub fn merge(mut self, config: HexbotConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses an already loaded configuration; no files or environment are
    /// read.
    pub fn config(mut self, config: HexbotConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Registers a command.
    pub fn command<C: Command>(mut self, command: C) -> Self {
        self.commands.push(Arc::new(command));
        self
    }

    /// Registers a command that is already shared.
    pub fn command_shared(mut self, command: BoxedCommand) -> Self {
        self.commands.push(command);
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// How long in-flight events may run after shutdown begins.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Loads configuration, initializes logging and assembles the runtime.
    pub fn build(self, gateway: SharedGateway) -> RuntimeResult<BotRuntime> {
        let config = match self.config {
            Some(config) => {
                validate_config(&config)?;
                config
            }
            None => self.config_loader.load()?,
        };

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let mut registry = CommandRegistry::new();
        for command in self.commands {
            registry.register_shared(command)?;
        }
        for command in config.permissions.keys() {
            if registry.resolve(command).is_none() {
                warn!(command = %command, "Permission entry for unknown command");
            }
        }

        let reactor = Arc::new(WatchRegistry::new(config.reactor_config()));
        let router = Router::new(Arc::clone(&gateway))
            .config(config.router_config())
            .permissions(config.permission_store())
            .registry(registry)
            .reactor(reactor)
            .rate_limiter(Arc::new(RateLimiter::new()));

        info!(
            log_level = %config.logging.level,
            commands = router.commands().len(),
            "Runtime initialized from configuration"
        );

        Ok(BotRuntime {
            config,
            router,
            gateway,
            shutdown: CancellationToken::new(),
            shutdown_grace: self.shutdown_grace,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
