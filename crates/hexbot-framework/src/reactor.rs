//! Reaction watchers.
//!
//! A command that wants to react to emoji on a message (confirmation
//! prompts, paginators) registers [`Watcher`]s on that message's id. When a
//! reaction arrives, every live watcher on the message whose trigger matches
//! the emoji is invoked, in registration order. Watchers expire after a TTL
//! and are pruned by [`WatchRegistry::sweep`], which normally runs on a
//! background task started with [`WatchRegistry::spawn_sweeper`].
//!
//! ```rust,ignore
//! let prompt = ctx.send("Are you sure?").await?;
//! ctx.watch(
//!     prompt,
//!     [Watcher::new("✅", |rctx: ReactionContext| async move {
//!         rctx.send("Confirmed.").await?;
//!         rctx.unwatch_message();
//!         Ok(())
//!     })],
//! );
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, trace, warn};
use uuid::Uuid;

use hexbot_core::{
    ChannelId, Emoji, MessageId, OutboundMessage, ReactionAddEvent, SharedGateway, UserId,
};

use crate::error::{CommandError, CommandResult, panic_message};

/// Default wildcard trigger, matching any emoji.
pub const DEFAULT_WILDCARD: &str = "*";

// =============================================================================
// Configuration
// =============================================================================

/// Settings for a [`WatchRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactorConfig {
    /// Lifetime of a watcher registered without an explicit expiration.
    pub default_ttl: Duration,
    /// How often the background sweeper prunes expired watchers.
    pub sweep_interval: Duration,
    /// Trigger that matches every emoji.
    pub wildcard: String,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            wildcard: DEFAULT_WILDCARD.to_string(),
        }
    }
}

// =============================================================================
// Watchers
// =============================================================================

/// Identifies one registered watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(Uuid);

impl WatcherId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Callback invoked when a watcher fires.
pub type WatcherCallback =
    Arc<dyn Fn(ReactionContext) -> BoxFuture<'static, CommandResult<()>> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
enum Expiry {
    Default,
    After(Duration),
    At(Instant),
}

/// A callback bound to an emoji trigger, waiting to be registered on a
/// message.
#[derive(Clone)]
pub struct Watcher {
    id: WatcherId,
    trigger: String,
    callback: WatcherCallback,
    expiry: Expiry,
}

impl Watcher {
    /// Creates a watcher that fires on `trigger`.
    ///
    /// `trigger` is a unicode emoji, a custom emoji name or `name:id`, or the
    /// registry's wildcard.
    pub fn new<F, Fut>(trigger: impl Into<String>, callback: F) -> Self
    where
        F: Fn(ReactionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandResult<()>> + Send + 'static,
    {
        Self {
            id: WatcherId::new(),
            trigger: trigger.into(),
            callback: Arc::new(move |ctx| callback(ctx).boxed()),
            expiry: Expiry::Default,
        }
    }

    /// Expires the watcher `ttl` after it is registered.
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expiry = Expiry::After(ttl);
        self
    }

    /// Expires the watcher at a fixed instant.
    pub fn expires_at(mut self, at: Instant) -> Self {
        self.expiry = Expiry::At(at);
        self
    }

    pub fn id(&self) -> WatcherId {
        self.id
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

/// A watcher stored in the pool, with its lifetime resolved.
struct Registered {
    watcher: Watcher,
    created_at: Instant,
    expires_at: Instant,
}

impl Registered {
    fn is_live(&self, at: Instant) -> bool {
        self.expires_at > at
    }
}

/// A snapshot of one registered watcher, for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherInfo {
    pub id: WatcherId,
    pub trigger: String,
    pub created_at: Instant,
    pub expires_at: Instant,
}

// =============================================================================
// Registry
// =============================================================================

/// Pool of reaction watchers keyed by message id.
pub struct WatchRegistry {
    pool: Mutex<HashMap<MessageId, Vec<Registered>>>,
    config: ReactorConfig,
}

impl WatchRegistry {
    pub fn new(config: ReactorConfig) -> Self {
        Self {
            pool: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// Registers watchers on `message`, appending to any already there.
    pub fn watch<I>(&self, message: impl Into<MessageId>, watchers: I) -> Vec<WatcherId>
    where
        I: IntoIterator<Item = Watcher>,
    {
        self.watch_at(message, watchers, Instant::now())
    }

    /// Registers watchers as if at `now`. Relative and default lifetimes are
    /// measured from `now`.
    pub fn watch_at<I>(
        &self,
        message: impl Into<MessageId>,
        watchers: I,
        now: Instant,
    ) -> Vec<WatcherId>
    where
        I: IntoIterator<Item = Watcher>,
    {
        let message = message.into();
        let registered: Vec<Registered> = watchers
            .into_iter()
            .map(|watcher| {
                let expires_at = match watcher.expiry {
                    Expiry::At(at) => at,
                    Expiry::After(ttl) => deadline(now, ttl),
                    Expiry::Default => deadline(now, self.config.default_ttl),
                };
                Registered {
                    watcher,
                    created_at: now,
                    expires_at,
                }
            })
            .collect();
        let ids: Vec<WatcherId> = registered.iter().map(|r| r.watcher.id).collect();

        if !ids.is_empty() {
            debug!(message = %message, watchers = ids.len(), "Watching message");
            self.pool.lock().entry(message).or_default().extend(registered);
        }
        ids
    }

    /// Removes every watcher on each of `messages`. Unknown ids are ignored.
    /// Returns the number of watchers removed.
    pub fn unwatch<I>(&self, messages: I) -> usize
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut pool = self.pool.lock();
        messages
            .into_iter()
            .filter_map(|id| pool.remove(id.as_ref()))
            .map(|removed| removed.len())
            .sum()
    }

    /// Removes one watcher. Returns `false` if it was not registered.
    pub fn remove_watcher(&self, message: &MessageId, id: WatcherId) -> bool {
        let mut pool = self.pool.lock();
        let Some(watchers) = pool.get_mut(message) else {
            return false;
        };
        let before = watchers.len();
        watchers.retain(|r| r.watcher.id != id);
        let removed = watchers.len() != before;
        if watchers.is_empty() {
            pool.remove(message);
        }
        removed
    }

    /// Returns `true` if any watcher, live or expired, is registered on
    /// `message`.
    pub fn is_watching(&self, message: &str) -> bool {
        self.pool.lock().contains_key(message)
    }

    /// Lists the watchers registered on `message`, in registration order.
    pub fn watchers(&self, message: &str) -> Vec<WatcherInfo> {
        self.pool
            .lock()
            .get(message)
            .map(|watchers| {
                watchers
                    .iter()
                    .map(|r| WatcherInfo {
                        id: r.watcher.id,
                        trigger: r.watcher.trigger.clone(),
                        created_at: r.created_at,
                        expires_at: r.expires_at,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of watched messages.
    pub fn message_count(&self) -> usize {
        self.pool.lock().len()
    }

    /// Number of registered watchers across all messages.
    pub fn watcher_count(&self) -> usize {
        self.pool.lock().values().map(Vec::len).sum()
    }

    fn trigger_matches(&self, trigger: &str, emoji: &Emoji) -> bool {
        trigger == self.config.wildcard || emoji.matches(trigger)
    }

    /// Invokes every live watcher on the reacted message whose trigger
    /// matches the emoji. Returns the number of callbacks invoked.
    ///
    /// Reactions from bot accounts are ignored. Callbacks run one at a time
    /// in registration order with the pool unlocked, so they may watch or
    /// unwatch freely. A failing or panicking callback is logged and does
    /// not stop the rest.
    pub async fn dispatch(self: &Arc<Self>, gateway: &SharedGateway, event: ReactionAddEvent) -> usize {
        let span = info_span!(
            "dispatch_reaction",
            message = %event.message_id,
            channel = %event.channel_id,
            user = %event.user_id,
        );
        self.fire(gateway, event).instrument(span).await
    }

    async fn fire(self: &Arc<Self>, gateway: &SharedGateway, event: ReactionAddEvent) -> usize {
        if event.user_is_bot {
            trace!(user = %event.user_id, "Ignoring reaction from bot");
            return 0;
        }

        let matched: Vec<(WatcherId, WatcherCallback)> = {
            let pool = self.pool.lock();
            let Some(watchers) = pool.get(&event.message_id) else {
                return 0;
            };
            watchers
                .iter()
                .filter(|r| r.is_live(event.received_at))
                .filter(|r| self.trigger_matches(&r.watcher.trigger, &event.emoji))
                .map(|r| (r.watcher.id, Arc::clone(&r.watcher.callback)))
                .collect()
        };

        if matched.is_empty() {
            return 0;
        }

        let event = Arc::new(event);
        let mut invoked = 0;
        for (watcher_id, callback) in matched {
            let ctx = ReactionContext {
                reaction: Arc::clone(&event),
                gateway: Arc::clone(gateway),
                registry: Arc::clone(self),
                watcher_id,
            };
            invoked += 1;
            let result = AssertUnwindSafe(callback(ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(CommandError::Panicked(panic_message(&*panic))));
            if let Err(e) = result {
                error!(
                    watcher = %watcher_id,
                    message = %event.message_id,
                    channel = %event.channel_id,
                    user = %event.user_id,
                    emoji = %event.emoji,
                    error = %e,
                    "Reaction watcher failed"
                );
            }
        }

        debug!(
            message = %event.message_id,
            emoji = %event.emoji,
            invoked,
            "Reaction dispatched"
        );
        invoked
    }

    /// Removes every watcher that has expired by `now` and every message
    /// left with no watchers. Returns the number of watchers removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut pool = self.pool.lock();
        let mut removed = 0;
        pool.retain(|_, watchers| {
            let before = watchers.len();
            watchers.retain(|r| r.is_live(now));
            removed += before - watchers.len();
            !watchers.is_empty()
        });
        removed
    }

    /// Spawns a task that sweeps every `sweep_interval` until `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            if period.is_zero() {
                warn!("Reaction sweep interval is zero; sweeper not started");
                return;
            }
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = registry.sweep(Instant::now());
                        if removed > 0 {
                            debug!(removed, "Swept expired reaction watchers");
                        }
                    }
                }
            }
            trace!("Reaction sweeper stopped");
        })
    }
}

impl fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("config", &self.config)
            .field("messages", &self.message_count())
            .finish_non_exhaustive()
    }
}

fn deadline(from: Instant, ttl: Duration) -> Instant {
    from.checked_add(ttl)
        .unwrap_or_else(|| from + Duration::from_secs(60 * 60 * 24 * 365 * 30))
}

// =============================================================================
// Reaction context
// =============================================================================

/// What a watcher callback receives: the reaction, the gateway, and a handle
/// back to the registry.
#[derive(Clone)]
pub struct ReactionContext {
    reaction: Arc<ReactionAddEvent>,
    gateway: SharedGateway,
    registry: Arc<WatchRegistry>,
    watcher_id: WatcherId,
}

impl ReactionContext {
    pub fn reaction(&self) -> &ReactionAddEvent {
        &self.reaction
    }

    pub fn user_id(&self) -> &UserId {
        &self.reaction.user_id
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.reaction.channel_id
    }

    pub fn message_id(&self) -> &MessageId {
        &self.reaction.message_id
    }

    pub fn emoji(&self) -> &Emoji {
        &self.reaction.emoji
    }

    pub fn watcher_id(&self) -> WatcherId {
        self.watcher_id
    }

    pub fn gateway(&self) -> &SharedGateway {
        &self.gateway
    }

    pub fn registry(&self) -> &Arc<WatchRegistry> {
        &self.registry
    }

    /// Sends a message to the channel the reaction happened in.
    pub async fn send(&self, message: impl Into<OutboundMessage>) -> CommandResult<MessageId> {
        Ok(self.gateway.send(self.channel_id(), message.into()).await?)
    }

    /// Removes the watcher that fired.
    pub fn unwatch_self(&self) -> bool {
        self.registry
            .remove_watcher(&self.reaction.message_id, self.watcher_id)
    }

    /// Removes every watcher on the reacted message.
    pub fn unwatch_message(&self) -> usize {
        self.registry.unwatch([&self.reaction.message_id])
    }
}

impl fmt::Debug for ReactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionContext")
            .field("reaction", &self.reaction)
            .field("watcher_id", &self.watcher_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use hexbot_core::testing::RecordingGateway;

    use super::*;

    fn registry() -> Arc<WatchRegistry> {
        Arc::new(WatchRegistry::new(ReactorConfig::default()))
    }

    fn counting(trigger: &str, hits: &Arc<AtomicUsize>) -> Watcher {
        let hits = Arc::clone(hits);
        Watcher::new(trigger, move |_ctx| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    async fn explode(_ctx: ReactionContext) -> CommandResult<()> {
        panic!("callback panic")
    }

    fn reaction(message: &str, emoji: Emoji, at: Instant) -> ReactionAddEvent {
        ReactionAddEvent::new(message, "general", "alice", emoji).received_at(at)
    }

    #[tokio::test]
    async fn test_fires_only_before_expiry() {
        let registry = registry();
        let gateway: SharedGateway = RecordingGateway::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();

        registry.watch_at(
            "123",
            [counting("✅", &hits).expires_in(Duration::from_secs(30))],
            start,
        );

        let early = reaction("123", "✅".into(), start + Duration::from_secs(10));
        assert_eq!(registry.dispatch(&gateway, early).await, 1);

        let late = reaction("123", "✅".into(), start + Duration::from_secs(40));
        assert_eq!(registry.dispatch(&gateway, late).await, 0);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_ttl_applies() {
        let registry = Arc::new(WatchRegistry::new(ReactorConfig {
            default_ttl: Duration::from_secs(5),
            ..ReactorConfig::default()
        }));
        let start = Instant::now();
        registry.watch_at("123", [counting("✅", &Arc::default())], start);

        let info = &registry.watchers("123")[0];
        assert_eq!(info.created_at, start);
        assert_eq!(info.expires_at, start + Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_trigger_and_wildcard_matching() {
        let registry = registry();
        let gateway: SharedGateway = RecordingGateway::new();
        let check = Arc::new(AtomicUsize::new(0));
        let any = Arc::new(AtomicUsize::new(0));
        let custom = Arc::new(AtomicUsize::new(0));
        let now = Instant::now();

        registry.watch_at(
            "123",
            [
                counting("✅", &check),
                counting("*", &any),
                counting("pog:42", &custom),
            ],
            now,
        );

        registry.dispatch(&gateway, reaction("123", "❌".into(), now)).await;
        registry
            .dispatch(&gateway, reaction("123", Emoji::custom("pog", "42"), now))
            .await;
        registry.dispatch(&gateway, reaction("123", "✅".into(), now)).await;
        registry.dispatch(&gateway, reaction("999", "✅".into(), now)).await;

        assert_eq!(check.load(Ordering::SeqCst), 1);
        assert_eq!(any.load(Ordering::SeqCst), 3);
        assert_eq!(custom.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_bot_reactions_are_ignored() {
        let registry = registry();
        let gateway: SharedGateway = RecordingGateway::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let now = Instant::now();
        registry.watch_at("123", [counting("*", &hits)], now);

        let event = reaction("123", "✅".into(), now).from_bot();
        assert_eq!(registry.dispatch(&gateway, event).await, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_watch_appends_in_order() {
        let registry = registry();
        let gateway: SharedGateway = RecordingGateway::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let now = Instant::now();

        for label in ["first", "second"] {
            let order = Arc::clone(&order);
            registry.watch_at(
                "123",
                [Watcher::new("✅", move |_ctx| {
                    let order = Arc::clone(&order);
                    async move {
                        order.lock().push(label);
                        Ok(())
                    }
                })],
                now,
            );
        }

        registry.dispatch(&gateway, reaction("123", "✅".into(), now)).await;
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_failing_callback_does_not_stop_others() {
        let registry = registry();
        let gateway: SharedGateway = RecordingGateway::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let now = Instant::now();

        registry.watch_at(
            "123",
            [
                Watcher::new("✅", |_ctx| async { Err(CommandError::internal("boom")) }),
                Watcher::new("✅", explode),
                counting("✅", &hits),
            ],
            now,
        );

        let invoked = registry
            .dispatch(&gateway, reaction("123", "✅".into(), now))
            .await;
        assert_eq!(invoked, 3);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_callback_can_unwatch_itself() {
        let registry = registry();
        let gateway: SharedGateway = RecordingGateway::new();
        let now = Instant::now();

        registry.watch_at(
            "123",
            [Watcher::new("✅", |ctx: ReactionContext| async move {
                ctx.unwatch_self();
                ctx.send("confirmed").await?;
                Ok(())
            })],
            now,
        );

        assert_eq!(
            registry.dispatch(&gateway, reaction("123", "✅".into(), now)).await,
            1
        );
        assert!(!registry.is_watching("123"));
        assert_eq!(
            registry.dispatch(&gateway, reaction("123", "✅".into(), now)).await,
            0
        );
    }

    #[test]
    fn test_unwatch_and_remove() {
        let registry = registry();
        let now = Instant::now();
        let ids = registry.watch_at(
            "a",
            [counting("✅", &Arc::default()), counting("❌", &Arc::default())],
            now,
        );
        registry.watch_at("b", [counting("✅", &Arc::default())], now);

        assert!(registry.remove_watcher(&MessageId::from("a"), ids[0]));
        assert!(!registry.remove_watcher(&MessageId::from("a"), ids[0]));
        assert_eq!(registry.watcher_count(), 2);

        assert_eq!(registry.unwatch(["a", "missing"]), 1);
        assert!(!registry.is_watching("a"));
        assert!(registry.is_watching("b"));
    }

    #[test]
    fn test_sweep_removes_expired_and_empty_keys() {
        let registry = registry();
        let start = Instant::now();
        registry.watch_at(
            "a",
            [
                counting("✅", &Arc::default()).expires_in(Duration::from_secs(10)),
                counting("❌", &Arc::default()).expires_in(Duration::from_secs(60)),
            ],
            start,
        );
        registry.watch_at(
            "b",
            [counting("✅", &Arc::default()).expires_in(Duration::from_secs(10))],
            start,
        );

        assert_eq!(registry.sweep(start + Duration::from_secs(10)), 2);
        assert!(registry.is_watching("a"));
        assert!(!registry.is_watching("b"));
        assert_eq!(registry.message_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_prunes_in_background() {
        let registry = Arc::new(WatchRegistry::new(ReactorConfig {
            default_ttl: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(10),
            ..ReactorConfig::default()
        }));
        registry.watch("123", [counting("✅", &Arc::default())]);

        let cancel = CancellationToken::new();
        let handle = registry.spawn_sweeper(cancel.clone());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(!registry.is_watching("123"));

        cancel.cancel();
        handle.await.unwrap();
    }
}
