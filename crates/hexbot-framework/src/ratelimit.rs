//! Per-user, per-command invocation limits.
//!
//! Windows are fixed: a window opens at a user's first counted invocation of
//! a command and closes `window` later, after which the count starts over.
//! Only invocations that were allowed through are counted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use hexbot_core::UserId;

use crate::command::RateLimitPolicy;

/// Returned when an invocation would exceed the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    /// Time until the current window closes.
    pub retry_after: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    command: String,
    user: UserId,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    count: u32,
    length: Duration,
}

impl Window {
    /// `None` if the window is too long to represent, i.e. never closes.
    fn closes_at(&self) -> Option<Instant> {
        self.started_at.checked_add(self.length)
    }

    fn is_closed(&self, now: Instant) -> bool {
        self.closes_at().is_some_and(|end| now >= end)
    }

    fn retry_after(&self, now: Instant) -> Duration {
        self.closes_at()
            .map(|end| end.saturating_duration_since(now))
            .unwrap_or(Duration::MAX)
    }
}

/// Tracks invocation counts per `(command, user)`.
///
/// Shared between concurrently running dispatches; all bookkeeping happens
/// under a single short-lived lock.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<Key, Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether `user` may invoke `command` at `now` without counting
    /// the attempt.
    pub fn allow(
        &self,
        command: &str,
        user: &UserId,
        policy: RateLimitPolicy,
        now: Instant,
    ) -> Result<(), Cooldown> {
        let RateLimitPolicy::PerWindow { max, .. } = policy else {
            return Ok(());
        };
        if policy.is_unlimited() {
            return Ok(());
        }

        let windows = self.windows.lock();
        match windows.get(&key(command, user)) {
            Some(window) if !window.is_closed(now) && window.count >= max => Err(Cooldown {
                retry_after: window.retry_after(now),
            }),
            _ => Ok(()),
        }
    }

    /// Counts one invocation of `command` by `user` at `now`.
    pub fn record(&self, command: &str, user: &UserId, policy: RateLimitPolicy, now: Instant) {
        let RateLimitPolicy::PerWindow { window: length, .. } = policy else {
            return;
        };
        if policy.is_unlimited() {
            return;
        }

        let mut windows = self.windows.lock();
        Self::count(&mut windows, key(command, user), length, now);
    }

    /// Checks and counts in one step.
    ///
    /// Two concurrent invocations can never both take the last slot of a
    /// window.
    pub fn try_acquire(
        &self,
        command: &str,
        user: &UserId,
        policy: RateLimitPolicy,
        now: Instant,
    ) -> Result<(), Cooldown> {
        let RateLimitPolicy::PerWindow { max, window: length } = policy else {
            return Ok(());
        };
        if policy.is_unlimited() {
            return Ok(());
        }

        let key = key(command, user);
        let mut windows = self.windows.lock();
        match windows.get(&key) {
            Some(window) if !window.is_closed(now) && window.count >= max => {
                let retry_after = window.retry_after(now);
                trace!(command, user = %user, ?retry_after, "Rate limit reached");
                return Err(Cooldown { retry_after });
            }
            _ => {}
        }
        Self::count(&mut windows, key, length, now);
        Ok(())
    }

    fn count(windows: &mut HashMap<Key, Window>, key: Key, length: Duration, now: Instant) {
        let window = windows.entry(key).or_insert(Window {
            started_at: now,
            count: 0,
            length,
        });
        if window.is_closed(now) {
            *window = Window {
                started_at: now,
                count: 0,
                length,
            };
        }
        window.count = window.count.saturating_add(1);
    }

    /// Drops every window that has closed by `now`. Returns how many were
    /// dropped.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, window| !window.is_closed(now));
        before - windows.len()
    }

    /// Number of tracked `(command, user)` pairs.
    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.lock().is_empty()
    }

    /// Returns `true` if `user` has a window open or pending purge for
    /// `command`.
    pub fn is_tracked(&self, command: &str, user: &UserId) -> bool {
        self.windows.lock().contains_key(&key(command, user))
    }

    /// Spawns a task that purges closed windows every `interval` until
    /// `cancel` fires.
    pub fn spawn_purger(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            if interval.is_zero() {
                warn!("Rate-limit purge interval is zero; purger not started");
                return;
            }
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let purged = limiter.purge_expired(Instant::now());
                        if purged > 0 {
                            debug!(purged, "Purged closed rate-limit windows");
                        }
                    }
                }
            }
            trace!("Rate-limit purger stopped");
        })
    }
}

fn key(command: &str, user: &UserId) -> Key {
    Key {
        command: command.to_string(),
        user: user.clone(),
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    fn three_per_minute() -> RateLimitPolicy {
        RateLimitPolicy::per_window(3, MINUTE)
    }

    #[test]
    fn test_unlimited_never_tracks() {
        let limiter = RateLimiter::new();
        let user = UserId::from("alice");
        let now = Instant::now();
        for _ in 0..100 {
            assert!(
                limiter
                    .try_acquire("ping", &user, RateLimitPolicy::Unlimited, now)
                    .is_ok()
            );
        }
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_fourth_call_in_window_is_rejected() {
        let limiter = RateLimiter::new();
        let user = UserId::from("alice");
        let start = Instant::now();

        for i in 0..3 {
            let at = start + Duration::from_secs(i * 10);
            assert!(limiter.try_acquire("toxic", &user, three_per_minute(), at).is_ok());
        }

        let cooldown = limiter
            .try_acquire("toxic", &user, three_per_minute(), start + Duration::from_secs(30))
            .unwrap_err();
        assert_eq!(cooldown.retry_after, Duration::from_secs(30));
    }

    #[test]
    fn test_window_reopens_after_length() {
        let limiter = RateLimiter::new();
        let user = UserId::from("alice");
        let start = Instant::now();

        for _ in 0..3 {
            limiter.try_acquire("toxic", &user, three_per_minute(), start).unwrap();
        }
        assert!(limiter.try_acquire("toxic", &user, three_per_minute(), start + MINUTE).is_ok());
    }

    #[test]
    fn test_rejections_are_not_counted() {
        let limiter = RateLimiter::new();
        let user = UserId::from("alice");
        let policy = RateLimitPolicy::per_window(1, MINUTE);
        let start = Instant::now();

        limiter.try_acquire("toxic", &user, policy, start).unwrap();
        for s in 1..10 {
            let at = start + Duration::from_secs(s);
            assert!(limiter.try_acquire("toxic", &user, policy, at).is_err());
        }
        // A counted rejection would have pushed the window forward.
        assert!(limiter.try_acquire("toxic", &user, policy, start + MINUTE).is_ok());
    }

    #[test]
    fn test_users_and_commands_are_independent() {
        let limiter = RateLimiter::new();
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        let policy = RateLimitPolicy::per_window(1, MINUTE);
        let now = Instant::now();

        assert_ok!(limiter.try_acquire("toxic", &alice, policy, now));
        assert_ok!(limiter.try_acquire("toxic", &bob, policy, now));
        assert_ok!(limiter.try_acquire("stats", &alice, policy, now));
        assert_err!(limiter.try_acquire("toxic", &alice, policy, now));
    }

    #[test]
    fn test_check_does_not_count() {
        let limiter = RateLimiter::new();
        let user = UserId::from("alice");
        let policy = RateLimitPolicy::per_window(1, MINUTE);
        let now = Instant::now();

        assert!(limiter.allow("toxic", &user, policy, now).is_ok());
        assert!(limiter.allow("toxic", &user, policy, now).is_ok());
        assert!(!limiter.is_tracked("toxic", &user));

        limiter.record("toxic", &user, policy, now);
        assert!(limiter.allow("toxic", &user, policy, now).is_err());
    }

    #[test]
    fn test_purge_drops_closed_windows_only() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        let policy = RateLimitPolicy::per_window(5, MINUTE);

        limiter.record("toxic", &UserId::from("alice"), policy, start);
        limiter.record("toxic", &UserId::from("bob"), policy, start + Duration::from_secs(30));

        assert_eq!(limiter.purge_expired(start + MINUTE), 1);
        assert!(limiter.is_tracked("toxic", &UserId::from("bob")));
        assert_eq!(limiter.purge_expired(start + MINUTE * 2), 1);
        assert!(limiter.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purger_runs_until_cancelled() {
        let limiter = Arc::new(RateLimiter::new());
        let policy = RateLimitPolicy::per_window(5, Duration::from_secs(5));
        limiter.record("toxic", &UserId::from("alice"), policy, Instant::now());

        let cancel = CancellationToken::new();
        let handle = limiter.spawn_purger(Duration::from_secs(10), cancel.clone());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(limiter.is_empty());

        cancel.cancel();
        handle.await.unwrap();
    }
}
