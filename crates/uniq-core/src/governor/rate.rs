//! Per-user sliding-window rate limiting with flood bans.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateConfig;
use crate::error::AdmissionDenied;

/// Caller identity. Opaque to the limiter.
pub type UserId = u64;

/// Idle records are swept once every this many checks.
const PURGE_EVERY: u64 = 1024;

/// Window and ban state for one user.
#[derive(Debug, Default, Clone)]
pub struct UserRecord {
    /// Admission times inside the current window, oldest first
    pub admitted: VecDeque<Instant>,
    /// Rejected attempts inside the current window, oldest first
    pub denied: VecDeque<Instant>,
    pub banned_until: Option<Instant>,
}

impl UserRecord {
    fn evict(&mut self, now: Instant, window: Duration) {
        while self.admitted.front().is_some_and(|&t| now - t >= window) {
            self.admitted.pop_front();
        }
        while self.denied.front().is_some_and(|&t| now - t >= window) {
            self.denied.pop_front();
        }
    }

    fn is_idle(&self, now: Instant, window: Duration) -> bool {
        let ban_over = self.banned_until.map_or(true, |until| now >= until);
        let window_over = self
            .admitted
            .back()
            .into_iter()
            .chain(self.denied.back())
            .all(|&t| now - t >= window);
        ban_over && window_over
    }
}

/// Storage for per-user records. Every call to `update` must be atomic
/// with respect to other calls for the same user.
pub trait RateStore: Send + Sync {
    fn update<R>(&self, user: UserId, f: impl FnOnce(&mut UserRecord) -> R) -> R;

    fn remove(&self, user: UserId);

    /// Drop every record for which `keep` returns false.
    fn retain(&self, keep: &mut dyn FnMut(&UserRecord) -> bool);
}

/// In-process store: one mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    records: Mutex<HashMap<UserId, UserRecord>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, UserRecord>> {
        // A panic mid-update leaves a record that is still structurally valid.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RateStore for MemoryRateStore {
    fn update<R>(&self, user: UserId, f: impl FnOnce(&mut UserRecord) -> R) -> R {
        f(self.lock().entry(user).or_default())
    }

    fn remove(&self, user: UserId) {
        self.lock().remove(&user);
    }

    fn retain(&self, keep: &mut dyn FnMut(&UserRecord) -> bool) {
        self.lock().retain(|_, record| keep(record));
    }
}

/// Snapshot of one user's limiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateStats {
    pub requests_in_window: usize,
    pub is_banned: bool,
    pub banned_for_secs: u64,
}

/// Sliding-window limiter. Admits `max_requests` per `window`; once
/// admitted plus denied attempts in the window exceed
/// `max_requests * flood_multiplier`, the user is banned for `ban`.
#[derive(Debug)]
pub struct RateLimiter<S: RateStore = MemoryRateStore> {
    store: S,
    max_requests: usize,
    window: Duration,
    flood_threshold: usize,
    ban: Duration,
    checks: AtomicU64,
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

impl RateLimiter<MemoryRateStore> {
    pub fn from_config(config: &RateConfig) -> Self {
        Self::with_store(config, MemoryRateStore::new())
    }
}

impl<S: RateStore> RateLimiter<S> {
    pub fn with_store(config: &RateConfig, store: S) -> Self {
        Self {
            store,
            max_requests: config.max_requests.max(1),
            window: Duration::from_secs(config.window_secs.max(1)),
            flood_threshold: config.max_requests.max(1) * config.flood_multiplier.max(2),
            ban: Duration::from_secs(config.ban_secs),
            checks: AtomicU64::new(0),
        }
    }

    /// Admit or reject one request from `user` now.
    pub fn check_rate(&self, user: UserId) -> Result<(), AdmissionDenied> {
        self.check_rate_at(user, Instant::now())
    }

    /// Admit or reject one request from `user` at `now`.
    pub fn check_rate_at(&self, user: UserId, now: Instant) -> Result<(), AdmissionDenied> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            self.purge_idle_at(now);
        }

        let (max, window, threshold, ban) =
            (self.max_requests, self.window, self.flood_threshold, self.ban);
        self.store.update(user, |record| {
            if let Some(until) = record.banned_until {
                if now < until {
                    return Err(AdmissionDenied::Banned {
                        retry_after_secs: ceil_secs(until - now),
                    });
                }
                record.banned_until = None;
            }

            record.evict(now, window);
            if record.admitted.len() < max {
                record.admitted.push_back(now);
                return Ok(());
            }

            record.denied.push_back(now);
            if record.admitted.len() + record.denied.len() > threshold {
                record.banned_until = Some(now + ban);
                record.denied.clear();
                tracing::warn!("User {} flood-banned for {:?}", user, ban);
                return Err(AdmissionDenied::Banned {
                    retry_after_secs: ceil_secs(ban),
                });
            }

            let oldest = record.admitted.front().copied().unwrap_or(now);
            let retry = window.saturating_sub(now - oldest);
            Err(AdmissionDenied::RateLimited {
                retry_after_secs: ceil_secs(retry),
            })
        })
    }

    /// Ban `user` for `duration`, replacing any existing ban.
    pub fn ban(&self, user: UserId, duration: Duration) {
        let until = Instant::now() + duration;
        self.store
            .update(user, |record| record.banned_until = Some(until));
        tracing::info!("User {} banned for {:?}", user, duration);
    }

    /// Lift a ban; the request window is left intact.
    pub fn unban(&self, user: UserId) {
        self.store.update(user, |record| {
            record.banned_until = None;
            record.denied.clear();
        });
    }

    /// Forget everything about `user`.
    pub fn reset(&self, user: UserId) {
        self.store.remove(user);
    }

    pub fn stats(&self, user: UserId) -> RateStats {
        self.stats_at(user, Instant::now())
    }

    pub fn stats_at(&self, user: UserId, now: Instant) -> RateStats {
        let window = self.window;
        self.store.update(user, |record| {
            record.evict(now, window);
            let remaining = record
                .banned_until
                .filter(|&until| until > now)
                .map(|until| until - now);
            RateStats {
                requests_in_window: record.admitted.len(),
                is_banned: remaining.is_some(),
                banned_for_secs: remaining.map_or(0, ceil_secs),
            }
        })
    }

    /// Drop records with nothing left in the window and no active ban.
    pub fn purge_idle_at(&self, now: Instant) {
        let window = self.window;
        self.store.retain(&mut |record| !record.is_idle(now, window));
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
