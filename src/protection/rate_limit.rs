//! Sliding-window-log rate limiter.
//!
//! One [`RateWindowCounter`] per subject key (`<role>:<subject>`), stored in
//! a sharded `DashMap`. The prune → count → append sequence for a key runs
//! while holding that key's shard entry, so two concurrent requests for the
//! same key can never both observe a free slot. Unrelated keys on other
//! shards proceed in parallel.
//!
//! Denied attempts are not recorded: a caller over the limit regains a
//! slot as soon as its oldest admitted request leaves the window.
//!
//! Memory is bounded by an opportunistic sweep of keys with no timestamp
//! inside their window, plus a hard cap on tracked keys. Crossing the cap
//! evicts the least recently admitted keys down to a low-water mark, so
//! the eviction pass runs once per batch of new keys rather than once per
//! request. At most one thread sweeps at a time; others skip and proceed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::auth::identity::Identity;
use crate::config::schema::RateLimitConfig;
use crate::http::request::RequestContext;
use crate::observability::metrics;
use crate::protection::clock::{Clock, SystemClock};
use crate::protection::policy::{PolicyRole, RateLimitPolicy};
use crate::protection::{RuleKind, RuleVerdict};

/// Per-key admission log.
#[derive(Debug, Clone)]
pub struct RateWindowCounter {
    timestamps: VecDeque<Instant>,
    window: Duration,
}

impl RateWindowCounter {
    fn new(window: Duration) -> Self {
        Self {
            timestamps: VecDeque::new(),
            window,
        }
    }

    /// Drop every timestamp at or before `now - window`.
    fn prune(&mut self, now: Instant) {
        if let Some(cutoff) = now.checked_sub(self.window) {
            while self.timestamps.front().is_some_and(|ts| *ts <= cutoff) {
                self.timestamps.pop_front();
            }
        }
    }

    fn try_admit(&mut self, now: Instant, policy: RateLimitPolicy) -> bool {
        self.window = policy.window;
        self.prune(now);
        if self.timestamps.len() >= policy.max_requests as usize {
            return false;
        }
        self.timestamps.push_back(now);
        true
    }

    fn len(&self) -> usize {
        self.timestamps.len()
    }

    fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    fn last_admitted(&self) -> Option<Instant> {
        self.timestamps.back().copied()
    }
}

/// Build the limiter key for a caller.
pub fn subject_key(identity: Option<&Identity>, ctx: &RequestContext) -> String {
    let role = PolicyRole::of(identity);
    match identity {
        Some(identity) => format!("{}:{}", role, identity.id),
        None => format!("{}:{}", role, ctx.ip_label()),
    }
}

pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    counters: DashMap<String, RateWindowCounter>,
    clock: C,
    max_keys: usize,
    low_water: usize,
    sweep_interval: u64,
    checks: AtomicU64,
    sweeping: AtomicBool,
}

impl SlidingWindowLimiter<SystemClock> {
    /// Limiter on the system clock.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    pub fn with_clock(config: &RateLimitConfig, clock: C) -> Self {
        let max_keys = config.max_keys.max(1);
        Self {
            counters: DashMap::new(),
            clock,
            max_keys,
            low_water: (max_keys - max_keys / 10).max(1),
            sweep_interval: config.sweep_interval.max(1),
            checks: AtomicU64::new(0),
            sweeping: AtomicBool::new(false),
        }
    }

    /// Admit or deny one request for `key` under `policy`.
    pub fn check(&self, key: &str, policy: RateLimitPolicy) -> RuleVerdict {
        let now = self.clock.now();
        let admitted = {
            let mut counter = self
                .counters
                .entry(key.to_string())
                .or_insert_with(|| RateWindowCounter::new(policy.window));
            counter.try_admit(now, policy)
        };

        self.maybe_sweep(now);

        if admitted {
            RuleVerdict::allow(RuleKind::RateLimit)
        } else {
            tracing::debug!(key, max = policy.max_requests, window = ?policy.window, "Sliding window full");
            RuleVerdict::deny(RuleKind::RateLimit)
        }
    }

    /// Requests currently counted for `key`.
    pub fn in_window(&self, key: &str) -> usize {
        let now = self.clock.now();
        self.counters
            .get_mut(key)
            .map(|mut counter| {
                counter.prune(now);
                counter.len()
            })
            .unwrap_or(0)
    }

    /// Number of keys currently held.
    pub fn tracked_keys(&self) -> usize {
        self.counters.len()
    }

    fn maybe_sweep(&self, now: Instant) {
        let n = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.sweep_interval != 0 && self.counters.len() <= self.max_keys {
            return;
        }
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        self.sweep(now);
        self.sweeping.store(false, Ordering::Release);
    }

    /// Remove keys with nothing left in their window. If the table is still
    /// over the cap, evict the least recently admitted keys down to the
    /// low-water mark.
    pub fn sweep(&self, now: Instant) {
        self.counters.retain(|_, counter| {
            counter.prune(now);
            !counter.is_empty()
        });

        if self.counters.len() > self.max_keys {
            let mut by_age: Vec<(Option<Instant>, String)> = self
                .counters
                .iter()
                .map(|entry| (entry.value().last_admitted(), entry.key().clone()))
                .collect();
            let excess = by_age.len().saturating_sub(self.low_water);
            if excess > 0 {
                by_age.select_nth_unstable_by_key(excess - 1, |(last, _)| *last);
                for (_, key) in by_age.into_iter().take(excess) {
                    self.counters.remove(&key);
                }
                tracing::warn!(evicted = excess, max_keys = self.max_keys, "Rate limiter key cap reached");
            }
        }

        metrics::record_tracked_keys(self.counters.len());
    }
}
