//! Stale-while-revalidate cache in front of the authorization gate.
//!
//! Every [`AccessCacheKey`] owns a slot holding the current entry, a refresh
//! lock, and an attempt counter. The lookup path works like this:
//!
//! - FRESH: return the cached verdict.
//! - SOFT-STALE: return the cached verdict and queue at most one background
//!   refresh for the key.
//! - MISS (or no entry): take the refresh lock and call the gate. Callers that
//!   queued behind the lock while that call ran see the attempt counter move
//!   and reuse its outcome, success or failure, instead of calling again.
//!
//! Entries are replaced wholesale and never evicted. A failed gate call
//! writes nothing, so a stale entry keeps serving until it falls out of its
//! stale window.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use playgate_core::{AccessCacheKey, Clock, GateError};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, instrument, warn};

use crate::freshness::{AccessCacheEntry, FreshnessWindow, Zone};
use crate::gate::AccessGate;
use crate::stats::{CacheStats, StatsCounters};

/// Configuration for the decision cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Window applied when the gate omits or garbles its `Cache-Control`.
    pub default_window: FreshnessWindow,
    /// Entry count past which a warning is logged once. Nothing is evicted.
    pub entry_warn_threshold: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_window: FreshnessWindow::default(),
            entry_warn_threshold: 100_000,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_window(mut self, window: FreshnessWindow) -> Self {
        self.default_window = window;
        self
    }

    pub fn with_entry_warn_threshold(mut self, threshold: usize) -> Self {
        self.entry_warn_threshold = threshold;
        self
    }
}

// ============================================================================
// SLOT
// ============================================================================

type Outcome = Result<bool, GateError>;

#[derive(Debug, Default)]
struct Slot {
    entry: RwLock<Option<AccessCacheEntry>>,
    /// Completed gate calls for this key.
    attempts: AtomicU64,
    /// Held for the duration of a gate call. Stores the last outcome.
    refresh: Mutex<Option<Outcome>>,
    /// A background refresh is queued or running.
    refreshing: AtomicBool,
}

impl Slot {
    fn snapshot(&self) -> Option<AccessCacheEntry> {
        *self.entry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, entry: AccessCacheEntry) {
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = Some(entry);
    }
}

// ============================================================================
// PENDING REFRESHES
// ============================================================================

/// Count of queued or running background refreshes, with a wakeup when it
/// drops to zero.
#[derive(Debug, Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

impl Pending {
    /// Pair with a [`PendingGuard`] held by the refresh task.
    fn begin(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register before reading the count so a wakeup in between is kept.
            notified.as_mut().enable();
            if self.len() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Ends one pending refresh on drop, including on cancellation or panic.
struct PendingGuard<'a>(&'a Pending);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

// ============================================================================
// CACHE
// ============================================================================

struct Inner<G> {
    gate: G,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    slots: DashMap<AccessCacheKey, Arc<Slot>>,
    stats: StatsCounters,
    tasks: TaskTracker,
    pending: Pending,
    shutdown: CancellationToken,
    size_warned: AtomicBool,
}

/// Access decision cache. Cheap to clone; clones share state.
pub struct AccessDecisionCache<G> {
    inner: Arc<Inner<G>>,
}

impl<G> Clone for AccessDecisionCache<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G> std::fmt::Debug for AccessDecisionCache<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessDecisionCache")
            .field("entries", &self.inner.slots.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl<G: AccessGate> AccessDecisionCache<G> {
    pub fn new(gate: G, clock: Arc<dyn Clock>, config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                gate,
                clock,
                config,
                slots: DashMap::new(),
                stats: StatsCounters::default(),
                tasks: TaskTracker::new(),
                pending: Pending::default(),
                shutdown: CancellationToken::new(),
                size_warned: AtomicBool::new(false),
            }),
        }
    }

    /// Resolve the access verdict for `key`.
    ///
    /// Errors only when the gate has to be consulted synchronously and fails,
    /// or after [`shutdown`](Self::shutdown).
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn lookup(&self, key: &AccessCacheKey) -> Result<bool, GateError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(GateError::Cancelled);
        }

        let slot = self.inner.slot(key);
        let observed = slot.attempts.load(Ordering::Acquire);

        if let Some(entry) = slot.snapshot() {
            match entry.zone(self.inner.clock.now()) {
                Zone::Fresh => {
                    StatsCounters::bump(&self.inner.stats.fresh_hits);
                    return Ok(entry.allow);
                }
                Zone::SoftStale => {
                    StatsCounters::bump(&self.inner.stats.stale_hits);
                    self.schedule_refresh(key, &slot);
                    return Ok(entry.allow);
                }
                Zone::Miss => {}
            }
        }

        StatsCounters::bump(&self.inner.stats.misses);
        tokio::select! {
            _ = self.inner.shutdown.cancelled() => Err(GateError::Cancelled),
            outcome = self.inner.refresh_now(key, &slot, observed) => outcome,
        }
    }

    /// Current entry for `key`, without consulting the gate.
    pub fn peek(&self, key: &AccessCacheKey) -> Option<AccessCacheEntry> {
        self.inner.slots.get(key).and_then(|slot| slot.snapshot())
    }

    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.inner.slots.len())
    }

    /// Background refreshes queued or running.
    pub fn pending_refreshes(&self) -> usize {
        self.inner.pending.len()
    }

    /// Wait until no background refresh is queued or running.
    pub async fn wait_for_refreshes(&self) {
        self.inner.pending.wait_idle().await;
    }

    /// Cancel background refreshes and wait for them to finish.
    ///
    /// Later lookups fail with [`GateError::Cancelled`].
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        debug!("access decision cache shut down");
    }

    fn schedule_refresh(&self, key: &AccessCacheKey, slot: &Arc<Slot>) {
        if slot
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        StatsCounters::bump(&self.inner.stats.refreshes);
        let scheduled_at = slot.attempts.load(Ordering::Acquire);
        let inner = Arc::clone(&self.inner);
        let slot = Arc::clone(slot);
        let key = key.clone();

        self.inner.pending.begin();
        self.inner.tasks.spawn(async move {
            let _pending = PendingGuard(&inner.pending);
            tokio::select! {
                _ = inner.shutdown.cancelled() => {
                    debug!(key = %key, "background refresh cancelled");
                }
                _ = inner.background_refresh(&key, &slot, scheduled_at) => {}
            }
            slot.refreshing.store(false, Ordering::Release);
        });
    }
}

impl<G: AccessGate> Inner<G> {
    fn slot(&self, key: &AccessCacheKey) -> Arc<Slot> {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }

        let slot = Arc::clone(
            self.slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Slot::default()))
                .value(),
        );

        let len = self.slots.len();
        if len > self.config.entry_warn_threshold && !self.size_warned.swap(true, Ordering::Relaxed)
        {
            warn!(
                entries = len,
                threshold = self.config.entry_warn_threshold,
                "access decision cache is growing past its warning threshold"
            );
        }

        slot
    }

    async fn refresh_now(&self, key: &AccessCacheKey, slot: &Slot, observed: u64) -> Outcome {
        let mut last = slot.refresh.lock().await;

        if slot.attempts.load(Ordering::Acquire) != observed {
            if let Some(outcome) = last.clone() {
                debug!(key = %key, "joined in-flight gate call");
                return outcome;
            }
        }

        let outcome = self.call_gate(key, slot).await;
        *last = Some(outcome.clone());
        slot.attempts.fetch_add(1, Ordering::Release);
        outcome
    }

    async fn background_refresh(&self, key: &AccessCacheKey, slot: &Slot, scheduled_at: u64) {
        let mut last = slot.refresh.lock().await;

        // Any gate call completed since scheduling already replaced the entry,
        // whatever zone the new window puts it in.
        if slot.attempts.load(Ordering::Acquire) != scheduled_at {
            debug!(key = %key, "entry already refreshed");
            return;
        }

        let outcome = self.call_gate(key, slot).await;
        if let Err(err) = &outcome {
            warn!(key = %key, error = %err, "background refresh failed, keeping stale entry");
        }
        *last = Some(outcome);
        slot.attempts.fetch_add(1, Ordering::Release);
    }

    async fn call_gate(&self, key: &AccessCacheKey, slot: &Slot) -> Outcome {
        StatsCounters::bump(&self.stats.gate_calls);

        match self.gate.check(key.stream(), key.verification_key()).await {
            Ok(decision) => {
                let window = decision.window_or(self.config.default_window);
                let entry = AccessCacheEntry::new(decision.allow, window, self.clock.now());
                slot.store(entry);
                debug!(
                    key = %key,
                    allow = decision.allow,
                    fresh_secs = window.fresh_secs,
                    stale_secs = window.stale_secs,
                    "stored gate decision"
                );
                Ok(decision.allow)
            }
            Err(err) => {
                StatsCounters::bump(&self.stats.gate_failures);
                Err(err)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
