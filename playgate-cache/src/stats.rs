//! Cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from a fresh entry.
    pub fresh_hits: u64,
    /// Lookups answered from a stale entry while a refresh ran.
    pub stale_hits: u64,
    /// Lookups that had to wait on the gate.
    pub misses: u64,
    /// Calls made to the gate, foreground and background.
    pub gate_calls: u64,
    /// Gate calls that failed.
    pub gate_failures: u64,
    /// Background refreshes started.
    pub refreshes: u64,
    /// Keys currently held.
    pub entries: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0). Stale hits count as hits.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.fresh_hits + self.stale_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub fresh_hits: AtomicU64,
    pub stale_hits: AtomicU64,
    pub misses: AtomicU64,
    pub gate_calls: AtomicU64,
    pub gate_failures: AtomicU64,
    pub refreshes: AtomicU64,
}

impl StatsCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            fresh_hits: self.fresh_hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            gate_calls: self.gate_calls.load(Ordering::Relaxed),
            gate_failures: self.gate_failures.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            entries: entries as u64,
        }
    }
}
