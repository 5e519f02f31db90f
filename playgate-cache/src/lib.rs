//! playgate Cache - Access Decision Caching
//!
//! Stale-while-revalidate cache for authorization gate answers, with
//! single-flight gate calls per key.
//!
//! # Zones
//!
//! | Zone | Lookup behaviour |
//! |------|------------------|
//! | FRESH | cached verdict, no network |
//! | SOFT-STALE | cached verdict, one background refresh per key |
//! | MISS | wait on a single shared gate call |
//!
//! Windows come from the gate's `Cache-Control` header
//! (`max-age`, `stale-while-revalidate`), falling back to 120s/600s.

mod decision_cache;
mod freshness;
mod gate;
mod stats;

pub use decision_cache::{AccessDecisionCache, CacheConfig};
pub use freshness::{
    AccessCacheEntry, CacheDirectives, FreshnessWindow, Zone, DEFAULT_FRESH_SECS,
    DEFAULT_STALE_SECS,
};
pub use gate::{AccessGate, GateDecision};
pub use stats::CacheStats;
