//! Freshness contracts for cached access decisions.
//!
//! The gate tells us how long its answer may be trusted through a
//! `Cache-Control` header. This module turns that header into a
//! [`FreshnessWindow`], stamps it onto an [`AccessCacheEntry`], and classifies
//! any later instant into one of three [`Zone`]s.
//!
//! Both windows are measured from the moment the gate answer is stored:
//!
//! ```text
//! stored_at ----- fresh_until ----- stale_until ----->
//!    FRESH         |   SOFT-STALE    |   MISS
//! ```
//!
//! `fresh_until` is clamped to `stale_until`, so a non-positive
//! `stale-while-revalidate` makes every later lookup a MISS no matter what
//! `max-age` says. The gate uses that to switch caching off per response.

use chrono::{DateTime, TimeDelta, Utc};

/// Fresh window applied when the gate sends no usable `max-age`.
pub const DEFAULT_FRESH_SECS: i64 = 120;

/// Stale window applied when the gate sends no usable `stale-while-revalidate`.
pub const DEFAULT_STALE_SECS: i64 = 600;

/// Freshness directives parsed from a `Cache-Control` header.
///
/// `None` means the directive was absent or unparsable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheDirectives {
    pub max_age: Option<i64>,
    pub stale_while_revalidate: Option<i64>,
}

impl CacheDirectives {
    /// Parse a `Cache-Control` header value.
    ///
    /// Directive names are case-insensitive, values may be quoted and may be
    /// negative. Unknown directives and garbage are ignored.
    pub fn parse(header: &str) -> Self {
        let mut directives = Self::default();

        for directive in header.split(',') {
            let Some((name, value)) = directive.split_once('=') else {
                continue;
            };
            let Ok(secs) = value.trim().trim_matches('"').parse::<i64>() else {
                continue;
            };

            match name.trim().to_ascii_lowercase().as_str() {
                "max-age" => directives.max_age = Some(secs),
                "stale-while-revalidate" => directives.stale_while_revalidate = Some(secs),
                _ => {}
            }
        }

        directives
    }

    /// Resolve the directives against fallback windows.
    pub fn window_or(&self, defaults: FreshnessWindow) -> FreshnessWindow {
        FreshnessWindow {
            fresh_secs: self.max_age.unwrap_or(defaults.fresh_secs),
            stale_secs: self.stale_while_revalidate.unwrap_or(defaults.stale_secs),
        }
    }
}

/// How long a decision stays fresh, and how long it may be served stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessWindow {
    pub fresh_secs: i64,
    pub stale_secs: i64,
}

impl FreshnessWindow {
    pub fn new(fresh_secs: i64, stale_secs: i64) -> Self {
        Self {
            fresh_secs,
            stale_secs,
        }
    }
}

impl Default for FreshnessWindow {
    fn default() -> Self {
        Self::new(DEFAULT_FRESH_SECS, DEFAULT_STALE_SECS)
    }
}

/// Where an instant falls relative to an entry's windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Serve from cache, no network.
    Fresh,
    /// Serve from cache, refresh in the background.
    SoftStale,
    /// Block on a gate call.
    Miss,
}

/// One cached access decision.
///
/// Always read and written as a whole value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessCacheEntry {
    pub allow: bool,
    pub fresh_until: DateTime<Utc>,
    pub stale_until: DateTime<Utc>,
}

impl AccessCacheEntry {
    pub fn new(allow: bool, window: FreshnessWindow, stored_at: DateTime<Utc>) -> Self {
        let stale_until = offset(stored_at, window.stale_secs);
        let fresh_until = offset(stored_at, window.fresh_secs).min(stale_until);
        Self {
            allow,
            fresh_until,
            stale_until,
        }
    }

    pub fn zone(&self, now: DateTime<Utc>) -> Zone {
        if now < self.fresh_until {
            Zone::Fresh
        } else if now < self.stale_until {
            Zone::SoftStale
        } else {
            Zone::Miss
        }
    }
}

/// `at + secs`, saturating at the representable range.
fn offset(at: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    let saturated = if secs >= 0 {
        DateTime::<Utc>::MAX_UTC
    } else {
        DateTime::<Utc>::MIN_UTC
    };

    TimeDelta::try_seconds(secs)
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(saturated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_704_067_200, 0).single().unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + TimeDelta::seconds(secs)
    }

    #[test]
    fn test_parse_both_directives() {
        let d = CacheDirectives::parse("max-age=120,stale-while-revalidate=300");
        assert_eq!(d.max_age, Some(120));
        assert_eq!(d.stale_while_revalidate, Some(300));
    }

    #[test]
    fn test_parse_mixed_case_spaces_and_extras() {
        let d = CacheDirectives::parse("public, Max-Age = 30 , no-transform, STALE-WHILE-REVALIDATE=\"90\"");
        assert_eq!(d.max_age, Some(30));
        assert_eq!(d.stale_while_revalidate, Some(90));
    }

    #[test]
    fn test_parse_negative_values() {
        let d = CacheDirectives::parse("max-age=-1, stale-while-revalidate=-5");
        assert_eq!(d.max_age, Some(-1));
        assert_eq!(d.stale_while_revalidate, Some(-5));
    }

    #[test]
    fn test_parse_garbage_is_ignored() {
        let d = CacheDirectives::parse("max-age=soon, stale-while-revalidate");
        assert_eq!(d, CacheDirectives::default());
        assert_eq!(CacheDirectives::parse(""), CacheDirectives::default());
    }

    #[test]
    fn test_window_or_fills_missing_directives() {
        let defaults = FreshnessWindow::default();
        let only_max_age = CacheDirectives::parse("max-age=10");
        assert_eq!(only_max_age.window_or(defaults), FreshnessWindow::new(10, DEFAULT_STALE_SECS));

        let none = CacheDirectives::default();
        assert_eq!(none.window_or(defaults), FreshnessWindow::new(120, 600));
    }

    #[test]
    fn test_entry_zones() {
        let entry = AccessCacheEntry::new(true, FreshnessWindow::new(120, 300), t0());
        assert_eq!(entry.zone(t0()), Zone::Fresh);
        assert_eq!(entry.zone(at(119)), Zone::Fresh);
        assert_eq!(entry.zone(at(120)), Zone::SoftStale);
        assert_eq!(entry.zone(at(299)), Zone::SoftStale);
        assert_eq!(entry.zone(at(300)), Zone::Miss);
    }

    #[test]
    fn test_zero_max_age_has_no_fresh_zone() {
        let entry = AccessCacheEntry::new(true, FreshnessWindow::new(0, 300), t0());
        assert_eq!(entry.zone(t0()), Zone::SoftStale);
    }

    #[test]
    fn test_non_positive_stale_window_is_always_miss() {
        for stale in [0, -1, -600] {
            let entry = AccessCacheEntry::new(true, FreshnessWindow::new(120, stale), t0());
            assert_eq!(entry.zone(t0()), Zone::Miss);
            assert!(entry.fresh_until <= entry.stale_until);
        }
    }

    #[test]
    fn test_max_age_is_clamped_to_stale_window() {
        let entry = AccessCacheEntry::new(false, FreshnessWindow::new(900, 60), t0());
        assert_eq!(entry.fresh_until, entry.stale_until);
        assert_eq!(entry.zone(at(59)), Zone::Fresh);
        assert_eq!(entry.zone(at(60)), Zone::Miss);
    }

    #[test]
    fn test_huge_windows_saturate() {
        let entry = AccessCacheEntry::new(true, FreshnessWindow::new(i64::MAX, i64::MAX), t0());
        assert_eq!(entry.stale_until, DateTime::<Utc>::MAX_UTC);
        assert_eq!(entry.zone(at(10_000_000)), Zone::Fresh);
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(header in ".{0,64}") {
            let _ = CacheDirectives::parse(&header);
        }

        #[test]
        fn prop_entry_fresh_never_exceeds_stale(
            fresh in -1_000_000i64..1_000_000,
            stale in -1_000_000i64..1_000_000,
        ) {
            let entry = AccessCacheEntry::new(true, FreshnessWindow::new(fresh, stale), t0());
            prop_assert!(entry.fresh_until <= entry.stale_until);
        }
    }
}
