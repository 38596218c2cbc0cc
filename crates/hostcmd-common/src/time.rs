// ============================================
// File: crates/hostcmd-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Freshness checks on signed commands and per-command cooldowns both work
//! in whole Unix seconds. This module gives them one representation and a
//! clock abstraction that tests can drive.
//!
//! ## Main Functionality
//! - `Timestamp`: Unix timestamp in seconds
//! - `Clock`: Source of the current time
//! - `SystemClock`: Wall clock
//! - `ManualClock`: Settable clock for tests and simulations
//!
//! ## ⚠️ Important Note for Next Developer
//! - Timestamps arrive from the wire, so arithmetic on them must not overflow
//! - Freshness is symmetric: a timestamp too far in the future is as bad as
//!   one too far in the past
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================
// Timestamp
// ============================================

/// Unix timestamp in seconds.
///
/// # Example
/// ```
/// use hostcmd_common::time::Timestamp;
///
/// let signed_at = Timestamp::from_secs(1_700_000_000);
/// let now = Timestamp::from_secs(1_700_000_030);
/// assert!(signed_at.is_within(now, 60));
/// assert!(!signed_at.is_within(now, 10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a new timestamp from Unix seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Creates a timestamp for the current wall-clock time.
    ///
    /// A system clock set before the Unix epoch reads as zero.
    #[must_use]
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or_default();
        Self(secs)
    }

    /// Returns the Unix timestamp in seconds.
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0
    }

    /// Absolute distance to `other` in seconds.
    #[must_use]
    pub const fn abs_diff(&self, other: Self) -> u64 {
        self.0.abs_diff(other.0)
    }

    /// Checks whether `|self - reference| <= max_age_secs`.
    #[must_use]
    pub const fn is_within(&self, reference: Self, max_age_secs: u64) -> bool {
        self.abs_diff(reference) <= max_age_secs
    }

    /// Seconds elapsed from `earlier` to `self`, saturating.
    #[must_use]
    pub const fn seconds_since(&self, earlier: Self) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns a timestamp shifted by `secs` (may be negative), saturating.
    #[must_use]
    pub const fn offset(&self, secs: i64) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}

impl From<Timestamp> for i64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

// ============================================
// Clock
// ============================================

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock whose value is set explicitly.
///
/// # Example
/// ```
/// use hostcmd_common::time::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// clock.advance(300);
/// assert_eq!(clock.now().as_secs(), 1_300);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    /// Creates a clock reading `secs`.
    #[must_use]
    pub const fn new(secs: i64) -> Self {
        Self {
            secs: AtomicI64::new(secs),
        }
    }

    /// Creates a clock reading the current wall-clock time.
    #[must_use]
    pub fn starting_now() -> Self {
        Self::new(Timestamp::now().as_secs())
    }

    /// Sets the clock.
    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    /// Moves the clock by `secs` (may be negative).
    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.secs.load(Ordering::SeqCst))
    }
}

/// Returns the current Unix timestamp in seconds.
#[must_use]
pub fn unix_timestamp() -> i64 {
    Timestamp::now().as_secs()
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now_is_recent() {
        let now = Timestamp::now();
        assert!(now.as_secs() > 1_577_836_800);
        assert!(now.is_within(SystemClock.now(), 2));
    }

    #[test]
    fn test_freshness_is_symmetric() {
        let reference = Timestamp::from_secs(10_000);

        assert!(Timestamp::from_secs(9_940).is_within(reference, 60));
        assert!(Timestamp::from_secs(10_060).is_within(reference, 60));
        assert!(!Timestamp::from_secs(9_939).is_within(reference, 60));
        assert!(!Timestamp::from_secs(10_061).is_within(reference, 60));
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let reference = Timestamp::from_secs(1_700_000_000);
        assert!(!Timestamp::from_secs(i64::MIN).is_within(reference, 60));
        assert!(!Timestamp::from_secs(i64::MAX).is_within(reference, 60));
        assert_eq!(Timestamp::from_secs(i64::MAX).offset(10).as_secs(), i64::MAX);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(500);
        assert_eq!(clock.now(), Timestamp::from_secs(500));

        clock.advance(-100);
        assert_eq!(clock.now().as_secs(), 400);

        clock.set(42);
        assert_eq!(clock.now().seconds_since(Timestamp::from_secs(40)), 2);
    }
}
