//! Expiration Policy Module
//!
//! Decides whether an entry is expired, and supplies the time it is judged at.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::cache::CacheEntry;

// == Is Expired ==
/// Checks whether `entry` is expired at `now`.
///
/// Boundary condition: both rules are inclusive, so an entry is expired at
/// the exact instant its absolute expiration or sliding deadline is reached.
///
/// # Returns
/// - `true` if `now >= absolute_expiration`
/// - `true` if `now >= last_access_time + sliding_expiration`
/// - `false` otherwise, including entries with no expiration configured
pub fn is_expired(entry: &CacheEntry, now: DateTime<Utc>) -> bool {
    if let Some(absolute) = entry.absolute_expiration {
        if now >= absolute {
            return true;
        }
    }

    match (entry.sliding_expiration, entry.last_access_time) {
        (Some(window), Some(last_access)) => {
            sliding_deadline(last_access, window).is_some_and(|deadline| now >= deadline)
        }
        _ => false,
    }
}

/// Last access plus the sliding window, or None when it overflows.
fn sliding_deadline(last_access: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
    let window = TimeDelta::from_std(window).ok()?;
    last_access.checked_add_signed(window)
}

// == Clock ==
/// Source of the current time for expiration decisions.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can hold one clone while the
/// cache holds another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Sets the clock to `to`, forward or backward.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
