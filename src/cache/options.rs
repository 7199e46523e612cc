//! Entry Options Module
//!
//! Per-write expiration settings and how they resolve against the clock.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{CacheError, Result};

// == Entry Options ==
/// Expiration settings supplied with a `set`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Absolute expiration expressed as an offset from the time of the write
    pub absolute_expiration_relative_to_now: Option<Duration>,
    /// Absolute expiration as a fixed instant
    pub absolute_expiration: Option<DateTime<Utc>>,
    /// Idle window renewed by every read
    pub sliding_expiration: Option<Duration>,
}

impl EntryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_absolute_expiration_relative_to_now(mut self, ttl: Duration) -> Self {
        self.absolute_expiration_relative_to_now = Some(ttl);
        self
    }

    pub fn with_absolute_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.absolute_expiration = Some(at);
        self
    }

    pub fn with_sliding_expiration(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }

    /// Checks that every duration given is positive.
    pub fn validate(&self) -> Result<()> {
        if self.absolute_expiration_relative_to_now == Some(Duration::ZERO) {
            return Err(CacheError::InvalidDuration {
                option: "absolute_expiration_relative_to_now",
            });
        }
        if self.sliding_expiration == Some(Duration::ZERO) {
            return Err(CacheError::InvalidDuration {
                option: "sliding_expiration",
            });
        }
        Ok(())
    }

    // == Resolve Absolute Expiration ==
    /// Resolves the absolute expiration instant for a write made at `now`.
    ///
    /// The relative form takes precedence over the fixed instant. A fixed
    /// instant that is not strictly after `now` is rejected.
    pub fn resolve_absolute_expiration(&self, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        if let Some(ttl) = self.absolute_expiration_relative_to_now {
            let expiration = TimeDelta::from_std(ttl)
                .ok()
                .and_then(|ttl| now.checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            return Ok(Some(expiration));
        }

        match self.absolute_expiration {
            Some(expiration) if expiration <= now => {
                Err(CacheError::InvalidExpiration { expiration, now })
            }
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_expiration() {
        let now = Utc::now();
        assert_eq!(EntryOptions::new().resolve_absolute_expiration(now).unwrap(), None);
    }

    #[test]
    fn test_relative_expiration() {
        let now = Utc::now();
        let options = EntryOptions::new().with_absolute_expiration_relative_to_now(Duration::from_secs(1));

        assert_eq!(
            options.resolve_absolute_expiration(now).unwrap(),
            Some(now + TimeDelta::seconds(1))
        );
    }

    #[test]
    fn test_relative_takes_precedence_over_absolute() {
        let now = Utc::now();
        let options = EntryOptions::new()
            .with_absolute_expiration(now - TimeDelta::seconds(10))
            .with_absolute_expiration_relative_to_now(Duration::from_secs(30));

        assert_eq!(
            options.resolve_absolute_expiration(now).unwrap(),
            Some(now + TimeDelta::seconds(30))
        );
    }

    #[test]
    fn test_future_absolute_is_kept() {
        let now = Utc::now();
        let at = now + TimeDelta::minutes(5);
        let options = EntryOptions::new().with_absolute_expiration(at);

        assert_eq!(options.resolve_absolute_expiration(now).unwrap(), Some(at));
    }

    #[test]
    fn test_absolute_at_now_is_rejected() {
        let now = Utc::now();
        let options = EntryOptions::new().with_absolute_expiration(now);

        let result = options.resolve_absolute_expiration(now);
        assert!(matches!(result, Err(CacheError::InvalidExpiration { .. })));
    }

    #[test]
    fn test_absolute_in_past_is_rejected() {
        let now = Utc::now();
        let options = EntryOptions::new().with_absolute_expiration(now - TimeDelta::seconds(1));

        assert!(options.resolve_absolute_expiration(now).is_err());
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        let sliding = EntryOptions::new().with_sliding_expiration(Duration::ZERO);
        assert!(matches!(
            sliding.validate(),
            Err(CacheError::InvalidDuration { option: "sliding_expiration" })
        ));

        let relative = EntryOptions::new().with_absolute_expiration_relative_to_now(Duration::ZERO);
        assert!(matches!(
            relative.validate(),
            Err(CacheError::InvalidDuration {
                option: "absolute_expiration_relative_to_now"
            })
        ));

        let positive = EntryOptions::new()
            .with_sliding_expiration(Duration::from_millis(1))
            .with_absolute_expiration_relative_to_now(Duration::from_millis(1));
        assert!(positive.validate().is_ok());
    }

    #[test]
    fn test_huge_relative_expiration_saturates() {
        let now = Utc::now();
        let options = EntryOptions::new().with_absolute_expiration_relative_to_now(Duration::from_secs(u64::MAX));

        assert_eq!(
            options.resolve_absolute_expiration(now).unwrap(),
            Some(DateTime::<Utc>::MAX_UTC)
        );
    }
}
