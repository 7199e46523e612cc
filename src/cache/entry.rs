//! Cache Entry Module
//!
//! Defines the row stored in the table for each cached key.

use std::time::Duration;

use chrono::{DateTime, Utc};

// == Cache Entry ==
/// One row in the table: a cached payload plus its expiration metadata.
///
/// The same type doubles as a partial update for merges, where every `None`
/// field is left untouched on the stored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Partition shared by all entries of one cache instance
    pub partition_key: String,
    /// Row key, the caller's cache key
    pub key: String,
    /// The cached bytes, None when the row carries no payload
    pub payload: Option<Vec<u8>>,
    /// Instant at or after which the entry is invalid
    pub absolute_expiration: Option<DateTime<Utc>>,
    /// Idle window after the last access at which the entry becomes invalid
    pub sliding_expiration: Option<Duration>,
    /// Last time a read found this entry
    pub last_access_time: Option<DateTime<Utc>>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry with the given payload and no expiration metadata.
    pub fn new(
        partition_key: impl Into<String>,
        key: impl Into<String>,
        payload: Option<Vec<u8>>,
    ) -> Self {
        Self {
            partition_key: partition_key.into(),
            key: key.into(),
            payload,
            absolute_expiration: None,
            sliding_expiration: None,
            last_access_time: None,
        }
    }

    // == Access Stamp ==
    /// Builds the partial entry used to merge a new last-access time.
    ///
    /// The stamp never moves backward: if the stored time is later than
    /// `now` (clock skew between writers), the stored time is kept.
    pub fn access_stamp(&self, now: DateTime<Utc>) -> Self {
        let stamp = match self.last_access_time {
            Some(previous) if previous > now => previous,
            _ => now,
        };

        Self {
            last_access_time: Some(stamp),
            ..Self::new(self.partition_key.clone(), self.key.clone(), None)
        }
    }

    // == Merge ==
    /// Applies every `Some` field of `partial` onto this entry.
    pub fn merge_from(&mut self, partial: &CacheEntry) {
        if let Some(payload) = &partial.payload {
            self.payload = Some(payload.clone());
        }
        if partial.absolute_expiration.is_some() {
            self.absolute_expiration = partial.absolute_expiration;
        }
        if partial.sliding_expiration.is_some() {
            self.sliding_expiration = partial.sliding_expiration;
        }
        if partial.last_access_time.is_some() {
            self.last_access_time = partial.last_access_time;
        }
    }

    /// Returns true if the row holds a non-empty payload.
    pub fn has_payload(&self) -> bool {
        self.payload.as_ref().is_some_and(|p| !p.is_empty())
    }
}
