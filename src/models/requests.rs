//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::cache::EntryOptions;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: The value to store, as UTF-8 text
/// - `absolute_expiration_relative_to_now`: Optional lifetime in seconds
/// - `absolute_expiration`: Optional RFC 3339 instant the entry expires at
/// - `sliding_expiration`: Optional idle window in seconds
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: String,
    #[serde(default)]
    pub absolute_expiration_relative_to_now: Option<u64>,
    #[serde(default)]
    pub absolute_expiration: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sliding_expiration: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        None
    }

    /// Expiration options carried by the request.
    pub fn options(&self) -> EntryOptions {
        EntryOptions {
            absolute_expiration_relative_to_now: self.absolute_expiration_relative_to_now.map(Duration::from_secs),
            absolute_expiration: self.absolute_expiration,
            sliding_expiration: self.sliding_expiration.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"key": "test", "value": "hello"}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "test");
        assert_eq!(req.value, "hello");
        assert_eq!(req.options(), EntryOptions::new());
    }

    #[test]
    fn test_set_request_with_expirations() {
        let json = r#"{
            "key": "test",
            "value": "hello",
            "absolute_expiration_relative_to_now": 60,
            "absolute_expiration": "2030-01-01T00:00:00Z",
            "sliding_expiration": 10
        }"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        let options = req.options();

        assert_eq!(options.absolute_expiration_relative_to_now, Some(Duration::from_secs(60)));
        assert_eq!(options.sliding_expiration, Some(Duration::from_secs(10)));
        assert_eq!(
            options.absolute_expiration.map(|t| t.to_rfc3339()),
            Some("2030-01-01T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn test_validate_empty_key() {
        let req: SetRequest = serde_json::from_str(r#"{"key": "", "value": "test"}"#).unwrap();
        assert!(req.validate().is_some());
    }

    #[test]
    fn test_validate_valid_request() {
        let req: SetRequest =
            serde_json::from_str(r#"{"key": "valid_key", "value": "test", "sliding_expiration": 60}"#).unwrap();
        assert!(req.validate().is_none());
    }
}
