//! Cache Module
//!
//! Table-backed distributed cache with absolute and sliding expiration.

mod blocking;
mod entry;
mod handler;
mod options;
pub mod policy;
mod stats;


// Re-export public types
pub use blocking::BlockingTableCache;
pub use entry::CacheEntry;
pub use handler::{DistributedCache, TableCache};
pub use options::EntryOptions;
pub use policy::{is_expired, Clock, ManualClock, SystemClock};
pub use stats::CacheStats;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 1024;

/// Maximum allowed payload size in bytes
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024; // 64 KiB

/// Characters the table service refuses in row keys
const FORBIDDEN_KEY_CHARS: [char; 4] = ['/', '\\', '#', '?'];

// == Key Validation ==
/// Checks that `key` can be used as a row key.
pub fn validate_key(key: &str) -> crate::error::Result<()> {
    use crate::error::CacheError;

    if key.is_empty() {
        return Err(CacheError::InvalidKey("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    if let Some(c) = key
        .chars()
        .find(|c| FORBIDDEN_KEY_CHARS.contains(c) || c.is_control())
    {
        return Err(CacheError::InvalidKey(format!(
            "Key contains forbidden character {:?}",
            c
        )));
    }
    Ok(())
}
