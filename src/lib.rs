//! Table Cache - A distributed cache over a partitioned table store
//!
//! Provides get/set/refresh/remove with absolute and sliding expiration.
//! Expired entries are deleted lazily by the read that finds them.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod tasks;

pub use api::AppState;
pub use cache::{BlockingTableCache, DistributedCache, EntryOptions, TableCache};
pub use config::{AccessStamp, CacheConfig, Config};
pub use error::{CacheError, Result};
pub use tasks::spawn_sweeper_task;
