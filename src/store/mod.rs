//! Store Module
//!
//! The boundary to the remote table service: one trait for row operations
//! on a table, one for opening a table from account credentials.

mod account;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::CacheEntry;

pub use account::{Credentials, StorageAccount, DEVELOPMENT_ACCOUNT_NAME};
pub use memory::{MemoryConnector, MemoryTable, MemoryTableService, OperationCounts, StoreOperation};

// == Store Error ==
/// Failure reported by the table service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The table has not been created
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// A merge targeted a row that does not exist
    #[error("Entity not found: {partition_key}/{key}")]
    EntityNotFound { partition_key: String, key: String },

    /// Credentials were rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Network failure, throttling or any other transient service error
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

// == Entry Store ==
/// Single-row operations against one table.
///
/// Every call is an independent remote request; there is no batching and
/// no optimistic concurrency, so the last write to a row wins.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Point lookup. `Ok(None)` when the row does not exist.
    async fn retrieve(&self, partition_key: &str, key: &str) -> Result<Option<CacheEntry>, StoreError>;

    /// Inserts the row or replaces every field of an existing one.
    async fn upsert(&self, entry: &CacheEntry) -> Result<(), StoreError>;

    /// Applies the `Some` fields of `partial` to an existing row.
    async fn merge(&self, partial: &CacheEntry) -> Result<(), StoreError>;

    /// Deletes the row. Succeeds if it is already gone.
    async fn delete(&self, entry: &CacheEntry) -> Result<(), StoreError>;

    /// Creates the table this handle is bound to, if it does not exist.
    async fn ensure_table_exists(&self) -> Result<(), StoreError>;
}

/// Stores that can list every row of a partition.
#[async_trait]
pub trait ScanPartition: EntryStore {
    async fn scan_partition(&self, partition_key: &str) -> Result<Vec<CacheEntry>, StoreError>;
}

// == Connector ==
/// Opens table handles for a storage account.
#[async_trait]
pub trait Connector: Send + Sync {
    type Store: EntryStore + 'static;

    async fn connect(&self, account: &StorageAccount, table_name: &str) -> Result<Self::Store, StoreError>;
}
