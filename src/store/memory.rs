//! In-Memory Table Service
//!
//! A process-local stand-in for the remote table service. It keeps the
//! service's row semantics (tables must be created, merges patch existing
//! rows, deletes of missing rows succeed) and records every call so the
//! traffic a cache generates can be inspected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Connector, EntryStore, ScanPartition, StorageAccount, StoreError};
use crate::cache::CacheEntry;

type Rows = HashMap<(String, String), CacheEntry>;

// == Store Operation ==
/// Kinds of calls the service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Connect,
    EnsureTable,
    Retrieve,
    Upsert,
    Merge,
    Delete,
    Scan,
}

// == Operation Counts ==
/// Number of calls received per operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationCounts {
    pub connects: u64,
    pub ensure_table_calls: u64,
    /// Tables actually created, as opposed to found existing
    pub tables_created: u64,
    pub retrieves: u64,
    pub upserts: u64,
    pub merges: u64,
    pub deletes: u64,
    pub scans: u64,
}

impl OperationCounts {
    fn bump(&mut self, operation: StoreOperation) {
        let counter = match operation {
            StoreOperation::Connect => &mut self.connects,
            StoreOperation::EnsureTable => &mut self.ensure_table_calls,
            StoreOperation::Retrieve => &mut self.retrieves,
            StoreOperation::Upsert => &mut self.upserts,
            StoreOperation::Merge => &mut self.merges,
            StoreOperation::Delete => &mut self.deletes,
            StoreOperation::Scan => &mut self.scans,
        };
        *counter += 1;
    }

    /// Calls that change stored rows.
    pub fn writes(&self) -> u64 {
        self.upserts + self.merges + self.deletes
    }
}

/// An injected failure, fired once `skip` matching calls have passed.
#[derive(Debug)]
struct Fault {
    operation: StoreOperation,
    skip: usize,
    error: StoreError,
}

#[derive(Debug, Default)]
struct ServiceState {
    tables: RwLock<HashMap<String, Rows>>,
    /// Registered account keys; when empty any account is accepted
    accounts: Mutex<HashMap<String, Vec<u8>>>,
    faults: Mutex<Vec<Fault>>,
    counts: Mutex<OperationCounts>,
    latency: Mutex<Option<Duration>>,
}

// == Memory Table Service ==
/// Shared handle to an in-memory table service. Clones see the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryTableService {
    state: Arc<ServiceState>,
}

impl MemoryTableService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accounts registered here (with a matching key) may connect
    /// once at least one account is registered.
    pub fn register_account(&self, name: impl Into<String>, key: impl Into<Vec<u8>>) {
        lock(&self.state.accounts).insert(name.into(), key.into());
    }

    /// Makes the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: StoreOperation, error: StoreError) {
        self.fail_after(operation, 0, error);
    }

    /// Lets `skip` calls of `operation` succeed, then fails the next one.
    pub fn fail_after(&self, operation: StoreOperation, skip: usize, error: StoreError) {
        lock(&self.state.faults).push(Fault { operation, skip, error });
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.state.latency) = latency;
    }

    pub fn counts(&self) -> OperationCounts {
        lock(&self.state.counts).clone()
    }

    pub async fn table_exists(&self, table: &str) -> bool {
        self.state.tables.read().await.contains_key(table)
    }

    /// Reads a row directly, bypassing counters and faults.
    pub async fn row(&self, table: &str, partition_key: &str, key: &str) -> Option<CacheEntry> {
        self.state
            .tables
            .read()
            .await
            .get(table)
            .and_then(|rows| rows.get(&(partition_key.to_string(), key.to_string())))
            .cloned()
    }

    /// Writes a row directly, creating the table if needed.
    pub async fn put_row(&self, table: &str, entry: CacheEntry) {
        self.state
            .tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .insert(row_id(&entry.partition_key, &entry.key), entry);
    }

    /// Counts the call, waits out any latency and fires an injected fault.
    async fn begin(&self, operation: StoreOperation) -> Result<(), StoreError> {
        lock(&self.state.counts).bump(operation);

        let latency = *lock(&self.state.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut faults = lock(&self.state.faults);
        let Some(index) = faults.iter().position(|fault| fault.operation == operation) else {
            return Ok(());
        };
        if faults[index].skip > 0 {
            faults[index].skip -= 1;
            return Ok(());
        }
        Err(faults.remove(index).error)
    }

    fn authorize(&self, account: &StorageAccount) -> Result<(), StoreError> {
        let accounts = lock(&self.state.accounts);
        if accounts.is_empty() {
            return Ok(());
        }
        match accounts.get(&account.name) {
            Some(key) if *key == account.key => Ok(()),
            Some(_) => Err(StoreError::Unauthorized(format!(
                "Key rejected for account '{}'",
                account.name
            ))),
            None => Err(StoreError::Unauthorized(format!("Unknown account '{}'", account.name))),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn row_id(partition_key: &str, key: &str) -> (String, String) {
    (partition_key.to_string(), key.to_string())
}

// == Memory Table ==
/// Handle to one table of a `MemoryTableService`.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    service: MemoryTableService,
    table: String,
}

impl MemoryTable {
    pub fn new(service: MemoryTableService, table: impl Into<String>) -> Self {
        Self {
            service,
            table: table.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.table
    }

    fn missing_table(&self) -> StoreError {
        StoreError::TableNotFound(self.table.clone())
    }
}

#[async_trait]
impl EntryStore for MemoryTable {
    async fn retrieve(&self, partition_key: &str, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        self.service.begin(StoreOperation::Retrieve).await?;

        let tables = self.service.state.tables.read().await;
        let rows = tables.get(&self.table).ok_or_else(|| self.missing_table())?;
        Ok(rows.get(&row_id(partition_key, key)).cloned())
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        self.service.begin(StoreOperation::Upsert).await?;

        let mut tables = self.service.state.tables.write().await;
        let rows = tables.get_mut(&self.table).ok_or_else(|| self.missing_table())?;
        rows.insert(row_id(&entry.partition_key, &entry.key), entry.clone());
        Ok(())
    }

    async fn merge(&self, partial: &CacheEntry) -> Result<(), StoreError> {
        self.service.begin(StoreOperation::Merge).await?;

        let mut tables = self.service.state.tables.write().await;
        let rows = tables.get_mut(&self.table).ok_or_else(|| self.missing_table())?;
        match rows.get_mut(&row_id(&partial.partition_key, &partial.key)) {
            Some(stored) => {
                stored.merge_from(partial);
                Ok(())
            }
            None => Err(StoreError::EntityNotFound {
                partition_key: partial.partition_key.clone(),
                key: partial.key.clone(),
            }),
        }
    }

    async fn delete(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        self.service.begin(StoreOperation::Delete).await?;

        let mut tables = self.service.state.tables.write().await;
        let rows = tables.get_mut(&self.table).ok_or_else(|| self.missing_table())?;
        rows.remove(&row_id(&entry.partition_key, &entry.key));
        Ok(())
    }

    async fn ensure_table_exists(&self) -> Result<(), StoreError> {
        self.service.begin(StoreOperation::EnsureTable).await?;

        let mut tables = self.service.state.tables.write().await;
        if !tables.contains_key(&self.table) {
            tables.insert(self.table.clone(), Rows::new());
            lock(&self.service.state.counts).tables_created += 1;
            debug!("Created table '{}'", self.table);
        }
        Ok(())
    }
}

#[async_trait]
impl ScanPartition for MemoryTable {
    async fn scan_partition(&self, partition_key: &str) -> Result<Vec<CacheEntry>, StoreError> {
        self.service.begin(StoreOperation::Scan).await?;

        let tables = self.service.state.tables.read().await;
        let rows = tables.get(&self.table).ok_or_else(|| self.missing_table())?;
        Ok(rows
            .values()
            .filter(|entry| entry.partition_key == partition_key)
            .cloned()
            .collect())
    }
}

// == Memory Connector ==
/// Connects caches to a `MemoryTableService`.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    service: MemoryTableService,
}

impl MemoryConnector {
    pub fn new(service: MemoryTableService) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &MemoryTableService {
        &self.service
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Store = MemoryTable;

    async fn connect(&self, account: &StorageAccount, table_name: &str) -> Result<MemoryTable, StoreError> {
        self.service.begin(StoreOperation::Connect).await?;
        self.service.authorize(account)?;

        debug!("Connected account '{}' to table '{}'", account.name, table_name);
        Ok(MemoryTable::new(self.service.clone(), table_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, payload: &[u8]) -> CacheEntry {
        CacheEntry::new("pk", key, Some(payload.to_vec()))
    }

    async fn table() -> MemoryTable {
        let table = MemoryTable::new(MemoryTableService::new(), "cache");
        table.ensure_table_exists().await.unwrap();
        table
    }

    #[tokio::test]
    async fn test_operations_require_table() {
        let table = MemoryTable::new(MemoryTableService::new(), "missing");

        let result = table.retrieve("pk", "key").await;
        assert_eq!(result, Err(StoreError::TableNotFound("missing".to_string())));
    }

    #[tokio::test]
    async fn test_ensure_table_creates_once() {
        let table = table().await;
        table.ensure_table_exists().await.unwrap();

        let counts = table.service.counts();
        assert_eq!(counts.ensure_table_calls, 2);
        assert_eq!(counts.tables_created, 1);
    }

    #[tokio::test]
    async fn test_upsert_retrieve_replace() {
        let table = table().await;

        table.upsert(&entry("k", b"one")).await.unwrap();
        let mut replacement = entry("k", b"two");
        replacement.sliding_expiration = Some(Duration::from_secs(1));
        table.upsert(&replacement).await.unwrap();

        let stored = table.retrieve("pk", "k").await.unwrap().unwrap();
        assert_eq!(stored, replacement);
        assert!(table.retrieve("other", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_patches_existing_row() {
        let table = table().await;
        table.upsert(&entry("k", b"data")).await.unwrap();

        let now = chrono::Utc::now();
        let stored = table.retrieve("pk", "k").await.unwrap().unwrap();
        table.merge(&stored.access_stamp(now)).await.unwrap();

        let stored = table.retrieve("pk", "k").await.unwrap().unwrap();
        assert_eq!(stored.payload.as_deref(), Some(&b"data"[..]));
        assert_eq!(stored.last_access_time, Some(now));
    }

    #[tokio::test]
    async fn test_merge_missing_row() {
        let table = table().await;

        let result = table.merge(&entry("ghost", b"")).await;
        assert!(matches!(result, Err(StoreError::EntityNotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let table = table().await;
        table.upsert(&entry("k", b"v")).await.unwrap();

        table.delete(&entry("k", b"v")).await.unwrap();
        table.delete(&entry("k", b"v")).await.unwrap();
        assert!(table.retrieve("pk", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_partition_filters() {
        let table = table().await;
        table.upsert(&entry("a", b"1")).await.unwrap();
        table.upsert(&entry("b", b"2")).await.unwrap();
        table.upsert(&CacheEntry::new("other", "c", None)).await.unwrap();

        let mut keys: Vec<String> = table
            .scan_partition("pk")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() {
        let table = table().await;
        table
            .service
            .fail_next(StoreOperation::Upsert, StoreError::Unavailable("throttled".to_string()));

        assert!(table.upsert(&entry("k", b"v")).await.is_err());
        assert!(table.upsert(&entry("k", b"v")).await.is_ok());
        assert_eq!(table.service.counts().upserts, 2);
    }

    #[tokio::test]
    async fn test_delayed_fault_skips_earlier_calls() {
        let table = table().await;
        table
            .service
            .fail_after(StoreOperation::Delete, 2, StoreError::Unavailable("throttled".to_string()));

        assert!(table.delete(&entry("a", b"")).await.is_ok());
        assert!(table.delete(&entry("b", b"")).await.is_ok());
        assert!(table.delete(&entry("c", b"")).await.is_err());
        assert!(table.delete(&entry("d", b"")).await.is_ok());
    }

    #[tokio::test]
    async fn test_connector_checks_registered_accounts() {
        let service = MemoryTableService::new();
        service.register_account("acct", b"key".to_vec());
        let connector = MemoryConnector::new(service);

        let good = StorageAccount {
            name: "acct".to_string(),
            key: b"key".to_vec(),
            table_endpoint: "http://localhost".to_string(),
        };
        let bad = StorageAccount {
            key: b"wrong".to_vec(),
            ..good.clone()
        };

        assert!(connector.connect(&good, "cache").await.is_ok());
        assert!(matches!(
            connector.connect(&bad, "cache").await,
            Err(StoreError::Unauthorized(_))
        ));
    }
}
