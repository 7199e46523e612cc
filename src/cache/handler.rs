//! Cache Handler Module
//!
//! Runs get/set/refresh/remove against the table under the expiration policy.
//! Expired entries are deleted lazily, by the read that finds them.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::stats::StatsRecorder;
use crate::cache::{
    is_expired, validate_key, CacheEntry, CacheStats, Clock, EntryOptions, SystemClock, MAX_PAYLOAD_SIZE,
};
use crate::config::{AccessStamp, CacheConfig};
use crate::error::{CacheError, Result};
use crate::store::{Connector, EntryStore, ScanPartition, StorageAccount, StoreError};

// == Distributed Cache ==
/// A byte-oriented cache shared between processes.
///
/// Every operation takes a cancellation token. Once it fires, the in-flight
/// store call is dropped and the operation returns `CacheError::Cancelled`.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Returns the payload for `key`, or None if absent or expired.
    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>>;

    /// Writes `payload` under `key`, replacing any existing entry.
    async fn set(&self, key: &str, payload: &[u8], options: &EntryOptions, cancel: &CancellationToken) -> Result<()>;

    /// Renews the sliding window of `key`, evicting it if already expired.
    async fn refresh(&self, key: &str, cancel: &CancellationToken) -> Result<()>;

    /// Deletes `key`. Absent keys are not an error.
    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()>;

    fn stats(&self) -> CacheStats;
}

// == Table Cache ==
/// Distributed cache stored in one partition of a table.
pub struct TableCache<C: Connector> {
    config: CacheConfig,
    connector: C,
    /// Table handle, opened by the first successful connect
    table: OnceCell<C::Store>,
    clock: Arc<dyn Clock>,
    stats: StatsRecorder,
}

impl<C: Connector> std::fmt::Debug for TableCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableCache")
            .field("table_name", &self.config.table_name)
            .field("partition_key", &self.config.partition_key)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl<C: Connector> TableCache<C> {
    // == Constructor ==
    /// Creates a cache for `config`. No remote call is made until the first
    /// operation or an explicit `connect`.
    pub fn new(config: CacheConfig, connector: C) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            connector,
            table: OnceCell::new(),
            clock: Arc::new(SystemClock),
            stats: StatsRecorder::default(),
        })
    }

    /// Replaces the clock used for timestamps and expiry decisions.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn is_connected(&self) -> bool {
        self.table.initialized()
    }

    // == Connect ==
    /// Opens the table, creating it if needed.
    ///
    /// Only the first successful call does any work; concurrent callers wait
    /// for it. A failed attempt leaves the cache unconnected so the next
    /// call tries again.
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<()> {
        self.table(cancel).await.map(|_| ())
    }

    async fn table(&self, cancel: &CancellationToken) -> Result<&C::Store> {
        let init = self.table.get_or_try_init(|| self.open_table());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CacheError::Cancelled),
            table = init => table,
        }
    }

    async fn open_table(&self) -> Result<C::Store> {
        let table_name = &self.config.table_name;
        let account = StorageAccount::from_credentials(&self.config.credentials)?;

        let store = self
            .connector
            .connect(&account, table_name)
            .await
            .map_err(|e| connection_error(table_name, e))?;
        store
            .ensure_table_exists()
            .await
            .map_err(|e| connection_error(table_name, e))?;

        info!(
            "Connected to table '{}' (account '{}', partition '{}')",
            table_name, account.name, self.config.partition_key
        );
        Ok(store)
    }

    // == Execute ==
    /// Runs one store call, racing it against the cancellation token.
    async fn execute<T>(
        &self,
        operation: &'static str,
        key: &str,
        cancel: &CancellationToken,
        call: impl Future<Output = std::result::Result<T, StoreError>>,
    ) -> Result<T> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(operation, key, "Table operation cancelled");
                return Err(CacheError::Cancelled);
            }
            result = call => result,
        };

        match result {
            Ok(value) => {
                debug!(operation, key, "Table operation succeeded");
                Ok(value)
            }
            Err(e @ StoreError::EntityNotFound { .. }) => {
                debug!(operation, key, "Table operation found no entity");
                Err(e.into())
            }
            Err(e) => {
                warn!(operation, key, error = %e, "Table operation failed");
                Err(e.into())
            }
        }
    }

    async fn retrieve(&self, table: &C::Store, key: &str, cancel: &CancellationToken) -> Result<Option<CacheEntry>> {
        self.execute("retrieve", key, cancel, table.retrieve(&self.config.partition_key, key))
            .await
    }

    /// Deletes `entry`. Returns false if it was already gone.
    async fn delete(&self, table: &C::Store, entry: &CacheEntry, cancel: &CancellationToken) -> Result<bool> {
        match self.execute("delete", &entry.key, cancel, table.delete(entry)).await {
            Ok(()) => Ok(true),
            Err(CacheError::Store(StoreError::EntityNotFound { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    // == Settle ==
    /// Stamps the access time on `entry` and applies the expiration policy.
    ///
    /// The policy is evaluated against the timestamps read from the table,
    /// not the stamp being written, so a sliding window can lapse. Returns
    /// the entry if it is live, None if it was expired (and is now deleted)
    /// or vanished before the stamp landed.
    async fn settle(&self, table: &C::Store, entry: CacheEntry, cancel: &CancellationToken) -> Result<Option<CacheEntry>> {
        let now = self.clock.now();
        let expired = is_expired(&entry, now);

        let should_stamp = match self.config.access_stamp {
            AccessStamp::BeforeExpiryCheck => true,
            AccessStamp::LiveEntriesOnly => !expired,
        };

        if should_stamp {
            let stamp = entry.access_stamp(now);
            match self.execute("merge", &entry.key, cancel, table.merge(&stamp)).await {
                Ok(()) => {}
                // deleted by someone else between retrieve and merge
                Err(CacheError::Store(StoreError::EntityNotFound { .. })) => return Ok(None),
                Err(e) => return Err(e),
            }
        }

        if expired {
            if self.delete(table, &entry, cancel).await? {
                self.stats.record_expiration();
                debug!("Deleted expired entry '{}'", entry.key);
            }
            return Ok(None);
        }

        Ok(Some(entry))
    }

    // == Purge Expired ==
    /// Deletes every expired entry in the cache's partition, without
    /// stamping anything. Returns the number of entries removed.
    ///
    /// The scan only nominates candidates. Each one is read again and
    /// re-checked before deletion, so an entry renewed by a reader after
    /// the scan survives. Entries removed before a failing delete are
    /// still counted in the stats.
    pub async fn purge_expired(&self, cancel: &CancellationToken) -> Result<usize>
    where
        C::Store: ScanPartition,
    {
        let table = self.table(cancel).await?;
        let partition_key = &self.config.partition_key;

        let entries = self
            .execute("scan", partition_key, cancel, table.scan_partition(partition_key))
            .await?;

        let now = self.clock.now();
        let mut removed = 0;
        let mut outcome = Ok(());
        for candidate in entries.iter().filter(|entry| is_expired(entry, now)) {
            match self.purge_candidate(table, &candidate.key, cancel).await {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        self.stats.record_swept(removed as u64);
        outcome.map(|()| removed)
    }

    /// Deletes `key` if its current row is still expired.
    async fn purge_candidate(&self, table: &C::Store, key: &str, cancel: &CancellationToken) -> Result<bool> {
        let Some(current) = self.retrieve(table, key, cancel).await? else {
            return Ok(false);
        };
        if !is_expired(&current, self.clock.now()) {
            debug!("Entry '{}' was renewed since the scan, keeping it", key);
            return Ok(false);
        }
        self.delete(table, &current, cancel).await
    }
}

fn connection_error(table_name: &str, error: StoreError) -> CacheError {
    warn!("Failed to open table '{}': {}", table_name, error);
    CacheError::Connection(format!("table '{}': {}", table_name, error))
}

#[async_trait]
impl<C: Connector> DistributedCache for TableCache<C> {
    // == Get ==
    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let table = self.table(cancel).await?;

        let entry = match self.retrieve(table, key, cancel).await? {
            Some(entry) if entry.has_payload() => entry,
            _ => {
                self.stats.record_miss();
                return Ok(None);
            }
        };

        match self.settle(table, entry, cancel).await? {
            Some(entry) => {
                self.stats.record_hit();
                Ok(entry.payload)
            }
            None => {
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    // == Set ==
    async fn set(&self, key: &str, payload: &[u8], options: &EntryOptions, cancel: &CancellationToken) -> Result<()> {
        validate_key(key)?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(CacheError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        options.validate()?;
        let now = self.clock.now();
        let absolute_expiration = options.resolve_absolute_expiration(now)?;

        let entry = CacheEntry {
            absolute_expiration,
            sliding_expiration: options.sliding_expiration,
            last_access_time: Some(now),
            ..CacheEntry::new(self.config.partition_key.clone(), key, Some(payload.to_vec()))
        };

        let table = self.table(cancel).await?;
        self.execute("upsert", key, cancel, table.upsert(&entry)).await?;
        self.stats.record_write();
        Ok(())
    }

    // == Refresh ==
    async fn refresh(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        validate_key(key)?;
        let table = self.table(cancel).await?;

        if let Some(entry) = self.retrieve(table, key, cancel).await? {
            self.settle(table, entry, cancel).await?;
        }
        Ok(())
    }

    // == Remove ==
    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        validate_key(key)?;
        let table = self.table(cancel).await?;

        if let Some(entry) = self.retrieve(table, key, cancel).await? {
            if self.delete(table, &entry, cancel).await? {
                self.stats.record_removal();
            }
        }
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}
