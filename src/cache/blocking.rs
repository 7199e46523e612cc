//! Blocking Cache Module
//!
//! Synchronous wrapper over `TableCache` for callers without an async context.

use std::future::Future;
use std::sync::{mpsc, Arc};

use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheStats, DistributedCache, EntryOptions, TableCache};
use crate::error::{CacheError, Result};
use crate::store::Connector;

// == Blocking Table Cache ==
/// Runs cache operations to completion on a runtime it owns.
///
/// Each call is spawned onto the dedicated runtime and the calling thread
/// waits for its result, so it never drives any scheduler it may be running
/// under. Calls are safe from plain threads and from `spawn_blocking`.
pub struct BlockingTableCache<C: Connector> {
    cache: Arc<TableCache<C>>,
    /// Taken on drop so shutdown can happen in the background
    runtime: Option<Runtime>,
}

impl<C: Connector + 'static> BlockingTableCache<C> {
    /// Wraps `cache` and starts a dedicated single-worker runtime.
    pub fn new(cache: TableCache<C>) -> Result<Self> {
        Self::from_shared(Arc::new(cache))
    }

    /// Wraps a cache that async code may also be using.
    pub fn from_shared(cache: Arc<TableCache<C>>) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("table-cache-blocking")
            .enable_all()
            .build()?;

        Ok(Self {
            cache,
            runtime: Some(runtime),
        })
    }

    /// The async cache behind this wrapper.
    pub fn inner(&self) -> &Arc<TableCache<C>> {
        &self.cache
    }

    fn run<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<TableCache<C>>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| runtime_error("runtime already shut down"))?;

        let (tx, rx) = mpsc::channel();
        let task = operation(self.cache.clone());
        runtime.spawn(async move {
            // receiver only goes away if the caller's thread died
            let _ = tx.send(task.await);
        });

        rx.recv()
            .map_err(|_| runtime_error("cache task stopped before completing"))?
    }

    pub fn connect(&self, cancel: &CancellationToken) -> Result<()> {
        let cancel = cancel.clone();
        self.run(move |cache| async move { cache.connect(&cancel).await })
    }

    pub fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>> {
        let (key, cancel) = (key.to_string(), cancel.clone());
        self.run(move |cache| async move { cache.get(&key, &cancel).await })
    }

    pub fn set(&self, key: &str, payload: &[u8], options: &EntryOptions, cancel: &CancellationToken) -> Result<()> {
        let (key, payload, options, cancel) = (key.to_string(), payload.to_vec(), options.clone(), cancel.clone());
        self.run(move |cache| async move { cache.set(&key, &payload, &options, &cancel).await })
    }

    pub fn refresh(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        let (key, cancel) = (key.to_string(), cancel.clone());
        self.run(move |cache| async move { cache.refresh(&key, &cancel).await })
    }

    pub fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        let (key, cancel) = (key.to_string(), cancel.clone());
        self.run(move |cache| async move { cache.remove(&key, &cancel).await })
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn runtime_error(message: &str) -> CacheError {
    CacheError::Runtime(std::io::Error::other(message.to_string()))
}

impl<C: Connector> Drop for BlockingTableCache<C> {
    fn drop(&mut self) {
        // shutdown_background is safe even when dropped inside another runtime
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
