//! Expiration scenarios against the public cache API, in real time.

use std::time::Duration;

use table_cache::store::{MemoryConnector, MemoryTableService};
use table_cache::{CacheConfig, CacheError, DistributedCache, EntryOptions, TableCache};
use tokio_util::sync::CancellationToken;

const TABLE: &str = "scenarios";
const PARTITION: &str = "pk";

fn cache() -> (TableCache<MemoryConnector>, MemoryTableService) {
    let service = MemoryTableService::new();
    let config = CacheConfig::with_connection_string("UseDevelopmentStorage=true", TABLE, PARTITION).unwrap();
    let cache = TableCache::new(config, MemoryConnector::new(service.clone())).unwrap();
    (cache, service)
}

#[tokio::test]
async fn test_absolute_expiration_relative_to_now() {
    let (cache, service) = cache();
    let cancel = CancellationToken::new();
    let options = EntryOptions::new().with_absolute_expiration_relative_to_now(Duration::from_secs(1));

    cache.set("k", b"hello", &options, &cancel).await.unwrap();
    assert_eq!(cache.get("k", &cancel).await.unwrap(), Some(b"hello".to_vec()));

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(cache.get("k", &cancel).await.unwrap(), None);
    assert!(
        service.row(TABLE, PARTITION, "k").await.is_none(),
        "Expired row should be deleted from the table"
    );
}

#[tokio::test]
async fn test_sliding_expiration_renewed_then_lapses() {
    let (cache, _) = cache();
    let cancel = CancellationToken::new();
    let options = EntryOptions::new().with_sliding_expiration(Duration::from_secs(2));

    cache.set("k", b"x", &options, &cancel).await.unwrap();
    for _ in 0..3 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k", &cancel).await.unwrap(), Some(b"x".to_vec()));
    }

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(cache.get("k", &cancel).await.unwrap(), None);
}

#[tokio::test]
async fn test_past_absolute_expiration_rejected_without_write() {
    let (cache, service) = cache();
    let cancel = CancellationToken::new();
    let options = EntryOptions::new().with_absolute_expiration(chrono::Utc::now() - chrono::TimeDelta::seconds(1));

    let result = cache.set("k", b"v", &options, &cancel).await;
    assert!(matches!(result, Err(CacheError::InvalidExpiration { .. })));

    assert_eq!(cache.get("k", &cancel).await.unwrap(), None);
    assert_eq!(service.counts().upserts, 0);
}

#[tokio::test]
async fn test_connect_twice_creates_table_once() {
    let (cache, service) = cache();
    let cancel = CancellationToken::new();

    cache.connect(&cancel).await.unwrap();
    cache.connect(&cancel).await.unwrap();

    assert_eq!(service.counts().tables_created, 1);
    assert_eq!(service.counts().ensure_table_calls, 1);
}

#[tokio::test]
async fn test_caches_share_rows_through_the_table() {
    let service = MemoryTableService::new();
    let config = CacheConfig::with_connection_string("UseDevelopmentStorage=true", TABLE, PARTITION).unwrap();
    let writer = TableCache::new(config.clone(), MemoryConnector::new(service.clone())).unwrap();
    let reader = TableCache::new(config, MemoryConnector::new(service)).unwrap();
    let cancel = CancellationToken::new();

    writer.set("shared", b"payload", &EntryOptions::new(), &cancel).await.unwrap();
    assert_eq!(reader.get("shared", &cancel).await.unwrap(), Some(b"payload".to_vec()));

    reader.remove("shared", &cancel).await.unwrap();
    assert_eq!(writer.get("shared", &cancel).await.unwrap(), None);
}
