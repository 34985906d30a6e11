//! Snapshot store integration tests.
//!
//! The Redis tests need a reachable server. Run with:
//! `REDIS_URL=redis://127.0.0.1:6379 cargo test -p topup-store -- --ignored`

use std::collections::BTreeMap;
use std::time::Duration;

use topup_core::RateSnapshot;
use topup_store::{get_cbor, keys, set_cbor, MemoryStore, SnapshotStore};

fn snapshot() -> RateSnapshot {
    RateSnapshot {
        base: "HKD".into(),
        rates: BTreeMap::from([("HKD".to_string(), 1.0), ("JPY".to_string(), 18.9)]),
        last_update: 1_700_000_000,
        next_update: 1_700_086_400,
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[tokio::test]
async fn rate_snapshot_survives_cbor_storage() {
    let store = MemoryStore::new();

    set_cbor(&store, keys::EXCHANGE_RATES, &snapshot(), None)
        .await
        .unwrap();
    let loaded: Option<RateSnapshot> = get_cbor(&store, keys::EXCHANGE_RATES).await.unwrap();

    assert_eq!(loaded, Some(snapshot()));
}

#[tokio::test]
async fn missing_key_is_none() {
    let store = MemoryStore::new();
    let loaded: Option<RateSnapshot> = get_cbor(&store, keys::EXCHANGE_RATES).await.unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn corrupt_blob_is_a_serialization_error() {
    let store = MemoryStore::new();
    store
        .set_raw(keys::EXCHANGE_RATES, vec![0xff, 0x00, 0x13], None)
        .await
        .unwrap();

    let result: topup_store::Result<Option<RateSnapshot>> =
        get_cbor(&store, keys::EXCHANGE_RATES).await;
    assert!(matches!(
        result,
        Err(topup_store::StoreError::Serialization(_))
    ));
}

#[tokio::test]
async fn works_through_trait_object() {
    let store: Box<dyn SnapshotStore> = Box::new(MemoryStore::new());
    set_cbor(store.as_ref(), "answer", &42u32, None).await.unwrap();
    let value: Option<u32> = get_cbor(store.as_ref(), "answer").await.unwrap();
    assert_eq!(value, Some(42));
}

// ============================================================================
// Redis backend
// ============================================================================

#[cfg(feature = "redis-backend")]
#[tokio::test]
#[ignore = "requires Redis"]
async fn redis_roundtrip() {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
    let store = topup_store::RedisStore::connect(&url, "topup-test")
        .await
        .expect("Failed to connect to Redis");

    set_cbor(&store, keys::EXCHANGE_RATES, &snapshot(), Some(Duration::from_secs(30)))
        .await
        .unwrap();
    let loaded: Option<RateSnapshot> = get_cbor(&store, keys::EXCHANGE_RATES).await.unwrap();

    assert_eq!(loaded, Some(snapshot()));
}
