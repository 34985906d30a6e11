//! Shared snapshot cache for the top-up service.
//!
//! The service keeps a few small, slowly-changing values (currently the
//! exchange-rate snapshot) in a cache shared by every instance, so that a
//! freshly started instance can serve them without calling the upstream
//! source first. Values are stored as CBOR blobs.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> topup_store::Result<()> {
//! use topup_store::{keys, MemoryStore};
//!
//! let store = MemoryStore::new();
//! topup_store::set_cbor(&store, keys::EXCHANGE_RATES, &vec![1u32, 2, 3], None).await?;
//! let _back: Option<Vec<u32>> = topup_store::get_cbor(&store, keys::EXCHANGE_RATES).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "redis-backend")]
pub use redis_store::RedisStore;

/// A key/value store for opaque blobs.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Fetch the blob under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, optionally expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    async fn set_raw(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;
}

/// Encode a value as CBOR.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the value cannot be encoded.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Decode a value from CBOR.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the bytes are not a valid encoding of `T`.
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Fetch and decode a CBOR value.
///
/// # Errors
///
/// Returns an error if the backend fails or the stored blob does not decode.
pub async fn get_cbor<T, S>(store: &S, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: SnapshotStore + ?Sized,
{
    store
        .get_raw(key)
        .await?
        .map(|data| decode(&data))
        .transpose()
}

/// Encode and store a CBOR value.
///
/// # Errors
///
/// Returns an error if encoding or the backend fails.
pub async fn set_cbor<T, S>(store: &S, key: &str, value: &T, ttl: Option<Duration>) -> Result<()>
where
    T: Serialize + ?Sized,
    S: SnapshotStore + ?Sized,
{
    let data = encode(value)?;
    store.set_raw(key, data, ttl).await
}
