//! Exchange-rate cache.
//!
//! Serves the current [`RateSnapshot`] with stale-while-revalidate
//! semantics: a stale snapshot is returned immediately while one background
//! task refreshes it. The latest snapshot is mirrored into the shared
//! [`SnapshotStore`] so that new instances start warm.

pub mod source;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use rand::Rng;

use topup_core::{RateSnapshot, TopupError};
use topup_store::{keys, SnapshotStore};

pub use source::{ExchangeRateApi, RateSource, RateSourceError};

/// Rate cache tuning.
#[derive(Debug, Clone, Copy)]
pub struct RateCacheConfig {
    /// Upper bound of the random freshness reduction, seconds.
    pub jitter_max_secs: u64,
    /// Bound on one upstream fetch.
    pub refresh_timeout: Duration,
}

impl Default for RateCacheConfig {
    fn default() -> Self {
        Self {
            jitter_max_secs: 7200,
            refresh_timeout: Duration::from_secs(10),
        }
    }
}

/// Process-wide holder of the current rate snapshot.
pub struct RateCache {
    holder: ArcSwapOption<RateSnapshot>,
    source: Arc<dyn RateSource>,
    store: Arc<dyn SnapshotStore>,
    config: RateCacheConfig,
}

impl std::fmt::Debug for RateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateCache")
            .field("current", &self.holder.load_full())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RateCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new(
        source: Arc<dyn RateSource>,
        store: Arc<dyn SnapshotStore>,
        config: RateCacheConfig,
    ) -> Self {
        Self {
            holder: ArcSwapOption::empty(),
            source,
            store,
            config,
        }
    }

    /// The snapshot currently held in memory, without any I/O.
    #[must_use]
    pub fn current(&self) -> Option<Arc<RateSnapshot>> {
        self.holder.load_full()
    }

    /// Return the current rates, refreshing them when stale.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::Upstream` only when no snapshot is available and
    /// the synchronous refresh fails.
    pub async fn get_rates(self: &Arc<Self>) -> Result<Arc<RateSnapshot>, TopupError> {
        let snapshot = match self.holder.load_full() {
            Some(snapshot) => Some(snapshot),
            None => self.hydrate().await,
        };

        let now = unix_now();
        let jitter = self.draw_jitter();

        match snapshot {
            Some(snapshot) if snapshot.is_fresh(now, jitter) => Ok(snapshot),
            Some(snapshot) if snapshot.last_update > 0 => {
                tracing::debug!(
                    last_update = %snapshot.last_update,
                    "Exchange rates stale, refreshing in background"
                );
                let cache = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(e) = cache.refresh().await {
                        tracing::debug!(error = %e, "Background exchange rate refresh failed");
                    }
                });
                Ok(snapshot)
            }
            _ => self.refresh().await,
        }
    }

    /// Fetch from the source and publish the result.
    ///
    /// # Errors
    ///
    /// Returns `TopupError::Upstream` if the fetch fails or times out; the
    /// held snapshot is left untouched.
    pub async fn refresh(&self) -> Result<Arc<RateSnapshot>, TopupError> {
        let fetched = match tokio::time::timeout(
            self.config.refresh_timeout,
            self.source.fetch_latest(),
        )
        .await
        {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                tracing::error!(action = "fetch_exchange_rates", error = %e, "Failed to fetch exchange rates");
                return Err(e.into());
            }
            Err(_) => {
                tracing::error!(action = "fetch_exchange_rates", "Exchange rate fetch timed out");
                return Err(TopupError::upstream("rates", "fetch timed out"));
            }
        };

        let snapshot = Arc::new(fetched);
        self.holder.store(Some(Arc::clone(&snapshot)));

        if let Err(e) =
            topup_store::set_cbor(self.store.as_ref(), keys::EXCHANGE_RATES, snapshot.as_ref(), None)
                .await
        {
            tracing::warn!(error = %e, "Failed to persist exchange rates");
        }

        tracing::info!(
            base = %snapshot.base,
            last_update = %snapshot.last_update,
            next_update = %snapshot.next_update,
            "Exchange rates refreshed"
        );

        Ok(snapshot)
    }

    async fn hydrate(&self) -> Option<Arc<RateSnapshot>> {
        match topup_store::get_cbor::<RateSnapshot, _>(self.store.as_ref(), keys::EXCHANGE_RATES)
            .await
        {
            Ok(Some(snapshot)) => {
                let snapshot = Arc::new(snapshot);
                self.holder.store(Some(Arc::clone(&snapshot)));
                Some(snapshot)
            }
            Ok(None) => {
                tracing::debug!("No cached exchange rates");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cached exchange rates");
                None
            }
        }
    }

    fn draw_jitter(&self) -> u64 {
        if self.config.jitter_max_secs == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..self.config.jitter_max_secs)
    }
}

fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use topup_store::MemoryStore;

    use super::*;

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
        last_update: u64,
    }

    impl CountingSource {
        fn new(fail: bool, last_update: u64) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
                last_update,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateSource for CountingSource {
        async fn fetch_latest(&self) -> Result<RateSnapshot, RateSourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RateSourceError::Unsuccessful("error".into()));
            }
            Ok(snapshot(self.last_update, 0.2))
        }
    }

    fn snapshot(last_update: u64, usd: f32) -> RateSnapshot {
        RateSnapshot {
            base: "HKD".into(),
            rates: BTreeMap::from([("HKD".to_string(), 1.0), ("USD".to_string(), usd)]),
            last_update,
            next_update: last_update + 86_400,
        }
    }

    fn cache(source: Arc<CountingSource>, store: Arc<MemoryStore>, jitter: u64) -> Arc<RateCache> {
        Arc::new(RateCache::new(
            source,
            store,
            RateCacheConfig {
                jitter_max_secs: jitter,
                refresh_timeout: Duration::from_secs(1),
            },
        ))
    }

    async fn wait_for_calls(source: &CountingSource, n: usize) {
        for _ in 0..200 {
            if source.calls() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn fresh_snapshot_needs_no_fetch() {
        let source = CountingSource::new(false, unix_now());
        let cache = cache(source.clone(), Arc::new(MemoryStore::new()), 7200);
        cache.holder.store(Some(Arc::new(snapshot(unix_now() + 60, 0.1))));

        let rates = cache.get_rates().await.unwrap();
        assert_eq!(rates.rate("USD"), Some(0.1));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn stale_snapshot_is_served_while_one_refresh_runs() {
        let now = unix_now();
        let source = CountingSource::new(false, now);
        let cache = cache(source.clone(), Arc::new(MemoryStore::new()), 7200);
        cache.holder.store(Some(Arc::new(snapshot(now - 8000, 0.1))));

        let rates = cache.get_rates().await.unwrap();
        assert_eq!(rates.rate("USD"), Some(0.1));

        wait_for_calls(&source, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(source.calls(), 1);
        assert_eq!(cache.current().unwrap().rate("USD"), Some(0.2));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_snapshot() {
        let now = unix_now();
        let source = CountingSource::new(true, now);
        let cache = cache(source.clone(), Arc::new(MemoryStore::new()), 7200);
        let stale = Arc::new(snapshot(now - 8000, 0.1));
        cache.holder.store(Some(stale.clone()));

        let rates = cache.get_rates().await.unwrap();
        assert_eq!(rates, stale);

        wait_for_calls(&source, 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.current().unwrap(), stale);
    }

    #[tokio::test]
    async fn empty_cache_refreshes_synchronously() {
        let source = CountingSource::new(false, unix_now());
        let store = Arc::new(MemoryStore::new());
        let cache = cache(source.clone(), store.clone(), 0);

        let rates = cache.get_rates().await.unwrap();
        assert_eq!(rates.rate("USD"), Some(0.2));
        assert_eq!(source.calls(), 1);

        let persisted: Option<RateSnapshot> =
            topup_store::get_cbor(store.as_ref(), keys::EXCHANGE_RATES).await.unwrap();
        assert_eq!(persisted.as_ref(), Some(rates.as_ref()));
    }

    #[tokio::test]
    async fn empty_cache_surfaces_fetch_failure() {
        let source = CountingSource::new(true, 0);
        let cache = cache(source, Arc::new(MemoryStore::new()), 0);

        let err = cache.get_rates().await.unwrap_err();
        assert!(matches!(err, TopupError::Upstream { service: "rates", .. }));
        assert!(cache.current().is_none());
    }

    #[tokio::test]
    async fn hydrates_from_shared_store() {
        let now = unix_now();
        let store = Arc::new(MemoryStore::new());
        topup_store::set_cbor(store.as_ref(), keys::EXCHANGE_RATES, &snapshot(now + 60, 0.3), None)
            .await
            .unwrap();

        let source = CountingSource::new(false, now);
        let cache = cache(source.clone(), store, 7200);

        let rates = cache.get_rates().await.unwrap();
        assert_eq!(rates.rate("USD"), Some(0.3));
        assert_eq!(source.calls(), 0);
    }
}
