//! Market Data Cache
//!
//! Holds the single shared price snapshot and decides when it is stale
//! enough to refetch. This is what keeps request volume against the
//! upstream provider bounded no matter how many clients are polling.

use airdrop_core::{MarketDataError, PriceSnapshot, PriceSource};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::MarketDataConfig;
use crate::upstream::UpstreamFetcher;

/// Shared snapshot cache in front of the upstream fetcher
pub struct MarketDataCache {
    /// Replaced whole on every successful fetch; readers clone the `Arc`
    snapshot: RwLock<Option<Arc<PriceSnapshot>>>,
    fetcher: UpstreamFetcher,
    clock: Arc<dyn Clock>,
    freshness_window: Duration,
    /// Present when single-flight refreshes are enabled
    refresh_guard: Option<tokio::sync::Mutex<()>>,
    /// Bumped each time a refresh completes, whether or not it succeeded
    refresh_generation: AtomicU64,
    upstream_fetches: AtomicU64,
    upstream_failures: AtomicU64,
    stale_serves: AtomicU64,
}

impl MarketDataCache {
    pub fn new(
        fetcher: UpstreamFetcher,
        clock: Arc<dyn Clock>,
        freshness_window: Duration,
        single_flight: bool,
    ) -> Self {
        Self {
            snapshot: RwLock::new(None),
            fetcher,
            clock,
            freshness_window,
            refresh_guard: single_flight.then(|| tokio::sync::Mutex::new(())),
            refresh_generation: AtomicU64::new(0),
            upstream_fetches: AtomicU64::new(0),
            upstream_failures: AtomicU64::new(0),
            stale_serves: AtomicU64::new(0),
        }
    }

    /// Build the cache and its fetcher from configuration
    pub fn from_config(
        config: &MarketDataConfig,
        source: Arc<dyn PriceSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let fetcher = UpstreamFetcher::new(
            source,
            config.tracked_coins.clone(),
            config.retry,
            Arc::clone(&clock),
        );
        Self::new(
            fetcher,
            clock,
            config.freshness_window,
            config.single_flight,
        )
    }

    /// The stored snapshot, without any I/O
    pub fn current(&self) -> Option<Arc<PriceSnapshot>> {
        self.snapshot.read().clone()
    }

    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Get a snapshot no older than the freshness window, as of now
    pub async fn get_snapshot(&self) -> Result<Arc<PriceSnapshot>, MarketDataError> {
        self.get_snapshot_at(self.clock.now()).await
    }

    /// Get a snapshot no older than the freshness window, as of `now`
    ///
    /// Fresh snapshots are returned without I/O. Otherwise upstream is
    /// fetched; if that fails the previous snapshot is served stale, and only
    /// when there is none does this return [`MarketDataError::DataUnavailable`].
    pub async fn get_snapshot_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Arc<PriceSnapshot>, MarketDataError> {
        if let Some(snapshot) = self.fresh_at(now) {
            debug!("Serving cached snapshot from {}", snapshot.captured_at);
            return Ok(snapshot);
        }

        match &self.refresh_guard {
            Some(guard) => {
                let observed = self.refresh_generation.load(Ordering::Acquire);
                let _refreshing = guard.lock().await;
                if let Some(snapshot) = self.fresh_at(now) {
                    debug!("Snapshot refreshed by a concurrent caller");
                    return Ok(snapshot);
                }
                // A refresh completed while we waited; share its outcome
                if self.refresh_generation.load(Ordering::Acquire) != observed {
                    return self.after_failed_refresh();
                }
                self.refresh().await
            }
            None => self.refresh().await,
        }
    }

    fn fresh_at(&self, now: DateTime<Utc>) -> Option<Arc<PriceSnapshot>> {
        self.current()
            .filter(|snapshot| snapshot.is_fresh_at(now, self.freshness_window))
    }

    /// Fetch upstream and replace the snapshot, masking failure with stale data
    async fn refresh(&self) -> Result<Arc<PriceSnapshot>, MarketDataError> {
        self.upstream_fetches.fetch_add(1, Ordering::Relaxed);

        let result = self.fetcher.fetch().await;
        let outcome = self.store(result);
        self.refresh_generation.fetch_add(1, Ordering::Release);
        outcome
    }

    fn store(
        &self,
        result: Result<PriceSnapshot, MarketDataError>,
    ) -> Result<Arc<PriceSnapshot>, MarketDataError> {
        match result {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.snapshot.write() = Some(Arc::clone(&snapshot));
                info!(
                    "Market snapshot refreshed: {} symbols at {}",
                    snapshot.len(),
                    snapshot.captured_at
                );
                Ok(snapshot)
            }
            Err(e) => {
                self.upstream_failures.fetch_add(1, Ordering::Relaxed);
                match self.current() {
                    Some(previous) => {
                        self.stale_serves.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            symbols = ?self.fetcher.coins(),
                            "Serving stale snapshot from {}: {}",
                            previous.captured_at,
                            e
                        );
                        Ok(previous)
                    }
                    None => {
                        error!(
                            symbols = ?self.fetcher.coins(),
                            "No market snapshot available: {}",
                            e
                        );
                        Err(MarketDataError::DataUnavailable(e.to_string()))
                    }
                }
            }
        }
    }

    /// Outcome for a caller that queued behind a refresh which failed
    fn after_failed_refresh(&self) -> Result<Arc<PriceSnapshot>, MarketDataError> {
        match self.current() {
            Some(previous) => {
                self.stale_serves.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "Serving stale snapshot from {} after a concurrent failure",
                    previous.captured_at
                );
                Ok(previous)
            }
            None => Err(MarketDataError::DataUnavailable(
                "concurrent upstream refresh failed".to_string(),
            )),
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> MarketCacheStats {
        let current = self.current();
        let now = self.clock.now();

        MarketCacheStats {
            has_snapshot: current.is_some(),
            captured_at: current.as_ref().map(|s| s.captured_at),
            snapshot_age: current.as_ref().map(|s| s.age_at(now)),
            is_fresh: current
                .as_ref()
                .is_some_and(|s| s.is_fresh_at(now, self.freshness_window)),
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            stale_serves: self.stale_serves.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for MarketDataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataCache")
            .field("fetcher", &self.fetcher)
            .field("freshness_window", &self.freshness_window)
            .field("single_flight", &self.refresh_guard.is_some())
            .finish()
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct MarketCacheStats {
    pub has_snapshot: bool,
    pub captured_at: Option<DateTime<Utc>>,
    pub snapshot_age: Option<Duration>,
    pub is_fresh: bool,
    /// Logical fetch operations started (each may retry)
    pub upstream_fetches: u64,
    /// Fetch operations that exhausted their retries
    pub upstream_failures: u64,
    /// Failures masked by serving the previous snapshot
    pub stale_serves: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::RetryPolicy;
    use crate::test_support::{ScriptedSource, Step};
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio::time::Instant;

    const COINS: &[&str] = &["bitcoin", "ethereum", "solana"];

    fn cache_with(
        source: Arc<ScriptedSource>,
        clock: Arc<ManualClock>,
        single_flight: bool,
    ) -> MarketDataCache {
        let config = MarketDataConfig {
            tracked_coins: COINS.iter().map(|c| c.to_string()).collect(),
            freshness_window: Duration::from_secs(10),
            retry: RetryPolicy::new(3, Duration::from_secs(5)),
            single_flight,
            ..MarketDataConfig::default()
        };
        MarketDataCache::from_config(&config, source, clock)
    }

    fn epoch_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.timestamp_opt(0, 0).unwrap()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_snapshot_served_without_upstream_call() {
        let source = Arc::new(ScriptedSource::new(vec![Step::prices(COINS, dec!(65000))]));
        let clock = epoch_clock();
        let cache = cache_with(source.clone(), clock.clone(), true);

        let first = cache.get_snapshot().await.unwrap();
        for _ in 0..5 {
            clock.advance(Duration::from_secs(1));
            let again = cache.get_snapshot().await.unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }

        assert_eq!(source.calls(), 1);
        assert_eq!(cache.stats().upstream_fetches, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_snapshot_masks_upstream_failure() {
        // t=0 fetch ok; t=5s cached; t=11s refetch fails on every retry
        let source = Arc::new(ScriptedSource::new(vec![Step::prices(COINS, dec!(65000))]));
        let clock = epoch_clock();
        let cache = cache_with(source.clone(), clock.clone(), true);

        let original = cache.get_snapshot().await.unwrap();
        assert_eq!(source.calls(), 1);

        clock.advance(Duration::from_secs(5));
        cache.get_snapshot().await.unwrap();
        assert_eq!(source.calls(), 1);

        clock.advance(Duration::from_secs(6));
        let served = cache.get_snapshot().await.unwrap();
        assert_eq!(source.calls(), 1 + 4);
        assert!(Arc::ptr_eq(&original, &served));
        assert_eq!(served.captured_at.timestamp(), 0);

        let stats = cache.stats();
        assert_eq!(stats.upstream_failures, 1);
        assert_eq!(stats.stale_serves, 1);
        assert!(!stats.is_fresh);
        assert_eq!(stats.snapshot_age, Some(Duration::from_secs(11)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_start_failure_is_data_unavailable() {
        let source = Arc::new(ScriptedSource::default());
        let cache = cache_with(source.clone(), epoch_clock(), true);

        let err = cache.get_snapshot().await.unwrap_err();
        assert!(matches!(err, MarketDataError::DataUnavailable(_)));
        assert_eq!(source.calls(), 4);
        assert!(cache.current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_keeps_previous_snapshot() {
        let source = Arc::new(ScriptedSource::new(vec![Step::prices(COINS, dec!(1))]));
        let clock = epoch_clock();
        let cache = cache_with(source.clone(), clock.clone(), true);

        cache.get_snapshot().await.unwrap();
        // incomplete responses on every attempt
        for _ in 0..4 {
            source.push(Step::prices(&["bitcoin"], dec!(99)));
        }

        clock.advance(Duration::from_secs(30));
        let served = cache.get_snapshot().await.unwrap();
        assert_eq!(served.len(), 3);
        assert!(served.entries.values().all(|e| e.price == dec!(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_collapses_concurrent_refreshes() {
        let source = Arc::new(ScriptedSource::new(vec![
            Step::prices(COINS, dec!(5)).after(Duration::from_secs(1)),
        ]));
        let cache = cache_with(source.clone(), epoch_clock(), true);

        let (a, b, c) = tokio::join!(
            cache.get_snapshot(),
            cache.get_snapshot(),
            cache.get_snapshot()
        );

        assert_eq!(source.calls(), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(c.unwrap().get("SOLANA").unwrap().price, dec!(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_stale_callers_share_one_failed_refresh() {
        let source = Arc::new(ScriptedSource::new(vec![Step::prices(COINS, dec!(65000))]));
        let clock = epoch_clock();
        let cache = cache_with(source.clone(), clock.clone(), true);
        let original = cache.get_snapshot().await.unwrap();

        clock.advance(Duration::from_secs(11));
        let start = Instant::now();
        let shared = &cache;
        let timed = move || async move {
            let result = shared.get_snapshot().await;
            (result, start.elapsed())
        };
        let (a, b, c) = tokio::join!(timed(), timed(), timed());

        // one retry sequence: first attempt plus three retries
        assert_eq!(source.calls(), 1 + 4);
        for (result, elapsed) in [a, b, c] {
            assert!(Arc::ptr_eq(&result.unwrap(), &original));
            assert_eq!(elapsed, Duration::from_secs(35));
        }

        let stats = cache.stats();
        assert_eq!(stats.upstream_fetches, 2);
        assert_eq!(stats.upstream_failures, 1);
        assert_eq!(stats.stale_serves, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_cold_callers_share_one_failed_refresh() {
        let source = Arc::new(ScriptedSource::default());
        let cache = cache_with(source.clone(), epoch_clock(), true);

        let (a, b) = tokio::join!(cache.get_snapshot(), cache.get_snapshot());
        assert!(matches!(a, Err(MarketDataError::DataUnavailable(_))));
        assert!(matches!(b, Err(MarketDataError::DataUnavailable(_))));
        assert_eq!(source.calls(), 4);

        // a later caller starts its own attempt
        source.push(Step::prices(COINS, dec!(9)));
        assert!(cache.get_snapshot().await.is_ok());
        assert_eq!(source.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_fetches_last_completed_wins() {
        // Without single-flight both callers fetch. The first call is slower,
        // so it completes last and its data must be what stays stored.
        let source = Arc::new(ScriptedSource::new(vec![
            Step::prices(COINS, dec!(100)).after(Duration::from_secs(2)),
            Step::prices(COINS, dec!(200)).after(Duration::from_secs(1)),
        ]));
        let cache = cache_with(source.clone(), epoch_clock(), false);

        let (slow, fast) = tokio::join!(cache.get_snapshot(), cache.get_snapshot());
        assert_eq!(source.calls(), 2);
        assert_eq!(slow.unwrap().get("BITCOIN").unwrap().price, dec!(100));
        assert_eq!(fast.unwrap().get("BITCOIN").unwrap().price, dec!(200));

        let stored = cache.current().unwrap();
        let prices: Vec<Decimal> = stored.entries.values().map(|e| e.price).collect();
        assert_eq!(prices, vec![dec!(100); 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_instant_controls_freshness() {
        let source = Arc::new(ScriptedSource::new(vec![
            Step::prices(COINS, dec!(1)),
            Step::prices(COINS, dec!(2)),
        ]));
        let cache = cache_with(source.clone(), epoch_clock(), true);

        cache.get_snapshot_at(Utc.timestamp_opt(0, 0).unwrap()).await.unwrap();
        cache.get_snapshot_at(Utc.timestamp_opt(9, 0).unwrap()).await.unwrap();
        assert_eq!(source.calls(), 1);

        cache.get_snapshot_at(Utc.timestamp_opt(10, 0).unwrap()).await.unwrap();
        assert_eq!(source.calls(), 2);
    }
}
