//! Upstream fetcher
//!
//! Performs one logical "fetch every tracked symbol" operation against a
//! [`PriceSource`], retrying transient failures with exponential backoff.

use airdrop_core::{AirdropError, AirdropResult, MarketDataError, PriceSnapshot, PriceSource};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::RetryPolicy;

/// Retry bookkeeping for a single fetch operation
#[derive(Debug, Default)]
struct RetryState {
    attempt_count: u32,
    last_error: Option<AirdropError>,
}

/// Fetches complete snapshots from the price provider
pub struct UpstreamFetcher {
    source: Arc<dyn PriceSource>,
    /// Provider ids, in snapshot order
    coins: Vec<String>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl UpstreamFetcher {
    pub fn new(
        source: Arc<dyn PriceSource>,
        coins: Vec<String>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            coins,
            retry,
            clock,
        }
    }

    /// Provider ids this fetcher asks for
    pub fn coins(&self) -> &[String] {
        &self.coins
    }

    /// Fetch a complete snapshot, retrying up to `max_retries` times.
    ///
    /// Waits `base_delay * 2^n` before retry `n + 1`. Returns
    /// [`MarketDataError::UpstreamUnavailable`] once retries are exhausted.
    pub async fn fetch(&self) -> Result<PriceSnapshot, MarketDataError> {
        let mut state = RetryState::default();

        loop {
            match self.attempt().await {
                Ok(snapshot) => {
                    if state.attempt_count > 0 {
                        info!(
                            source = self.source.name(),
                            attempts = state.attempt_count + 1,
                            "Upstream fetch recovered after retries"
                        );
                    }
                    return Ok(snapshot);
                }
                Err(e) => {
                    state.last_error = Some(e);
                    if state.attempt_count >= self.retry.max_retries {
                        break;
                    }

                    let delay = self.retry.delay_for(state.attempt_count);
                    warn!(
                        source = self.source.name(),
                        symbols = ?self.coins,
                        attempt = state.attempt_count + 1,
                        max_retries = self.retry.max_retries,
                        "Upstream fetch failed ({}), retrying in {:?}",
                        state.last_error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    state.attempt_count += 1;
                }
            }
        }

        let attempts = state.attempt_count + 1;
        let reason = state
            .last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string());

        error!(
            source = self.source.name(),
            symbols = ?self.coins,
            attempts,
            at = %self.clock.now(),
            "Upstream fetch gave up: {}",
            reason
        );

        Err(MarketDataError::UpstreamUnavailable { attempts, reason })
    }

    /// One request; an incomplete response counts as a failure
    async fn attempt(&self) -> AirdropResult<PriceSnapshot> {
        let quotes = self.source.fetch_prices(&self.coins).await?;

        let mut entries = IndexMap::with_capacity(self.coins.len());
        let mut missing = Vec::new();
        for coin in &self.coins {
            match quotes.get(coin) {
                Some(entry) => {
                    entries.insert(canonical_symbol(coin), *entry);
                }
                None => missing.push(coin.as_str()),
            }
        }

        if !missing.is_empty() {
            return Err(AirdropError::api(format!(
                "response missing {}",
                missing.join(", ")
            )));
        }

        debug!("Fetched {} prices from {}", entries.len(), self.source.name());
        Ok(PriceSnapshot::new(entries, self.clock.now()))
    }
}

impl std::fmt::Debug for UpstreamFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamFetcher")
            .field("source", &self.source.name())
            .field("coins", &self.coins)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Canonical symbol for a provider id (`bitcoin` -> `BITCOIN`)
pub fn canonical_symbol(provider_id: &str) -> String {
    provider_id.trim().to_uppercase()
}
