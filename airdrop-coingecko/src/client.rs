//! CoinGecko API client
//!
//! Provides the `simple/price` call used to build price snapshots.

use airdrop_core::{AirdropError, AirdropResult, PriceEntry, PriceSource};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::types::{into_price_entries, SimplePriceResponse};

/// Base URL for the public CoinGecko API
pub const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko API client
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
}

impl CoinGeckoClient {
    /// Create a client against the public API with a per-request timeout
    pub fn new(timeout: Duration) -> AirdropResult<Self> {
        Self::with_base_url(COINGECKO_API_BASE, timeout)
    }

    /// Create a client against a different deployment (pro API, proxy, test server)
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> AirdropResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AirdropError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the `simple/price` URL for a set of coin ids
    pub fn simple_price_url(&self, ids: &[String]) -> AirdropResult<Url> {
        Url::parse_with_params(
            &format!("{}/simple/price", self.base_url),
            &[
                ("ids", ids.join(",")),
                ("vs_currencies", "usd".to_string()),
                ("include_24hr_change", "true".to_string()),
            ],
        )
        .map_err(|e| AirdropError::config(format!("Invalid CoinGecko URL: {}", e)))
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    #[instrument(skip(self))]
    async fn fetch_prices(&self, ids: &[String]) -> AirdropResult<HashMap<String, PriceEntry>> {
        let url = self.simple_price_url(ids)?;

        debug!("Fetching CoinGecko prices from: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AirdropError::network(format!("CoinGecko request timed out: {}", e))
            } else {
                AirdropError::network(format!("Failed to fetch prices: {}", e))
            }
        })?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(AirdropError::api("CoinGecko rate limit exceeded"));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AirdropError::api(format!(
                "CoinGecko API error ({}): {}",
                status, body
            )));
        }

        let prices: SimplePriceResponse = response
            .json()
            .await
            .map_err(|e| AirdropError::parse(format!("Failed to parse price response: {}", e)))?;

        Ok(into_price_entries(prices))
    }

    fn name(&self) -> &str {
        "coingecko"
    }
}
