//! Market data configuration
//!
//! Every timing constant of the cache, the retry loop and the fanout lives
//! here so each can be tuned (and tested) independently.

use std::env;
use std::time::Duration;

/// Coins tracked when `TRACKED_COINS` is unset
pub const DEFAULT_TRACKED_COINS: &[&str] = &["bitcoin", "ethereum", "solana"];

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each further retry
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `attempt + 1`: `base_delay * 2^attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(5_000))
    }
}

/// Configuration for the market data cache, fetcher and fanout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDataConfig {
    /// Provider coin ids (lowercase), in display order
    pub tracked_coins: Vec<String>,
    /// Maximum snapshot age served without refetching
    pub freshness_window: Duration,
    /// Push cadence to live subscribers
    pub fanout_interval: Duration,
    pub retry: RetryPolicy,
    /// Timeout of a single upstream HTTP call
    pub upstream_timeout: Duration,
    /// Collapse concurrent refreshes into one upstream fetch
    pub single_flight: bool,
    /// Override of the CoinGecko API base URL
    pub coingecko_base_url: Option<String>,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            tracked_coins: DEFAULT_TRACKED_COINS.iter().map(|c| c.to_string()).collect(),
            freshness_window: Duration::from_millis(30_000),
            fanout_interval: Duration::from_millis(30_000),
            retry: RetryPolicy::default(),
            upstream_timeout: Duration::from_millis(5_000),
            single_flight: true,
            coingecko_base_url: None,
        }
    }
}

impl MarketDataConfig {
    /// Load configuration from environment variables
    ///
    /// Recognized (all optional):
    /// - TRACKED_COINS: comma-separated CoinGecko ids
    /// - FRESHNESS_WINDOW_MS, FANOUT_INTERVAL_MS, UPSTREAM_TIMEOUT_MS
    /// - MAX_RETRIES, RETRY_BASE_DELAY_MS
    /// - SINGLE_FLIGHT: true/false
    /// - COINGECKO_BASE_URL
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let tracked_coins = match lookup("TRACKED_COINS") {
            Some(raw) => parse_coin_list(&raw)?,
            None => defaults.tracked_coins,
        };

        let freshness_window =
            parse_millis(&lookup, "FRESHNESS_WINDOW_MS")?.unwrap_or(defaults.freshness_window);
        let fanout_interval =
            parse_millis(&lookup, "FANOUT_INTERVAL_MS")?.unwrap_or(defaults.fanout_interval);
        if fanout_interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "FANOUT_INTERVAL_MS".to_string(),
            });
        }

        let upstream_timeout =
            parse_millis(&lookup, "UPSTREAM_TIMEOUT_MS")?.unwrap_or(defaults.upstream_timeout);
        if upstream_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "UPSTREAM_TIMEOUT_MS".to_string(),
            });
        }

        let max_retries = match lookup("MAX_RETRIES") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| ConfigError::InvalidNumber {
                field: "MAX_RETRIES".to_string(),
                value: raw,
            })?,
            None => defaults.retry.max_retries,
        };
        let base_delay =
            parse_millis(&lookup, "RETRY_BASE_DELAY_MS")?.unwrap_or(defaults.retry.base_delay);

        let single_flight = match lookup("SINGLE_FLIGHT") {
            Some(raw) => parse_bool("SINGLE_FLIGHT", &raw)?,
            None => defaults.single_flight,
        };

        let coingecko_base_url = lookup("COINGECKO_BASE_URL").filter(|url| !url.trim().is_empty());

        Ok(Self {
            tracked_coins,
            freshness_window,
            fanout_interval,
            retry: RetryPolicy::new(max_retries, base_delay),
            upstream_timeout,
            single_flight,
            coingecko_base_url,
        })
    }
}

/// Configuration for the scheduled airdrop scraper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperConfig {
    /// Listing page to scrape
    pub url: String,
    /// Time between runs; the first run starts immediately
    pub interval: Duration,
    /// Timeout of the page request
    pub timeout: Duration,
}

impl ScraperConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            interval: Duration::from_secs(30 * 60),
            timeout: Duration::from_secs(10),
        }
    }

    /// Load from the environment; `None` when `AIRDROP_SCRAPE_URL` is unset
    ///
    /// Recognized: AIRDROP_SCRAPE_URL, SCRAPE_INTERVAL_MS, SCRAPE_TIMEOUT_MS
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(url) = lookup("AIRDROP_SCRAPE_URL").filter(|url| !url.trim().is_empty()) else {
            return Ok(None);
        };
        let defaults = Self::new(url.trim());

        let interval = parse_millis(&lookup, "SCRAPE_INTERVAL_MS")?.unwrap_or(defaults.interval);
        if interval.is_zero() {
            return Err(ConfigError::ZeroDuration {
                field: "SCRAPE_INTERVAL_MS".to_string(),
            });
        }
        let timeout = parse_millis(&lookup, "SCRAPE_TIMEOUT_MS")?.unwrap_or(defaults.timeout);

        Ok(Some(Self {
            interval,
            timeout,
            ..defaults
        }))
    }
}

fn parse_coin_list(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut coins: Vec<String> = Vec::new();
    for coin in raw.split(',').map(|c| c.trim().to_lowercase()) {
        if !coin.is_empty() && !coins.contains(&coin) {
            coins.push(coin);
        }
    }

    if coins.is_empty() {
        return Err(ConfigError::EmptyCoinList);
    }
    Ok(coins)
}

fn parse_millis<F>(lookup: &F, field: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(field) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ConfigError::InvalidNumber {
                field: field.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            field: field.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid number in {field}: {value:?}")]
    InvalidNumber { field: String, value: String },

    #[error("Invalid boolean in {field}: {value:?}")]
    InvalidBool { field: String, value: String },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: String },

    #[error("TRACKED_COINS cannot be empty")]
    EmptyCoinList,

    #[error("Invalid moderation blocklist: {0}")]
    InvalidBlocklist(String),
}
