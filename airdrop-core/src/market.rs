//! Market price data structures

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Price of one tracked symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceEntry {
    /// Price in USD
    pub price: Decimal,
    /// 24-hour percentage change
    pub change_percent_24h: Decimal,
}

impl PriceEntry {
    pub fn new(price: Decimal, change_percent_24h: Decimal) -> Self {
        Self {
            price,
            change_percent_24h,
        }
    }
}

/// The full set of tracked prices captured at one instant
///
/// A snapshot is always complete for the symbol set it was fetched for.
/// It is never mutated after construction; the cache replaces it whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSnapshot {
    /// Canonical (uppercase) symbol -> price, in tracked-symbol order
    pub entries: IndexMap<String, PriceEntry>,
    /// When the snapshot was fetched from upstream
    pub captured_at: DateTime<Utc>,
}

impl PriceSnapshot {
    pub fn new(entries: IndexMap<String, PriceEntry>, captured_at: DateTime<Utc>) -> Self {
        Self {
            entries,
            captured_at,
        }
    }

    /// Age of the snapshot at `now`. A capture time in the future counts as zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.captured_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the snapshot may still be served without refetching
    pub fn is_fresh_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.age_at(now) < window
    }

    /// Look up one symbol
    pub fn get(&self, symbol: &str) -> Option<&PriceEntry> {
        self.entries.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wire form used by the ticker endpoint and live updates
    pub fn ticker(&self) -> Vec<TickerEntry> {
        self.entries
            .iter()
            .map(|(symbol, entry)| TickerEntry {
                symbol: symbol.clone(),
                price: entry.price,
                change: entry.change_percent_24h,
            })
            .collect()
    }
}

/// One row of the public ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerEntry {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub change: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn snapshot_at(secs: i64) -> PriceSnapshot {
        let mut entries = IndexMap::new();
        entries.insert("BITCOIN".to_string(), PriceEntry::new(dec!(65000), dec!(2.5)));
        entries.insert("ETHEREUM".to_string(), PriceEntry::new(dec!(3500), dec!(-1.25)));
        PriceSnapshot::new(entries, Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn test_freshness_window_is_exclusive() {
        let snapshot = snapshot_at(1_000);
        let window = Duration::from_secs(10);

        assert!(snapshot.is_fresh_at(Utc.timestamp_opt(1_005, 0).unwrap(), window));
        assert!(!snapshot.is_fresh_at(Utc.timestamp_opt(1_010, 0).unwrap(), window));
        assert!(!snapshot.is_fresh_at(Utc.timestamp_opt(1_011, 0).unwrap(), window));
    }

    #[test]
    fn test_future_capture_counts_as_fresh() {
        let snapshot = snapshot_at(1_000);
        let now = Utc.timestamp_opt(990, 0).unwrap();
        assert_eq!(snapshot.age_at(now), Duration::ZERO);
        assert!(snapshot.is_fresh_at(now, Duration::from_secs(1)));
    }

    #[test]
    fn test_ticker_keeps_symbol_order() {
        let ticker = snapshot_at(0).ticker();
        assert_eq!(ticker.len(), 2);
        assert_eq!(ticker[0].symbol, "BITCOIN");
        assert_eq!(ticker[1].symbol, "ETHEREUM");
        assert_eq!(ticker[1].change, dec!(-1.25));
    }

    #[test]
    fn test_ticker_serializes_numbers() {
        let ticker = snapshot_at(0).ticker();
        let json = serde_json::to_value(&ticker[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "symbol": "BITCOIN", "price": 65000.0, "change": 2.5 })
        );
    }
}
