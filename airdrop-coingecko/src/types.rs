//! CoinGecko API response types
//!
//! These types mirror the `simple/price` response and are converted
//! to airdrop-core types for use in the application.

use airdrop_core::PriceEntry;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

/// Response from GET /simple/price, keyed by coin id
pub type SimplePriceResponse = HashMap<String, CoinQuote>;

/// Quote for one coin in USD
#[derive(Debug, Clone, Deserialize)]
pub struct CoinQuote {
    /// Absent when CoinGecko has no USD price for the id
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub usd: Option<Decimal>,

    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub usd_24h_change: Option<Decimal>,
}

impl CoinQuote {
    /// Convert to a price entry; a missing 24h change counts as zero
    pub fn to_price_entry(&self) -> Option<PriceEntry> {
        let price = self.usd?;
        Some(PriceEntry::new(
            price,
            self.usd_24h_change.unwrap_or(Decimal::ZERO),
        ))
    }
}

/// Keep the quotes that carry a price
pub fn into_price_entries(response: SimplePriceResponse) -> HashMap<String, PriceEntry> {
    response
        .into_iter()
        .filter_map(|(id, quote)| quote.to_price_entry().map(|entry| (id, entry)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_simple_price() {
        let json = r#"
        {
            "bitcoin": {"usd": 65000, "usd_24h_change": 2.5},
            "ethereum": {"usd": 3500.25, "usd_24h_change": -1.75}
        }
        "#;

        let response: SimplePriceResponse = serde_json::from_str(json).unwrap();
        let entries = into_price_entries(response);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries["bitcoin"].price, dec!(65000));
        assert_eq!(entries["bitcoin"].change_percent_24h, dec!(2.5));
        assert_eq!(entries["ethereum"].change_percent_24h, dec!(-1.75));
    }

    #[test]
    fn test_missing_change_defaults_to_zero() {
        let json = r#"{"solana": {"usd": 150}, "dogecoin": {"usd": 0.1, "usd_24h_change": null}}"#;

        let entries = into_price_entries(serde_json::from_str(json).unwrap());
        assert_eq!(entries["solana"].change_percent_24h, Decimal::ZERO);
        assert_eq!(entries["dogecoin"].change_percent_24h, Decimal::ZERO);
    }

    #[test]
    fn test_quote_without_price_is_dropped() {
        let json = r#"{"bitcoin": {"usd": 65000}, "unknown-coin": {}}"#;

        let entries = into_price_entries(serde_json::from_str(json).unwrap());
        assert_eq!(entries.len(), 1);
        assert!(entries.contains_key("bitcoin"));
    }
}
