//! CoinGecko integration for the Airdrop Hub backend
//!
//! This crate provides a [`PriceSource`](airdrop_core::PriceSource) backed by
//! CoinGecko's public `simple/price` endpoint.

pub mod client;
pub mod types;

pub use client::CoinGeckoClient;
