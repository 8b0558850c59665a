//! Core types for the Airdrop Hub backend
//!
//! This crate defines the shared data structures used across the backend,
//! including price snapshots, the live-update protocol, the airdrop catalog
//! and user comments.

pub mod airdrop;
pub mod comment;
pub mod error;
pub mod market;
pub mod source;
pub mod websocket;

pub use airdrop::{Airdrop, AirdropStatus, ClaimedAirdrop, NewAirdrop, NewClaimedAirdrop};
pub use comment::{Comment, ModerationResult, ModerationStatus, NewComment};
pub use error::{AirdropError, AirdropResult, MarketDataError};
pub use market::{PriceEntry, PriceSnapshot, TickerEntry};
pub use source::PriceSource;
pub use websocket::{ClientMessage, ErrorCode, ServerMessage};
