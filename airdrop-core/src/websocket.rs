//! WebSocket message types for live market updates
//!
//! These types define the protocol between the `/ws` endpoint and clients.
//! The only required server message is `market_update`; the client side is
//! limited to a diagnostic ping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{PriceSnapshot, TickerEntry};

// ============================================================================
// Client -> Server Messages
// ============================================================================

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ping to check the connection
    Ping {
        /// Client timestamp
        timestamp: i64,
    },
}

// ============================================================================
// Server -> Client Messages
// ============================================================================

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Latest snapshot of every tracked symbol
    MarketUpdate {
        data: Vec<TickerEntry>,
        /// When the snapshot was fetched, so clients can show staleness
        #[serde(rename = "capturedAt")]
        captured_at: DateTime<Utc>,
    },
    /// Pong response to client ping
    Pong {
        /// Echo back client timestamp
        client_timestamp: i64,
        /// Server timestamp
        server_timestamp: i64,
    },
    /// Error message
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    pub fn market_update(snapshot: &PriceSnapshot) -> Self {
        ServerMessage::MarketUpdate {
            data: snapshot.ticker(),
            captured_at: snapshot.captured_at,
        }
    }
}

/// Error codes for WebSocket errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Invalid message format
    InvalidMessage,
}
