//! WebSocket infrastructure for live market updates
//!
//! Each connection becomes one fanout subscriber for as long as it is open.

mod handler;

pub use handler::WebSocketState;
