//! WebSocket connection handler
//!
//! Handles individual live connections: registers them with the fanout,
//! forwards market updates and answers diagnostic pings.

use airdrop_core::{ClientMessage, ErrorCode, ServerMessage};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use crate::fanout::{SubscriberId, UpdateFanout};

/// What to do after processing one inbound frame
#[derive(Debug, PartialEq)]
enum Inbound {
    Reply(ServerMessage),
    Ignore,
    Close,
}

/// Shared state for WebSocket handlers
#[derive(Debug, Clone)]
pub struct WebSocketState {
    pub fanout: Arc<UpdateFanout>,
}

impl WebSocketState {
    pub fn new(fanout: Arc<UpdateFanout>) -> Self {
        Self { fanout }
    }

    /// Handle a new WebSocket connection
    ///
    /// Runs until the client disconnects or the socket errors. The
    /// connection is a fanout subscriber for exactly that long.
    pub async fn handle_connection<S>(&self, socket: S)
    where
        S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Send,
    {
        let mut subscription = self.fanout.subscribe();
        let client = subscription.id();
        info!("New WebSocket connection: {}", client);

        let (mut ws_sender, mut ws_receiver) = socket.split();

        loop {
            tokio::select! {
                update = subscription.recv() => {
                    let Some(message) = update else { break };
                    if let Err(e) = Self::send(&mut ws_sender, &message).await {
                        debug!("Send to {} failed: {}", client, e);
                        break;
                    }
                }
                incoming = ws_receiver.next() => {
                    match incoming {
                        Some(Ok(msg)) => match self.handle_message(client, msg) {
                            Inbound::Reply(reply) => {
                                if let Err(e) = Self::send(&mut ws_sender, &reply).await {
                                    debug!("Send to {} failed: {}", client, e);
                                    break;
                                }
                            }
                            Inbound::Ignore => {}
                            Inbound::Close => break,
                        },
                        Some(Err(e)) => {
                            debug!("WebSocket error for {}: {}", client, e);
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        let _ = ws_sender.close().await;
        drop(subscription);
        info!("WebSocket connection closed: {}", client);
    }

    async fn send<W>(ws_sender: &mut W, message: &ServerMessage) -> Result<(), WsError>
    where
        W: Sink<Message, Error = WsError> + Unpin,
    {
        let json = match serde_json::to_string(message) {
            Ok(j) => j,
            Err(e) => {
                error!("Failed to serialize message: {}", e);
                return Ok(());
            }
        };
        ws_sender.send(Message::Text(json.into())).await
    }

    /// Handle an incoming WebSocket message
    fn handle_message(&self, client: SubscriberId, msg: Message) -> Inbound {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping { timestamp }) => Inbound::Reply(ServerMessage::Pong {
                    client_timestamp: timestamp,
                    server_timestamp: self.fanout.cache().now().timestamp_millis(),
                }),
                Err(e) => {
                    warn!("Invalid message from {}: {}", client, e);
                    Inbound::Reply(ServerMessage::Error {
                        code: ErrorCode::InvalidMessage,
                        message: format!("Invalid message: {}", e),
                    })
                }
            },
            Message::Binary(_) => Inbound::Reply(ServerMessage::Error {
                code: ErrorCode::InvalidMessage,
                message: "Binary messages not supported".to_string(),
            }),
            Message::Ping(_) | Message::Pong(_) => {
                // Control frames are answered by tungstenite itself
                Inbound::Ignore
            }
            Message::Close(_) => {
                debug!("Received close from {}", client);
                Inbound::Close
            }
            Message::Frame(_) => Inbound::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::MarketDataConfig;
    use crate::market_cache::MarketDataCache;
    use crate::test_support::ScriptedSource;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn state() -> WebSocketState {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(2, 0).unwrap()));
        let cache = Arc::new(MarketDataCache::from_config(
            &MarketDataConfig::default(),
            Arc::new(ScriptedSource::default()),
            clock,
        ));
        WebSocketState::new(Arc::new(UpdateFanout::new(cache, Duration::from_secs(30))))
    }

    #[test]
    fn test_ping_answered_with_pong() {
        let reply = state().handle_message(
            SubscriberId(1),
            Message::Text(r#"{"type":"ping","timestamp":123}"#.into()),
        );
        assert_eq!(
            reply,
            Inbound::Reply(ServerMessage::Pong {
                client_timestamp: 123,
                server_timestamp: 2_000,
            })
        );
    }

    #[test]
    fn test_invalid_and_binary_messages_get_errors() {
        let state = state();
        for msg in [
            Message::Text("not json".into()),
            Message::Text(r#"{"type":"subscribe"}"#.into()),
            Message::Binary(vec![1, 2, 3].into()),
        ] {
            match state.handle_message(SubscriberId(1), msg) {
                Inbound::Reply(ServerMessage::Error { code, .. }) => {
                    assert_eq!(code, ErrorCode::InvalidMessage)
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_close_ends_connection() {
        assert_eq!(
            state().handle_message(SubscriberId(1), Message::Close(None)),
            Inbound::Close
        );
        assert_eq!(
            state().handle_message(SubscriberId(1), Message::Ping(Vec::new().into())),
            Inbound::Ignore
        );
    }
}
