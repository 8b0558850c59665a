//! WebSocket route handler
//!
//! Upgrades `/ws` and hands the socket, adapted to tungstenite messages, to
//! the shared connection handler.

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{stream, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, Error as WsError};
use tracing::info;

use crate::AppState;

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let bridged = socket
        .sink_map_err(axum_error)
        .with_flat_map(|msg: tungstenite::Message| {
            stream::iter(to_axum(msg).map(Ok::<_, WsError>))
        })
        .map(|incoming| incoming.map(to_tungstenite).map_err(axum_error));

    state.ws_state.handle_connection(bridged).await;
}

fn axum_error(e: axum::Error) -> WsError {
    WsError::Io(std::io::Error::other(e))
}

fn to_tungstenite(msg: Message) -> tungstenite::Message {
    match msg {
        Message::Text(text) => tungstenite::Message::Text(text.to_string().into()),
        Message::Binary(data) => tungstenite::Message::Binary(data.to_vec().into()),
        Message::Ping(data) => tungstenite::Message::Ping(data.to_vec().into()),
        Message::Pong(data) => tungstenite::Message::Pong(data.to_vec().into()),
        Message::Close(_) => tungstenite::Message::Close(None),
    }
}

/// Raw frames have no axum equivalent and are dropped
fn to_axum(msg: tungstenite::Message) -> Option<Message> {
    match msg {
        tungstenite::Message::Text(text) => Some(Message::Text(text.to_string().into())),
        tungstenite::Message::Binary(data) => Some(Message::Binary(Bytes::from(data.to_vec()))),
        tungstenite::Message::Ping(data) => Some(Message::Ping(Bytes::from(data.to_vec()))),
        tungstenite::Message::Pong(data) => Some(Message::Pong(Bytes::from(data.to_vec()))),
        tungstenite::Message::Close(_) => Some(Message::Close(None)),
        tungstenite::Message::Frame(_) => None,
    }
}
