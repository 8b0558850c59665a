//! Market data endpoints

use airdrop_core::TickerEntry;
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the capture time of the served snapshot
pub const CAPTURED_AT_HEADER: &str = "x-snapshot-captured-at";

/// Snapshot with its capture time and staleness
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub data: Vec<TickerEntry>,
    pub captured_at: DateTime<Utc>,
    /// True when the snapshot is older than the freshness window
    pub stale: bool,
}

/// Create market routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/market/ticker", get(get_ticker))
        .route("/market/snapshot", get(get_snapshot))
}

/// Current prices as a plain ticker array
async fn get_ticker(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.market_cache.get_snapshot().await?;
    debug!("Serving ticker captured at {}", snapshot.captured_at);

    let captured_at = snapshot
        .captured_at
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&captured_at) {
        headers.insert(CAPTURED_AT_HEADER, value);
    }

    Ok((headers, Json(snapshot.ticker())))
}

/// Current prices with capture time and staleness
async fn get_snapshot(State(state): State<AppState>) -> Result<Json<SnapshotResponse>, ApiError> {
    let cache = &state.market_cache;
    let snapshot = cache.get_snapshot().await?;

    Ok(Json(SnapshotResponse {
        data: snapshot.ticker(),
        captured_at: snapshot.captured_at,
        stale: !snapshot.is_fresh_at(cache.now(), cache.freshness_window()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{get, json_body, send, state};
    use axum::http::StatusCode;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_ticker_returns_array_with_capture_header() {
        let response = send(state(Some(dec!(64000.5))), get("/api/market/ticker")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CAPTURED_AT_HEADER],
            "2023-11-14T22:13:20.000Z"
        );

        let body = json_body(response).await;
        assert_eq!(body[0]["symbol"], "BITCOIN");
        assert_eq!(body[0]["price"], 64000.5);
        assert_eq!(body[0]["change"], 1.0);
        assert_eq!(body[1]["symbol"], "ETHEREUM");
    }

    #[tokio::test]
    async fn test_cold_start_failure_is_500() {
        let response = send(state(None), get("/api/market/ticker")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({ "message": "Failed to fetch market data" })
        );
    }

    #[tokio::test]
    async fn test_snapshot_reports_staleness() {
        let response = send(state(Some(dec!(1))), get("/api/market/snapshot")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["stale"], false);
        assert_eq!(body["capturedAt"], "2023-11-14T22:13:20Z");
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }
}
