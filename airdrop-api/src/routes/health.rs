//! Health check endpoints

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    market: MarketHealth,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarketHealth {
    has_snapshot: bool,
    snapshot_age_ms: Option<u64>,
    subscribers: usize,
    upstream_fetches: u64,
    upstream_failures: u64,
}

/// Health check handler
///
/// Degraded when the snapshot is missing or older than the freshness window.
async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let stats = state.market_cache.stats();

    let status = if stats.is_fresh {
        "healthy"
    } else {
        "degraded"
    };

    let response = HealthResponse {
        status: status.to_string(),
        market: MarketHealth {
            has_snapshot: stats.has_snapshot,
            snapshot_age_ms: stats
                .snapshot_age
                .map(|age| u64::try_from(age.as_millis()).unwrap_or(u64::MAX)),
            subscribers: state.fanout.subscriber_count(),
            upstream_fetches: stats.upstream_fetches,
            upstream_failures: stats.upstream_failures,
        },
    };

    // A cold cache is normal until the first request, so this stays 200
    (StatusCode::OK, Json(response))
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
