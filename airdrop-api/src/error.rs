//! HTTP error mapping

use airdrop_core::{AirdropError, MarketDataError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Message returned whenever market data cannot be served
pub const MARKET_DATA_FAILURE: &str = "Failed to fetch market data";

/// Errors surfaced by route handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Airdrop(#[from] AirdropError),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Airdrop(AirdropError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, format!("Not found: {}", msg))
            }
            ApiError::Airdrop(AirdropError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Airdrop(e) => {
                error!("Request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::MarketData(e) => {
                error!("Market data request failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    MARKET_DATA_FAILURE.to_string(),
                )
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::from(AirdropError::not_found("airdrop 9")), StatusCode::NOT_FOUND),
            (ApiError::from(AirdropError::validation("empty")), StatusCode::BAD_REQUEST),
            (ApiError::from(AirdropError::internal("boom")), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ApiError::from(MarketDataError::DataUnavailable("down".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
