//! API route definitions

mod airdrops;
mod comments;
mod health;
mod market;
pub mod ws;

use axum::Router;
use crate::AppState;

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(market::routes())
        .merge(airdrops::routes())
        .merge(comments::routes())
        .merge(health::routes())
}

/// Create WebSocket routes (separate from API)
pub fn ws_routes() -> Router<AppState> {
    ws::routes()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Router fixtures for handler tests

    use airdrop_core::{AirdropError, AirdropResult, PriceEntry, PriceSource};
    use airdrop_services::{
        AirdropCatalog, BlocklistClassifier, CommentService, ManualClock, MarketDataCache,
        MarketDataConfig, ModerationPolicy, RetryPolicy, UpdateFanout, WebSocketState,
    };
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, Response};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::{build_router, AppState};

    /// Serves fixed prices, or always fails when `prices` is `None`
    pub struct FixedSource {
        pub prices: Option<Decimal>,
    }

    #[async_trait]
    impl PriceSource for FixedSource {
        async fn fetch_prices(
            &self,
            ids: &[String],
        ) -> AirdropResult<HashMap<String, PriceEntry>> {
            match self.prices {
                Some(price) => Ok(ids
                    .iter()
                    .map(|id| (id.clone(), PriceEntry::new(price, Decimal::ONE)))
                    .collect()),
                None => Err(AirdropError::network("connection refused")),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    pub fn state(prices: Option<Decimal>) -> AppState {
        let config = MarketDataConfig {
            tracked_coins: vec!["bitcoin".to_string(), "ethereum".to_string()],
            retry: RetryPolicy::new(0, Duration::from_millis(1)),
            ..MarketDataConfig::default()
        };
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let market_cache = Arc::new(MarketDataCache::from_config(
            &config,
            Arc::new(FixedSource { prices }),
            clock.clone(),
        ));
        let fanout = Arc::new(UpdateFanout::new(
            Arc::clone(&market_cache),
            config.fanout_interval,
        ));
        AppState {
            market_cache,
            ws_state: Arc::new(WebSocketState::new(Arc::clone(&fanout))),
            fanout,
            catalog: Arc::new(AirdropCatalog::with_samples(clock.clone())),
            comments: Arc::new(CommentService::new(
                Arc::new(BlocklistClassifier::parse("violence:kill|attack").unwrap()),
                ModerationPolicy::default(),
                clock,
            )),
        }
    }

    pub async fn send(state: AppState, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        build_router(state).oneshot(request).await.unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    pub fn post_json(uri: &str, json: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    pub async fn json_body(response: Response<Body>) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
