//! Airdrop Hub API Server
//!
//! Serves cached crypto market data over HTTP and WebSocket, plus the
//! airdrop catalog and the moderated comment board.

mod error;
mod routes;

use airdrop_coingecko::CoinGeckoClient;
use airdrop_services::{
    AirdropCatalog, AirdropScraper, BlocklistClassifier, Clock, CommentService,
    HttpPageFetcher, MarketDataCache, MarketDataConfig, ModerationPolicy, ScraperConfig,
    SystemClock, UpdateFanout, WebSocketState,
};
use axum::{
    http::{header, Method},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub market_cache: Arc<MarketDataCache>,
    pub fanout: Arc<UpdateFanout>,
    pub ws_state: Arc<WebSocketState>,
    pub catalog: Arc<AirdropCatalog>,
    pub comments: Arc<CommentService>,
}

/// Build the full router for `state`
pub fn build_router(state: AppState) -> Router {
    // Configure CORS for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", routes::api_routes())
        .merge(routes::ws_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,airdrop_api=debug")),
        )
        .init();

    info!("Starting Airdrop Hub API");

    let config = MarketDataConfig::from_env()?;
    info!(
        "Tracking {:?}: freshness {:?}, fanout every {:?}, {} retries from {:?}",
        config.tracked_coins,
        config.freshness_window,
        config.fanout_interval,
        config.retry.max_retries,
        config.retry.base_delay
    );

    let coingecko = match &config.coingecko_base_url {
        Some(base_url) => CoinGeckoClient::with_base_url(base_url.as_str(), config.upstream_timeout)?,
        None => CoinGeckoClient::new(config.upstream_timeout)?,
    };
    info!("Using CoinGecko at {}", coingecko.base_url());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Market data: one cache, one fanout timer
    let market_cache = Arc::new(MarketDataCache::from_config(
        &config,
        Arc::new(coingecko),
        Arc::clone(&clock),
    ));
    let fanout = Arc::new(UpdateFanout::new(
        Arc::clone(&market_cache),
        config.fanout_interval,
    ));
    let ws_state = Arc::new(WebSocketState::new(Arc::clone(&fanout)));
    let fanout_task = Arc::clone(&fanout).spawn();

    // Catalog and comments
    let catalog = Arc::new(AirdropCatalog::with_samples(Arc::clone(&clock)));
    let scraper_task = match ScraperConfig::from_env()? {
        Some(scraper_config) => {
            let fetcher = HttpPageFetcher::new(scraper_config.timeout)?;
            let scraper = AirdropScraper::new(
                Arc::clone(&catalog),
                Arc::new(fetcher),
                scraper_config,
            );
            info!("Airdrop scraping enabled for {}", scraper.config().url);
            Some(Arc::new(scraper).spawn())
        }
        None => {
            info!("AIRDROP_SCRAPE_URL not set, airdrop scraping disabled");
            None
        }
    };
    let classifier = BlocklistClassifier::from_env()?;
    info!(
        "Comment moderation categories: {:?}",
        classifier.categories().collect::<Vec<_>>()
    );
    let comments = Arc::new(CommentService::new(
        Arc::new(classifier),
        ModerationPolicy::default(),
        clock,
    ));

    let state = AppState {
        market_cache,
        fanout,
        ws_state,
        catalog,
        comments,
    };

    let app = build_router(state);

    // Start server
    let port = std::env::var("SERVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    fanout_task.stop().await;
    if let Some(task) = scraper_task {
        task.stop().await;
    }
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
