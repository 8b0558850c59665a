//! Business logic services for the Airdrop Hub backend
//!
//! This crate provides the market data cache and its upstream fetcher,
//! the live-update fanout, the airdrop catalog with its scheduled scraper,
//! and the moderated comment board.

pub mod catalog;
pub mod clock;
pub mod comment_service;
pub mod config;
pub mod fanout;
pub mod market_cache;
pub mod moderation;
pub mod scraper;
pub mod task;
pub mod upstream;
pub mod websocket;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::AirdropCatalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use comment_service::CommentService;
pub use config::{ConfigError, MarketDataConfig, RetryPolicy, ScraperConfig};
pub use fanout::{BroadcastReport, SubscriberId, Subscription, UpdateFanout};
pub use market_cache::{MarketCacheStats, MarketDataCache};
pub use moderation::{
    BlocklistClassifier, ClassifierVerdict, ContentClassifier, ModerationPolicy,
};
pub use self::scraper::{
    parse_airdrop_cards, AirdropScraper, HttpPageFetcher, PageFetcher, ScrapeReport,
};
pub use task::BackgroundTask;
pub use upstream::UpstreamFetcher;
pub use websocket::WebSocketState;
