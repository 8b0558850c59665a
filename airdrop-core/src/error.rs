//! Error types for the backend

use thiserror::Error;

/// Backend-wide error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AirdropError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AirdropError {
    pub fn api(msg: impl Into<String>) -> Self {
        AirdropError::Api(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        AirdropError::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        AirdropError::Parse(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AirdropError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AirdropError::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        AirdropError::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AirdropError::Internal(msg.into())
    }
}

/// Result type alias for backend operations
pub type AirdropResult<T> = Result<T, AirdropError>;

/// Failures of the market data pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    /// The price provider could not be reached after every retry
    #[error("Upstream unavailable after {attempts} attempt(s): {reason}")]
    UpstreamUnavailable { attempts: u32, reason: String },

    /// No snapshot has ever been captured and upstream is down
    #[error("Market data unavailable: {0}")]
    DataUnavailable(String),

    /// A push to one live subscriber failed
    #[error("Send to subscriber {subscriber} failed: {reason}")]
    SubscriberSendFailure { subscriber: u64, reason: String },
}
