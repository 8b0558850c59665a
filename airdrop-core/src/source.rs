//! Upstream price provider abstraction

use async_trait::async_trait;
use std::collections::HashMap;

use crate::{AirdropResult, PriceEntry};

/// A remote price API
///
/// Implementations perform exactly one request per call; retrying is the
/// caller's job.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch quotes for the given provider identifiers.
    ///
    /// Keys of the returned map are the provider's own identifiers
    /// (e.g. `bitcoin`), not canonical symbols.
    async fn fetch_prices(&self, ids: &[String]) -> AirdropResult<HashMap<String, PriceEntry>>;

    /// Short name used in logs
    fn name(&self) -> &str;
}
