//! Market data provider trait definitions.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Quote, QuoteSource, Session};

/// A live quote source in the fallback chain.
///
/// Fetching and parsing are split so the orchestrator can classify the raw
/// body before any parser sees it. Providers never retry, throttle or apply
/// timeouts themselves; the orchestrator does all of that around them.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier, e.g. "NSE" or "YAHOO".
    ///
    /// Used for logging, throttle keys, circuit breaker and statistics.
    fn id(&self) -> &'static str;

    /// Provenance stamped on quotes from this provider.
    fn source(&self) -> QuoteSource;

    /// Whether calls must carry the shared cookie session.
    fn requires_session(&self) -> bool {
        false
    }

    /// Perform the HTTP call and return the raw body of a 2xx response.
    ///
    /// Non-2xx statuses are mapped with [`check_status`](super::check_status).
    async fn fetch(&self, symbol: &str, session: Option<&Session>)
        -> Result<Vec<u8>, MarketDataError>;

    /// Parse a body already classified as JSON into a quote for `symbol`.
    fn parse_quote(&self, symbol: &str, body: &[u8]) -> Result<Quote, MarketDataError>;
}
