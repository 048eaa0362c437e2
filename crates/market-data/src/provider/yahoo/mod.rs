//! Yahoo Finance market data provider.
//!
//! Secondary tier. Uses the public chart API, which needs no session but
//! rate limits aggressively (HTTP 429). Yahoo lists NSE equities under a
//! `.NS` suffix; the mapping happens here and nowhere else.

mod models;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tracing::{debug, warn};
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{Quote, QuoteSource, Session};
use crate::provider::headers::browser_headers;
use crate::provider::number::decimal;
use crate::provider::{check_status, parse_error, send_error, MarketDataProvider};

use models::{YahooChartMeta, YahooChartResponse, YahooChartResult};

const PROVIDER_ID: &str = "YAHOO";

/// Default chart API host.
pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Default exchange suffix for NSE listings.
pub const DEFAULT_SYMBOL_SUFFIX: &str = ".NS";

/// Maps a canonical symbol to Yahoo's listing symbol.
///
/// The suffix is appended unless the symbol already carries an exchange
/// suffix or is an index (`^NSEI`). Applying it twice is a no-op.
///
/// ```
/// use equibot_market_data::provider::to_yahoo_symbol;
///
/// assert_eq!(to_yahoo_symbol("RELIANCE", ".NS"), "RELIANCE.NS");
/// assert_eq!(to_yahoo_symbol("RELIANCE.NS", ".NS"), "RELIANCE.NS");
/// assert_eq!(to_yahoo_symbol("^NSEI", ".NS"), "^NSEI");
/// ```
pub fn to_yahoo_symbol(symbol: &str, suffix: &str) -> String {
    if suffix.is_empty() || symbol.starts_with('^') || symbol.contains('.') {
        return symbol.to_string();
    }
    format!("{}{}", symbol, suffix)
}

/// Secondary provider: Yahoo Finance chart API.
pub struct YahooChartProvider {
    client: reqwest::Client,
    base_url: String,
    symbol_suffix: String,
}

impl YahooChartProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        symbol_suffix: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            symbol_suffix: symbol_suffix.into(),
        }
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}?interval=1d&range=1d",
            self.base_url,
            encode(&to_yahoo_symbol(symbol, &self.symbol_suffix))
        )
    }

    fn quote_from_result(
        &self,
        symbol: &str,
        result: YahooChartResult,
    ) -> Result<Quote, MarketDataError> {
        let YahooChartMeta {
            long_name,
            short_name,
            regular_market_price,
            previous_close,
            chart_previous_close,
            regular_market_day_high,
            regular_market_day_low,
            regular_market_volume,
            regular_market_time,
            ..
        } = result.meta;

        let last_price = decimal(&regular_market_price).ok_or_else(|| {
            MarketDataError::ParseFailed {
                provider: PROVIDER_ID.to_string(),
                message: format!("No regularMarketPrice for {}", symbol),
            }
        })?;

        let open = result
            .indicators
            .and_then(|i| i.quote.into_iter().next())
            .and_then(|q| q.open.into_iter().flatten().find_map(|o| o.to_decimal()));

        let timestamp = regular_market_time
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now);

        Quote::builder(symbol, last_price, QuoteSource::Secondary)
            .company_name(long_name.or(short_name))
            .previous_close(decimal(&previous_close).or_else(|| decimal(&chart_previous_close)))
            .open(open)
            .day_range(
                decimal(&regular_market_day_low),
                decimal(&regular_market_day_high),
            )
            .volume(decimal(&regular_market_volume))
            .timestamp(timestamp)
            .build()
    }
}

#[async_trait]
impl MarketDataProvider for YahooChartProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn source(&self) -> QuoteSource {
        QuoteSource::Secondary
    }

    async fn fetch(
        &self,
        symbol: &str,
        _session: Option<&Session>,
    ) -> Result<Vec<u8>, MarketDataError> {
        let url = self.chart_url(symbol);
        debug!("Fetching Yahoo chart: {}", url);

        let response = self
            .client
            .get(&url)
            .headers(browser_headers(None))
            .send()
            .await
            .map_err(|e| send_error(PROVIDER_ID, e))?;

        check_status(PROVIDER_ID, response.status())?;

        let body = response
            .bytes()
            .await
            .map_err(|e| send_error(PROVIDER_ID, e))?;

        Ok(body.to_vec())
    }

    fn parse_quote(&self, symbol: &str, body: &[u8]) -> Result<Quote, MarketDataError> {
        let data: YahooChartResponse =
            serde_json::from_slice(body).map_err(|e| parse_error(PROVIDER_ID, e))?;

        if let Some(error) = data.chart.error {
            warn!(
                "Yahoo chart error for {}: {} ({})",
                symbol,
                error.code.unwrap_or_default(),
                error.description.unwrap_or_default()
            );
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        let result = data
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        self.quote_from_result(symbol, result)
    }
}
