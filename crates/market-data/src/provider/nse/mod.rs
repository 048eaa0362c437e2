//! NSE India market data provider.
//!
//! The quote API at `/api/quote-equity` sits behind bot protection: it only
//! answers requests that look like the website's own XHR calls, i.e. carry the
//! cookies handed out by the entry page, a browser User-Agent and a Referer on
//! the quote page.

mod models;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use reqwest::header;
use tracing::debug;
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{Quote, QuoteSource, Session};
use crate::provider::headers::browser_headers;
use crate::provider::number::decimal;
use crate::provider::{check_status, parse_error, send_error, MarketDataProvider};

use models::NseQuoteResponse;

const PROVIDER_ID: &str = "NSE";

/// Format of `metadata.lastUpdateTime`.
const LAST_UPDATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S";

/// IST, UTC+05:30.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Default NSE website root.
pub const DEFAULT_NSE_BASE_URL: &str = "https://www.nseindia.com";

/// Primary provider: NSE quote-equity API.
pub struct NseProvider {
    client: reqwest::Client,
    base_url: String,
}

impl NseProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn quote_url(&self, symbol: &str) -> String {
        format!("{}/api/quote-equity?symbol={}", self.base_url, encode(symbol))
    }

    fn referer(&self, symbol: &str) -> String {
        format!("{}/get-quotes/equity?symbol={}", self.base_url, encode(symbol))
    }
}

#[async_trait]
impl MarketDataProvider for NseProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn source(&self) -> QuoteSource {
        QuoteSource::Primary
    }

    fn requires_session(&self) -> bool {
        true
    }

    async fn fetch(
        &self,
        symbol: &str,
        session: Option<&Session>,
    ) -> Result<Vec<u8>, MarketDataError> {
        let url = self.quote_url(symbol);
        let mut request = self
            .client
            .get(&url)
            .headers(browser_headers(Some(&self.referer(symbol))));

        if let Some(session) = session.filter(|s| !s.is_empty()) {
            request = request.header(header::COOKIE, session.cookie_header());
        }

        debug!("Fetching NSE quote for {}", symbol);

        let response = request
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
        let data: NseQuoteResponse =
            serde_json::from_slice(body).map_err(|e| parse_error(PROVIDER_ID, e))?;

        // Unknown symbols come back as `{}` or with an empty priceInfo
        let price_info = data
            .price_info
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let last_price = decimal(&price_info.last_price)
            .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

        let (day_low, day_high) = price_info
            .intra_day_high_low
            .as_ref()
            .map(|hl| (decimal(&hl.min), decimal(&hl.max)))
            .unwrap_or((None, None));

        let timestamp = data
            .metadata
            .as_ref()
            .and_then(|m| m.last_update_time.as_deref())
            .and_then(parse_last_update_time)
            .unwrap_or_else(Utc::now);

        Quote::builder(symbol, last_price, QuoteSource::Primary)
            .company_name(data.info.and_then(|i| i.company_name))
            .previous_close(decimal(&price_info.previous_close))
            .open(decimal(&price_info.open))
            .day_range(day_low, day_high)
            .reported_change(decimal(&price_info.change), decimal(&price_info.p_change))
            .volume(
                data.pre_open_market
                    .as_ref()
                    .and_then(|p| decimal(&p.total_traded_volume)),
            )
            .timestamp(timestamp)
            .build()
    }
}

/// Parses `17-Oct-2026 15:59:59` as IST.
fn parse_last_update_time(raw: &str) -> Option<DateTime<Utc>> {
    let ist = FixedOffset::east_opt(IST_OFFSET_SECS)?;
    let naive = NaiveDateTime::parse_from_str(raw.trim(), LAST_UPDATE_FORMAT).ok()?;
    naive
        .and_local_timezone(ist)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
