//! Yahoo Finance chart API response models.
//!
//! Only `meta` and the first `open` of the daily candle are used; the API
//! returns the full intraday series as well, which is ignored.

use serde::Deserialize;

use crate::provider::NumberOrString;

/// Main response wrapper for `/v8/finance/chart/{symbol}`
#[derive(Debug, Deserialize)]
pub struct YahooChartResponse {
    pub chart: YahooChart,
}

#[derive(Debug, Deserialize)]
pub struct YahooChart {
    #[serde(default)]
    pub result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    pub error: Option<YahooChartError>,
}

/// Error object, e.g. `{"code": "Not Found", "description": "No data found, symbol may be delisted"}`
#[derive(Debug, Deserialize)]
pub struct YahooChartError {
    pub code: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YahooChartResult {
    pub meta: YahooChartMeta,
    #[serde(default)]
    pub indicators: Option<YahooIndicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooChartMeta {
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub regular_market_price: Option<NumberOrString>,
    pub previous_close: Option<NumberOrString>,
    pub chart_previous_close: Option<NumberOrString>,
    pub regular_market_day_high: Option<NumberOrString>,
    pub regular_market_day_low: Option<NumberOrString>,
    pub regular_market_volume: Option<NumberOrString>,
    /// Unix seconds
    pub regular_market_time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct YahooIndicators {
    #[serde(default)]
    pub quote: Vec<YahooIndicatorQuote>,
}

#[derive(Debug, Default, Deserialize)]
pub struct YahooIndicatorQuote {
    /// Candle opens; gaps are `null`
    #[serde(default)]
    pub open: Vec<Option<NumberOrString>>,
}
