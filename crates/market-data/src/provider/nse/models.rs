//! NSE quote-equity API response models.
//!
//! Only the fields that end up on a [`Quote`](crate::models::Quote) are
//! modelled; everything else in the payload is ignored.

use serde::Deserialize;

use crate::provider::NumberOrString;

/// Response of `/api/quote-equity?symbol=...`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NseQuoteResponse {
    pub info: Option<NseInfo>,
    pub metadata: Option<NseMetadata>,
    pub price_info: Option<NsePriceInfo>,
    pub pre_open_market: Option<NsePreOpenMarket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NseInfo {
    pub company_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NseMetadata {
    /// e.g. "17-Oct-2026 15:59:59", exchange local time
    pub last_update_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NsePriceInfo {
    pub last_price: Option<NumberOrString>,
    pub change: Option<NumberOrString>,
    pub p_change: Option<NumberOrString>,
    pub previous_close: Option<NumberOrString>,
    pub open: Option<NumberOrString>,
    pub intra_day_high_low: Option<NseHighLow>,
}

#[derive(Debug, Deserialize)]
pub struct NseHighLow {
    pub min: Option<NumberOrString>,
    pub max: Option<NumberOrString>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NsePreOpenMarket {
    pub total_traded_volume: Option<NumberOrString>,
}
