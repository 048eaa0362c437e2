use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Decimal places kept on a computed percent change.
const PERCENT_CHANGE_SCALE: u32 = 2;

/// Smallest price step, 0.01.
pub const MIN_TICK: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Which tier of the fallback chain produced a quote.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSource {
    /// Live data from the primary provider.
    Primary,
    /// Live data from the secondary provider.
    Secondary,
    /// Placeholder values, no provider answered.
    Synthetic,
}

impl QuoteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Synthetic => "synthetic",
        }
    }

    /// True for quotes backed by a real provider response.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Synthetic)
    }
}

impl fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized market quote.
///
/// Built through [`QuoteBuilder`], which guarantees a strictly positive last
/// price and a percent change consistent with the previous close.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Quote {
    /// Canonical (unsuffixed) symbol
    pub symbol: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,

    /// Last traded price, always > 0
    pub last_price: Decimal,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_high: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_low: Option<Decimal>,

    /// `last_price - previous_close`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<Decimal>,

    /// `change / previous_close * 100`, two decimal places
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent_change: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    /// Time the provider reported for the price, or fetch time
    pub timestamp: DateTime<Utc>,

    /// Provenance
    pub source: QuoteSource,
}

impl Quote {
    pub fn builder(symbol: impl Into<String>, last_price: Decimal, source: QuoteSource) -> QuoteBuilder {
        QuoteBuilder::new(symbol, last_price, source)
    }
}

/// Computes `(last - previous) / previous * 100` rounded to two places.
///
/// Returns `None` when the previous close is not positive.
pub fn percent_change(last: Decimal, previous_close: Decimal) -> Option<Decimal> {
    if previous_close <= Decimal::ZERO {
        return None;
    }
    let raw = (last - previous_close) / previous_close * Decimal::ONE_HUNDRED;
    Some(raw.round_dp_with_strategy(PERCENT_CHANGE_SCALE, RoundingStrategy::MidpointAwayFromZero))
}

/// Builder for [`Quote`].
#[derive(Clone, Debug)]
pub struct QuoteBuilder {
    symbol: String,
    last_price: Decimal,
    source: QuoteSource,
    company_name: Option<String>,
    previous_close: Option<Decimal>,
    open: Option<Decimal>,
    day_high: Option<Decimal>,
    day_low: Option<Decimal>,
    change: Option<Decimal>,
    percent_change: Option<Decimal>,
    volume: Option<Decimal>,
    timestamp: Option<DateTime<Utc>>,
}

impl QuoteBuilder {
    pub fn new(symbol: impl Into<String>, last_price: Decimal, source: QuoteSource) -> Self {
        Self {
            symbol: symbol.into(),
            last_price,
            source,
            company_name: None,
            previous_close: None,
            open: None,
            day_high: None,
            day_low: None,
            change: None,
            percent_change: None,
            volume: None,
            timestamp: None,
        }
    }

    pub fn company_name(mut self, name: Option<String>) -> Self {
        self.company_name = name.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn previous_close(mut self, value: Option<Decimal>) -> Self {
        self.previous_close = value;
        self
    }

    pub fn open(mut self, value: Option<Decimal>) -> Self {
        self.open = value;
        self
    }

    pub fn day_range(mut self, low: Option<Decimal>, high: Option<Decimal>) -> Self {
        self.day_low = low;
        self.day_high = high;
        self
    }

    /// Provider-reported change values. Ignored when a previous close is set,
    /// since they are then recomputed.
    pub fn reported_change(mut self, change: Option<Decimal>, percent: Option<Decimal>) -> Self {
        self.change = change;
        self.percent_change = percent;
        self
    }

    pub fn volume(mut self, value: Option<Decimal>) -> Self {
        self.volume = value;
        self
    }

    pub fn timestamp(mut self, value: DateTime<Utc>) -> Self {
        self.timestamp = Some(value);
        self
    }

    pub fn build(self) -> Result<Quote, MarketDataError> {
        if self.last_price <= Decimal::ZERO {
            return Err(MarketDataError::ValidationFailed {
                message: format!(
                    "Non-positive last price {} for {}",
                    self.last_price, self.symbol
                ),
            });
        }
        Ok(self.assemble())
    }

    /// Infallible build for generated prices: a last price below one tick is
    /// raised to [`MIN_TICK`].
    pub fn build_clamped(mut self) -> Quote {
        self.last_price = self.last_price.max(MIN_TICK);
        self.assemble()
    }

    fn assemble(self) -> Quote {
        let (change, percent) = match self.previous_close {
            Some(prev) if prev > Decimal::ZERO => (
                Some(self.last_price - prev),
                percent_change(self.last_price, prev),
            ),
            _ => (self.change, self.percent_change),
        };

        Quote {
            symbol: self.symbol,
            company_name: self.company_name,
            last_price: self.last_price,
            previous_close: self.previous_close,
            open: self.open,
            day_high: self.day_high,
            day_low: self.day_low,
            change,
            percent_change: percent,
            volume: self.volume,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            source: self.source,
        }
    }
}
