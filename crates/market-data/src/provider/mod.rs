//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait implemented by the live tiers
//! - `NseProvider` (primary, cookie session) and `YahooChartProvider` (secondary)
//! - `SyntheticQuoteGenerator`, the last tier that never fails
//! - Shared HTTP helpers: browser headers, status mapping, lenient numbers

pub mod headers;
pub mod nse;
mod number;
pub mod synthetic;
mod traits;
pub mod yahoo;

use reqwest::StatusCode;

use crate::errors::MarketDataError;

pub use nse::NseProvider;
pub use number::NumberOrString;
pub use synthetic::SyntheticQuoteGenerator;
pub use traits::MarketDataProvider;
pub use yahoo::{to_yahoo_symbol, YahooChartProvider};

/// Maps an HTTP status to the error the fallback chain reacts to.
///
/// 401/403 are authentication failures (session gets invalidated), 429 is a
/// rate limit (bounded retry), any other non-2xx is a plain provider error.
pub fn check_status(provider: &str, status: StatusCode) -> Result<(), MarketDataError> {
    if status.is_success() {
        return Ok(());
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(MarketDataError::AuthenticationFailure {
                provider: provider.to_string(),
            })
        }
        StatusCode::TOO_MANY_REQUESTS => Err(MarketDataError::RateLimited {
            provider: provider.to_string(),
        }),
        _ => Err(MarketDataError::ProviderError {
            provider: provider.to_string(),
            message: format!("HTTP {}", status),
        }),
    }
}

/// Maps a transport error, keeping timeouts distinct.
pub(crate) fn send_error(provider: &str, error: reqwest::Error) -> MarketDataError {
    if error.is_timeout() {
        MarketDataError::Timeout {
            provider: provider.to_string(),
        }
    } else {
        MarketDataError::Network(error)
    }
}

/// Wraps a serde error on a JSON body.
pub(crate) fn parse_error(provider: &str, error: serde_json::Error) -> MarketDataError {
    MarketDataError::ParseFailed {
        provider: provider.to_string(),
        message: error.to_string(),
    }
}
