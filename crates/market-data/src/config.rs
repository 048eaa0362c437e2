//! Configuration for the quote acquisition chain.
//!
//! Every tunable lives here with its production default. Binaries override
//! fields from their own configuration source; tests zero the delays.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::errors::RateLimitRetryPolicy;
use crate::provider::nse::DEFAULT_NSE_BASE_URL;
use crate::provider::synthetic::{DEFAULT_MAX_JITTER_PERCENT, DEFAULT_NOMINAL_BASE};
use crate::provider::yahoo::{DEFAULT_SYMBOL_SUFFIX, DEFAULT_YAHOO_BASE_URL};
use crate::registry::{CircuitBreakerConfig, DelayRange, SessionConfig, ThrottleConfig};

/// Per-call timeout applied to each provider request.
const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound on a whole `get_quote` call.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Primary provider settings.
#[derive(Clone, Debug)]
pub struct NseConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub throttle: ThrottleConfig,
    pub session: SessionConfig,
}

impl Default for NseConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_NSE_BASE_URL.to_string(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            throttle: ThrottleConfig::primary_default(),
            session: SessionConfig::default(),
        }
    }
}

/// Secondary provider settings.
#[derive(Clone, Debug)]
pub struct YahooConfig {
    pub base_url: String,
    /// Exchange suffix appended to canonical symbols, e.g. `.NS`
    pub symbol_suffix: String,
    pub timeout: Duration,
    pub throttle: ThrottleConfig,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            symbol_suffix: DEFAULT_SYMBOL_SUFFIX.to_string(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            throttle: ThrottleConfig::secondary_default(),
        }
    }
}

/// Synthetic tier settings.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub nominal_base: Decimal,
    pub max_jitter_percent: Decimal,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            nominal_base: DEFAULT_NOMINAL_BASE,
            max_jitter_percent: DEFAULT_MAX_JITTER_PERCENT,
        }
    }
}

/// Everything [`QuoteOrchestrator`](crate::QuoteOrchestrator) needs.
#[derive(Clone, Debug)]
pub struct MarketDataConfig {
    pub nse: NseConfig,
    pub yahoo: YahooConfig,
    pub synthetic: SyntheticConfig,
    /// Random sleep before every outbound call.
    pub pre_request_delay: DelayRange,
    /// Breaker guarding the secondary provider.
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limit_retry: RateLimitRetryPolicy,
    /// After this, the chain is abandoned and a synthetic quote returned.
    pub request_timeout: Duration,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            nse: NseConfig::default(),
            yahoo: YahooConfig::default(),
            synthetic: SyntheticConfig::default(),
            pre_request_delay: DelayRange::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            rate_limit_retry: RateLimitRetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}
