//! Equibot Market Data Crate
//!
//! Resilient quote acquisition for NSE-listed equities.
//!
//! # Overview
//!
//! A quote request walks an ordered fallback chain until one tier answers:
//!
//! ```text
//!  get_quote("RELIANCE")
//!          |
//!          v
//! +------------------+   throttle (NSE, symbol), ensure session,
//! |  NSE (primary)   |   classify body, parse, validate
//! +------------------+
//!          | any failure (401/403 also drops the session)
//!          v
//! +------------------+   circuit breaker, throttle (YAHOO, symbol),
//! | Yahoo (secondary)|   one retry after 429, `.NS` suffix
//! +------------------+
//!          | any failure, or breaker open
//!          v
//! +------------------+
//! |    Synthetic     |   never fails, tagged as synthetic
//! +------------------+
//! ```
//!
//! Every outcome is counted in [`SourceStatistics`]; the snapshot is what a
//! health endpoint exposes.
//!
//! # Core Types
//!
//! - [`QuoteOrchestrator`] - The fallback chain, created once and shared
//! - [`Quote`] - Normalized quote with provenance ([`QuoteSource`])
//! - [`MarketDataConfig`] - All tunables with production defaults
//! - [`MarketDataError`] - Provider failures, never surfaced by `get_quote`

pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use config::{MarketDataConfig, NseConfig, SyntheticConfig, YahooConfig};

pub use errors::{MarketDataError, RateLimitRetryPolicy, RetryClass};

pub use models::{normalize_symbol, ProviderId, Quote, QuoteSource, Session};

pub use provider::{
    to_yahoo_symbol, MarketDataProvider, NseProvider, SyntheticQuoteGenerator, YahooChartProvider,
};

pub use registry::{
    CircuitBreaker, CircuitBreakerConfig, CircuitMetrics, CircuitState, CookieSource,
    FetchDiagnostics, PayloadClass, ProviderStats, QuoteOrchestrator, ResponseValidator,
    SessionConfig, SessionManager, SkipReason, SourceStatistics, StatisticsSnapshot, Throttle,
    ThrottleConfig,
};
