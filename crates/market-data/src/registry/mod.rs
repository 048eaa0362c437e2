//! Quote acquisition machinery.
//!
//! This module provides the shared state and policy around the providers:
//! - Per-key request pacing (`Throttle`)
//! - The primary provider's cookie session (`SessionManager`)
//! - Payload classification and quote sanity checks (`ResponseValidator`)
//! - Circuit breaking for the fallback provider (`CircuitBreaker`)
//! - Per-provider counters (`SourceStatistics`)
//! - The fallback chain itself (`QuoteOrchestrator`)

mod circuit_breaker;
mod orchestrator;
mod session;
mod skip_reason;
mod stats;
mod throttle;
mod validator;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitMetrics, CircuitState};
pub use orchestrator::{QuoteOrchestrator, SYNTHETIC_PROVIDER_ID};
pub use session::{parse_set_cookies, CookieSource, HttpCookieSource, SessionConfig, SessionManager};
pub use skip_reason::{FetchDiagnostics, ProviderAttempt, SkipReason};
pub use stats::{FailureRecord, ProviderStats, SourceStatistics, StatisticsSnapshot};
pub use throttle::{DelayRange, Throttle, ThrottleConfig, SESSION_INIT_KEY};
pub use validator::{
    preview, PayloadClass, ResponseValidator, ValidationIssue, ValidationSeverity, ValidatorConfig,
};
