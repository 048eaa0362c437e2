//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all quote acquisition failures
//! - [`RetryClass`]: Classification for determining how the orchestrator reacts
//! - [`RateLimitRetryPolicy`]: The bounded retry applied to rate-limited calls

mod retry;

pub use retry::{RateLimitRetryPolicy, RetryClass};

use thiserror::Error;

use crate::registry::PayloadClass;

/// Errors that can occur while acquiring a quote from a provider.
///
/// None of these ever reach callers of
/// [`QuoteOrchestrator::get_quote`](crate::QuoteOrchestrator::get_quote); every
/// variant is converted into "try the next tier". Each variant is classified
/// into a [`RetryClass`] via [`retry_class`](Self::retry_class).
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// Session refresh yielded no cookies.
    #[error("Session unavailable: {provider}")]
    SessionUnavailable {
        /// The provider whose session could not be established
        provider: String,
    },

    /// The provider rejected our credentials (HTTP 401/403).
    /// The session is invalidated before moving on.
    #[error("Authentication failed: {provider}")]
    AuthenticationFailure {
        /// The provider that rejected the session
        provider: String,
    },

    /// The response body was not JSON.
    ///
    /// Only the classification and a short printable preview are kept, never
    /// the raw bytes.
    #[error("Invalid payload from {provider}: {class} (preview: {preview:?})")]
    InvalidPayload {
        /// The provider that returned the payload
        provider: String,
        /// What the validator decided the body was
        class: PayloadClass,
        /// Printable preview of the first few bytes
        preview: String,
    },

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A provider-specific error occurred (unexpected status code, etc).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message
        message: String,
    },

    /// The provider answered but knows nothing about the symbol.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The body was JSON but did not have the expected shape.
    #[error("Parse failed: {provider} - {message}")]
    ParseFailed {
        /// The provider whose payload could not be parsed
        provider: String,
        /// What went wrong
        message: String,
    },

    /// A parsed quote failed sanity checks.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// The circuit breaker suppressed the call. Not a failure of the provider
    /// itself, a deliberate skip.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use equibot_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "YAHOO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::AuthenticationFailure { provider: "NSE".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::InvalidateSession);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited { .. } => RetryClass::WithBackoff,

            Self::AuthenticationFailure { .. } => RetryClass::InvalidateSession,

            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,

            Self::SessionUnavailable { .. }
            | Self::InvalidPayload { .. }
            | Self::Timeout { .. }
            | Self::ProviderError { .. }
            | Self::SymbolNotFound(_)
            | Self::ParseFailed { .. }
            | Self::ValidationFailed { .. }
            | Self::Network(_) => RetryClass::NextTier,
        }
    }

    /// Short machine-friendly reason used in statistics and diagnostics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::SessionUnavailable { .. } => "session_unavailable",
            Self::AuthenticationFailure { .. } => "authentication_failure",
            Self::InvalidPayload { class, .. } => class.as_str(),
            Self::RateLimited { .. } => "rate_limited",
            Self::Timeout { .. } => "timeout",
            Self::ProviderError { .. } => "provider_error",
            Self::SymbolNotFound(_) => "symbol_not_found",
            Self::ParseFailed { .. } => "parse_failed",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Network(_) => "network",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_retries_with_backoff() {
        let error = MarketDataError::RateLimited {
            provider: "YAHOO".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_auth_failure_invalidates_session() {
        let error = MarketDataError::AuthenticationFailure {
            provider: "NSE".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::InvalidateSession);
    }

    #[test]
    fn test_payload_and_timeout_move_to_next_tier() {
        let error = MarketDataError::InvalidPayload {
            provider: "NSE".to_string(),
            class: PayloadClass::HtmlErrorPage,
            preview: "<html>".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextTier);
        assert_eq!(error.reason(), "html_error_page");

        let error = MarketDataError::Timeout {
            provider: "YAHOO".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::NextTier);
    }

    #[test]
    fn test_circuit_open_returns_circuit_open() {
        let error = MarketDataError::CircuitOpen {
            provider: "YAHOO".to_string(),
        };
        assert_eq!(error.retry_class(), RetryClass::CircuitOpen);
    }

    #[test]
    fn test_error_display() {
        let error = MarketDataError::SymbolNotFound("INVALID".to_string());
        assert_eq!(format!("{}", error), "Symbol not found: INVALID");

        let error = MarketDataError::RateLimited {
            provider: "YAHOO".to_string(),
        };
        assert_eq!(format!("{}", error), "Rate limited: YAHOO");

        let error = MarketDataError::InvalidPayload {
            provider: "NSE".to_string(),
            class: PayloadClass::BinaryOrCorrupted,
            preview: "..".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Invalid payload from NSE: binary_or_corrupted (preview: \"..\")"
        );
    }
}
