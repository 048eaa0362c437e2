//! Per-request record of what each tier did.

use crate::models::ProviderId;

/// Why a tier was skipped without a network call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Symbol was empty or malformed after normalization.
    InvalidSymbol,

    /// No session could be established for a provider that needs one.
    SessionUnavailable,

    /// Circuit breaker is open for this provider.
    CircuitBreakerOpen,

    /// The overall request deadline passed before this tier was reached.
    RequestTimedOut,
}

/// Record of a single tier attempt during a fetch.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub skipped: Option<SkipReason>,
    pub error: Option<String>,
    pub success: bool,
}

/// Detailed result of a `get_quote` call.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
    /// Extra attempts made after rate-limited responses.
    pub retries: u32,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: Some(reason),
            error: None,
            success: false,
        });
    }

    pub fn record_error(&mut self, provider_id: ProviderId, error: String) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: Some(error),
            success: false,
        });
    }

    pub fn record_success(&mut self, provider_id: ProviderId) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            skipped: None,
            error: None,
            success: true,
        });
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| {
                if a.success {
                    format!("{}: SUCCESS", a.provider_id)
                } else if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({:?})", a.provider_id, skip)
                } else if let Some(err) = &a.error {
                    format!("{}: ERROR ({})", a.provider_id, err)
                } else {
                    format!("{}: UNKNOWN", a.provider_id)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Attempts that reached the network, successful or not.
    pub fn network_attempts(&self, provider_id: &str) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.provider_id == provider_id && a.skipped.is_none())
            .count()
    }

    pub fn was_skipped(&self, provider_id: &str, reason: &SkipReason) -> bool {
        self.attempts
            .iter()
            .any(|a| a.provider_id == provider_id && a.skipped.as_ref() == Some(reason))
    }

    /// Get all errors.
    pub fn errors(&self) -> Vec<(&ProviderId, &str)> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| (&a.provider_id, e.as_str())))
            .collect()
    }
}
