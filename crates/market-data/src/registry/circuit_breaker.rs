//! Per-provider circuit breaker for fault tolerance.
//!
//! Keeps a degraded fallback provider from adding latency to every request
//! while still probing it periodically. The circuit has three states:
//!
//! - **Closed**: Normal operation, requests are allowed through.
//! - **Open**: `failure_count >= threshold` and the last failure is younger
//!   than the timeout. Requests are skipped without any I/O.
//! - **HalfOpen**: The timeout elapsed and one trial request was let through.
//!   Other callers are skipped until the trial reports back. A trial that never
//!   reports (its future was dropped) is abandoned after `timeout` and the next
//!   caller becomes the new trial.
//!
//! Admitting the trial resets the failure counter to 0 *before* the trial
//! completes. A failed trial therefore leaves the counter at 1, and the circuit
//! needs a full `threshold` of new failures to open again.
//!
//! The circuit breaker is in-memory and resets on process restart.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::models::ProviderId;

/// Default number of consecutive failures before opening the circuit.
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time an open circuit suppresses calls, counted from the last failure.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Circuit breaker state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CircuitState {
    /// Normal operation - requests are allowed.
    Closed,
    /// Provider is failing - requests are blocked.
    Open,
    /// A trial request is in flight.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
            Self::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Internal circuit state for a single provider.
#[derive(Debug, Default)]
struct Circuit {
    /// Number of consecutive failures.
    failure_count: u32,
    /// Time of the last failure (for the open timeout).
    last_failure: Option<Instant>,
    /// Set between admitting a trial call and recording its outcome.
    trial_started: Option<Instant>,
}

impl Circuit {
    fn state(&self, config: &CircuitBreakerConfig) -> CircuitState {
        if self
            .trial_started
            .is_some_and(|at| at.elapsed() < config.timeout)
        {
            return CircuitState::HalfOpen;
        }
        match self.last_failure {
            Some(at)
                if self.failure_count >= config.failure_threshold
                    && at.elapsed() < config.timeout =>
            {
                CircuitState::Open
            }
            _ => CircuitState::Closed,
        }
    }

    fn timed_out(&self, config: &CircuitBreakerConfig) -> bool {
        self.failure_count >= config.failure_threshold
            && self
                .last_failure
                .map(|at| at.elapsed() >= config.timeout)
                .unwrap_or(true)
    }
}

/// Circuit breaker configuration.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit suppresses calls after the last failure.
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Per-provider circuit breaker.
///
/// Thread-safe circuit breaker that tracks failures per provider
/// and prevents requests to failing providers.
pub struct CircuitBreaker {
    circuits: Mutex<HashMap<String, Circuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with default settings.
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    /// Create a circuit breaker with custom configuration.
    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Lock the circuits mutex, recovering from poison if necessary.
    ///
    /// The worst case after a poisoned lock is a slightly wrong failure count.
    fn lock_circuits(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("Circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Check if a call to the provider may go out.
    ///
    /// Performs the Open -> HalfOpen transition: once the timeout has elapsed
    /// since the last failure, the counter is reset and this call is admitted
    /// as the trial.
    pub fn is_allowed(&self, provider: &ProviderId) -> bool {
        let mut circuits = self.lock_circuits();

        let circuit = circuits.entry(provider.to_string()).or_default();

        match circuit.state(&self.config) {
            CircuitState::Closed => {
                if circuit.trial_started.is_some() {
                    warn!(
                        "Circuit breaker: trial for '{}' never reported, admitting a new one",
                        provider
                    );
                    circuit.trial_started = Some(Instant::now());
                } else if circuit.timed_out(&self.config) {
                    info!(
                        "Circuit breaker: transitioning '{}' from Open to HalfOpen",
                        provider
                    );
                    circuit.failure_count = 0;
                    circuit.trial_started = Some(Instant::now());
                }
                true
            }
            // Only the trial caller goes out while it is in flight.
            CircuitState::HalfOpen | CircuitState::Open => false,
        }
    }

    /// Read-only check used for reporting; does not admit a trial.
    pub fn is_open(&self, provider: &ProviderId) -> bool {
        self.state(provider) == CircuitState::Open
    }

    /// Record a successful request. Any state goes to a fresh Closed.
    pub fn record_success(&self, provider: &ProviderId) {
        let mut circuits = self.lock_circuits();

        let circuit = circuits.entry(provider.to_string()).or_default();

        if circuit.trial_started.is_some() {
            info!(
                "Circuit breaker: closing circuit for '{}' after successful trial",
                provider
            );
        } else if circuit.failure_count > 0 {
            debug!(
                "Circuit breaker: success for '{}', failure count reset",
                provider
            );
        }

        *circuit = Circuit::default();
    }

    /// Record a failed request.
    ///
    /// Increments the failure count and restarts the open clock.
    pub fn record_failure(&self, provider: &ProviderId) {
        let mut circuits = self.lock_circuits();

        let circuit = circuits.entry(provider.to_string()).or_default();

        let was_trial = circuit.trial_started.take().is_some();
        circuit.failure_count += 1;
        circuit.last_failure = Some(Instant::now());

        if was_trial {
            info!(
                "Circuit breaker: trial failed for '{}' ({}/{})",
                provider, circuit.failure_count, self.config.failure_threshold
            );
        } else if circuit.failure_count == self.config.failure_threshold {
            info!(
                "Circuit breaker: opening circuit for '{}' after {} failures",
                provider, circuit.failure_count
            );
        } else {
            debug!(
                "Circuit breaker: failure for '{}' ({}/{})",
                provider, circuit.failure_count, self.config.failure_threshold
            );
        }
    }

    /// Get the current state for a provider.
    pub fn state(&self, provider: &ProviderId) -> CircuitState {
        let circuits = self.lock_circuits();

        circuits
            .get(provider.as_ref())
            .map(|c| c.state(&self.config))
            .unwrap_or(CircuitState::Closed)
    }

    /// Get the failure count for a provider.
    pub fn failure_count(&self, provider: &ProviderId) -> u32 {
        let circuits = self.lock_circuits();

        circuits
            .get(provider.as_ref())
            .map(|c| c.failure_count)
            .unwrap_or(0)
    }

    /// Reset the circuit for a provider to Closed state.
    pub fn reset(&self, provider: &ProviderId) {
        let mut circuits = self.lock_circuits();

        if let Some(circuit) = circuits.get_mut(provider.as_ref()) {
            info!(
                "Circuit breaker: manually resetting circuit for '{}'",
                provider
            );
            *circuit = Circuit::default();
        }
    }

    /// Reset all circuits to their initial state.
    pub fn reset_all(&self) {
        let mut circuits = self.lock_circuits();
        circuits.clear();
        info!("Circuit breaker: all circuits reset");
    }

    /// Get metrics for all tracked providers.
    pub fn metrics(&self) -> Vec<CircuitMetrics> {
        let circuits = self.lock_circuits();

        circuits
            .iter()
            .map(|(provider, circuit)| CircuitMetrics {
                provider: provider.clone(),
                state: circuit.state(&self.config),
                failure_count: circuit.failure_count,
                last_failure: circuit.last_failure,
            })
            .collect()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics for a single circuit.
#[derive(Clone, Debug)]
pub struct CircuitMetrics {
    /// Provider identifier.
    pub provider: String,
    /// Current circuit state.
    pub state: CircuitState,
    /// Number of recorded failures.
    pub failure_count: u32,
    /// Time of the last failure.
    pub last_failure: Option<Instant>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn breaker(threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: threshold,
            timeout,
        })
    }

    #[test]
    fn test_circuit_starts_closed() {
        let cb = CircuitBreaker::new();
        let provider: ProviderId = Cow::Borrowed("TEST_PROVIDER");

        assert!(cb.is_allowed(&provider));
        assert_eq!(cb.state(&provider), CircuitState::Closed);
    }

    #[test]
    fn test_circuit_opens_after_threshold() {
        let cb = CircuitBreaker::new();
        let provider: ProviderId = Cow::Borrowed("FAILING_PROVIDER");

        for _ in 0..4 {
            cb.record_failure(&provider);
        }
        assert!(cb.is_allowed(&provider));
        assert!(!cb.is_open(&provider));

        // Fifth failure opens the circuit immediately
        cb.record_failure(&provider);
        assert!(cb.is_open(&provider));
        assert!(!cb.is_allowed(&provider));
        assert_eq!(cb.state(&provider), CircuitState::Open);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = breaker(3, Duration::from_secs(30));
        let provider: ProviderId = Cow::Borrowed("INTERMITTENT_PROVIDER");

        cb.record_failure(&provider);
        cb.record_failure(&provider);
        assert_eq!(cb.failure_count(&provider), 2);

        cb.record_success(&provider);
        assert_eq!(cb.failure_count(&provider), 0);
        assert_eq!(cb.state(&provider), CircuitState::Closed);
    }

    #[test]
    fn test_open_circuit_stays_open_until_timeout() {
        let cb = breaker(1, Duration::from_millis(40));
        let provider: ProviderId = Cow::Borrowed("SLOW_RECOVERY");

        cb.record_failure(&provider);
        assert!(!cb.is_allowed(&provider));
        std::thread::sleep(Duration::from_millis(10));
        assert!(!cb.is_allowed(&provider));

        std::thread::sleep(Duration::from_millis(40));
        assert!(cb.is_allowed(&provider));
    }

    #[test]
    fn test_timeout_admits_trial_and_resets_counter() {
        let cb = breaker(2, Duration::from_millis(10));
        let provider: ProviderId = Cow::Borrowed("RECOVERING_PROVIDER");

        cb.record_failure(&provider);
        cb.record_failure(&provider);
        assert_eq!(cb.state(&provider), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(20));

        // The attempt itself performs the transition
        assert!(cb.is_allowed(&provider));
        assert_eq!(cb.state(&provider), CircuitState::HalfOpen);
        assert_eq!(cb.failure_count(&provider), 0);
    }

    #[test]
    fn test_half_open_admits_only_the_trial() {
        let cb = breaker(1, Duration::from_millis(30));
        let provider: ProviderId = Cow::Borrowed("TRIAL_PROVIDER");

        cb.record_failure(&provider);
        std::thread::sleep(Duration::from_millis(40));

        assert!(cb.is_allowed(&provider));
        assert!(!cb.is_allowed(&provider));
        assert!(!cb.is_allowed(&provider));
        assert_eq!(cb.state(&provider), CircuitState::HalfOpen);

        cb.record_success(&provider);
        assert!(cb.is_allowed(&provider));
        assert!(cb.is_allowed(&provider));
    }

    #[test]
    fn test_abandoned_trial_is_replaced_after_timeout() {
        let cb = breaker(1, Duration::from_millis(30));
        let provider: ProviderId = Cow::Borrowed("LOST_TRIAL_PROVIDER");

        cb.record_failure(&provider);
        std::thread::sleep(Duration::from_millis(40));
        assert!(cb.is_allowed(&provider));

        // The trial never records an outcome
        std::thread::sleep(Duration::from_millis(40));
        assert!(cb.is_allowed(&provider));
        assert_eq!(cb.state(&provider), CircuitState::HalfOpen);
        assert!(!cb.is_allowed(&provider));

        cb.record_failure(&provider);
        assert_eq!(cb.failure_count(&provider), 1);
        assert_eq!(cb.state(&provider), CircuitState::Open);
    }

    #[test]
    fn test_half_open_closes_on_success() {
        let cb = breaker(1, Duration::from_millis(10));
        let provider: ProviderId = Cow::Borrowed("HEALING_PROVIDER");

        cb.record_failure(&provider);
        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.is_allowed(&provider));

        cb.record_success(&provider);
        assert_eq!(cb.state(&provider), CircuitState::Closed);
        assert_eq!(cb.failure_count(&provider), 0);
    }

    #[test]
    fn test_failed_trial_counts_from_one() {
        let cb = breaker(3, Duration::from_millis(10));
        let provider: ProviderId = Cow::Borrowed("RELAPSING_PROVIDER");

        for _ in 0..3 {
            cb.record_failure(&provider);
        }
        std::thread::sleep(Duration::from_millis(20));
        assert!(cb.is_allowed(&provider));

        cb.record_failure(&provider);
        assert_eq!(cb.failure_count(&provider), 1);
        assert_eq!(cb.state(&provider), CircuitState::Closed);

        // Needs a full threshold of new failures to open again
        cb.record_failure(&provider);
        assert!(!cb.is_open(&provider));
        cb.record_failure(&provider);
        assert!(cb.is_open(&provider));
    }

    #[test]
    fn test_manual_reset() {
        let cb = breaker(1, Duration::from_secs(30));
        let provider: ProviderId = Cow::Borrowed("RESET_PROVIDER");

        cb.record_failure(&provider);
        assert_eq!(cb.state(&provider), CircuitState::Open);

        cb.reset(&provider);
        assert_eq!(cb.state(&provider), CircuitState::Closed);
        assert_eq!(cb.failure_count(&provider), 0);
    }

    #[test]
    fn test_provider_isolation() {
        let cb = breaker(1, Duration::from_secs(30));
        let provider_a: ProviderId = Cow::Borrowed("PROVIDER_A");
        let provider_b: ProviderId = Cow::Borrowed("PROVIDER_B");

        cb.record_failure(&provider_a);
        assert!(!cb.is_allowed(&provider_a));

        assert!(cb.is_allowed(&provider_b));
        assert_eq!(cb.state(&provider_b), CircuitState::Closed);
    }

    #[test]
    fn test_metrics() {
        let cb = CircuitBreaker::new();
        let provider_a: ProviderId = Cow::Borrowed("METRIC_A");
        let provider_b: ProviderId = Cow::Borrowed("METRIC_B");

        cb.record_failure(&provider_a);
        cb.record_failure(&provider_a);
        cb.record_failure(&provider_b);

        let metrics = cb.metrics();
        assert_eq!(metrics.len(), 2);

        let metric_a = metrics.iter().find(|m| m.provider == "METRIC_A").unwrap();
        assert_eq!(metric_a.failure_count, 2);
        assert_eq!(metric_a.state, CircuitState::Closed);
    }
}
