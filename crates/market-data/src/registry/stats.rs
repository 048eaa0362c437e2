//! Per-provider success/failure counters for observability.
//!
//! Counters are atomics behind a read-mostly map, so writers for an already
//! known provider and snapshot readers only ever share a read lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

use crate::models::ProviderId;

#[derive(Default)]
struct ProviderCounters {
    success: AtomicU64,
    failure: AtomicU64,
    last_failure: Mutex<Option<FailureRecord>>,
}

/// Most recent failure seen for a provider.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub symbol: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

/// Counters for one provider at snapshot time.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStats {
    pub provider: String,
    pub success: u64,
    pub failure: u64,
    /// `success / (success + failure)`, absent before the first attempt.
    pub success_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<FailureRecord>,
}

/// Point-in-time copy of all counters.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    pub providers: Vec<ProviderStats>,
    /// Quotes served by the synthetic tier.
    pub synthetic: u64,
    /// `get_quote` calls since startup.
    pub total_requests: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

impl StatisticsSnapshot {
    pub fn provider(&self, id: &str) -> Option<&ProviderStats> {
        self.providers.iter().find(|p| p.provider == id)
    }
}

/// Source statistics tracker. Created once at startup and shared via `Arc`.
pub struct SourceStatistics {
    providers: RwLock<HashMap<String, ProviderCounters>>,
    synthetic: AtomicU64,
    requests: AtomicU64,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl SourceStatistics {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            synthetic: AtomicU64::new(0),
            requests: AtomicU64::new(0),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, provider: &ProviderId, symbol: &str) {
        log::trace!("Stats: success for '{}' ({})", provider, symbol);
        self.with_counters(provider, |c| {
            c.success.fetch_add(1, Ordering::Relaxed);
        });
    }

    pub fn record_failure(&self, provider: &ProviderId, symbol: &str, reason: &str) {
        self.with_counters(provider, |c| {
            c.failure.fetch_add(1, Ordering::Relaxed);
            let record = FailureRecord {
                symbol: symbol.to_string(),
                reason: reason.to_string(),
                at: Utc::now(),
            };
            match c.last_failure.lock() {
                Ok(mut last) => *last = Some(record),
                Err(poisoned) => *poisoned.into_inner() = Some(record),
            }
        });
    }

    pub fn record_synthetic(&self, symbol: &str) {
        log::trace!("Stats: synthetic quote for {}", symbol);
        self.synthetic.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough copy of the counters. Never blocks writers of known
    /// providers.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let providers = self.providers.read().unwrap_or_else(|poisoned| {
            warn!("Statistics lock was poisoned, recovering");
            poisoned.into_inner()
        });

        let mut stats: Vec<ProviderStats> = providers
            .iter()
            .map(|(id, c)| {
                let success = c.success.load(Ordering::Relaxed);
                let failure = c.failure.load(Ordering::Relaxed);
                let last_failure = c
                    .last_failure
                    .lock()
                    .map(|l| l.clone())
                    .unwrap_or_else(|poisoned| poisoned.into_inner().clone());
                ProviderStats {
                    provider: id.clone(),
                    success,
                    failure,
                    success_rate: success_rate(success, failure),
                    last_failure,
                }
            })
            .collect();
        stats.sort_by(|a, b| a.provider.cmp(&b.provider));

        StatisticsSnapshot {
            providers: stats,
            synthetic: self.synthetic.load(Ordering::Relaxed),
            total_requests: self.requests.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }

    fn with_counters(&self, provider: &ProviderId, f: impl FnOnce(&ProviderCounters)) {
        {
            let providers = self
                .providers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(counters) = providers.get(provider.as_ref()) {
                f(counters);
                return;
            }
        }

        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(providers.entry(provider.to_string()).or_default());
    }
}

impl Default for SourceStatistics {
    fn default() -> Self {
        Self::new()
    }
}

fn success_rate(success: u64, failure: u64) -> Option<f64> {
    let total = success + failure;
    (total > 0).then(|| success as f64 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::sync::Arc;

    const NSE: ProviderId = Cow::Borrowed("NSE");
    const YAHOO: ProviderId = Cow::Borrowed("YAHOO");

    #[test]
    fn test_empty_snapshot() {
        let stats = SourceStatistics::new();
        let snapshot = stats.snapshot();

        assert!(snapshot.providers.is_empty());
        assert_eq!(snapshot.synthetic, 0);
        assert_eq!(snapshot.total_requests, 0);
    }

    #[test]
    fn test_counts_and_rates() {
        let stats = SourceStatistics::new();

        stats.record_request();
        stats.record_success(&NSE, "RELIANCE");
        stats.record_success(&NSE, "TCS");
        stats.record_success(&NSE, "INFY");
        stats.record_failure(&NSE, "WIPRO", "timeout");
        stats.record_failure(&YAHOO, "WIPRO", "rate_limited");
        stats.record_synthetic("WIPRO");

        let snapshot = stats.snapshot();
        let nse = snapshot.provider("NSE").unwrap();
        assert_eq!(nse.success, 3);
        assert_eq!(nse.failure, 1);
        assert_eq!(nse.success_rate, Some(0.75));

        let yahoo = snapshot.provider("YAHOO").unwrap();
        assert_eq!(yahoo.success_rate, Some(0.0));
        let last = yahoo.last_failure.as_ref().unwrap();
        assert_eq!(last.symbol, "WIPRO");
        assert_eq!(last.reason, "rate_limited");

        assert_eq!(snapshot.synthetic, 1);
        assert_eq!(snapshot.total_requests, 1);
    }

    #[test]
    fn test_snapshot_sorted_by_provider() {
        let stats = SourceStatistics::new();
        stats.record_success(&YAHOO, "A");
        stats.record_success(&NSE, "A");

        let names: Vec<_> = stats
            .snapshot()
            .providers
            .into_iter()
            .map(|p| p.provider)
            .collect();
        assert_eq!(names, vec!["NSE", "YAHOO"]);
    }

    #[test]
    fn test_concurrent_writers() {
        let stats = Arc::new(SourceStatistics::new());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if i % 2 == 0 {
                            stats.record_success(&NSE, "X");
                        } else {
                            stats.record_failure(&NSE, "X", "timeout");
                        }
                        let _ = stats.snapshot();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let nse = stats.snapshot().provider("NSE").cloned().unwrap();
        assert_eq!(nse.success, 400);
        assert_eq!(nse.failure, 400);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let stats = SourceStatistics::new();
        stats.record_success(&NSE, "RELIANCE");

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["providers"][0]["successRate"], 1.0);
        assert!(json.get("uptimeSecs").is_some());
    }
}
