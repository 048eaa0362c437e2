//! Keyed request pacing for market data providers.
//!
//! Replaces a token bucket with per-key spacing: every `(provider, key)` pair
//! (a symbol, or [`SESSION_INIT_KEY`] for session refreshes) remembers the
//! start time reserved for its last request. The next request on the same key
//! starts no earlier than `min_delay + U(0, jitter)` after it. Different keys
//! never wait on each other.
//!
//! Slots are reserved under a short lock and slept outside it, so concurrent
//! callers on one key each get their own slot and all start-times stay spaced.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use tokio::time::Instant;

use crate::models::ProviderId;

/// Key used to pace session refreshes independently of symbol requests.
pub const SESSION_INIT_KEY: &str = "__session_init__";

/// Default bounds of the pre-request delay.
const DEFAULT_PRE_REQUEST_MIN: Duration = Duration::from_millis(100);
const DEFAULT_PRE_REQUEST_MAX: Duration = Duration::from_millis(500);

/// Pacing for one provider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Minimum spacing between two requests on the same key.
    pub min_delay: Duration,
    /// Upper bound of the random extra spacing.
    pub jitter: Duration,
}

impl ThrottleConfig {
    pub const fn new(min_delay: Duration, jitter: Duration) -> Self {
        Self { min_delay, jitter }
    }

    /// Primary provider defaults: 2 s plus up to 3 s.
    pub const fn primary_default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(3))
    }

    /// Secondary provider defaults: 1 s plus up to 2 s.
    pub const fn secondary_default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(2))
    }

    fn spacing(&self) -> Duration {
        self.min_delay + random_duration(Duration::ZERO, self.jitter)
    }
}

/// Bounds of the short random sleep taken before every outbound call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelayRange {
    pub min: Duration,
    pub max: Duration,
}

impl DelayRange {
    pub const ZERO: Self = Self {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_PRE_REQUEST_MIN,
            max: DEFAULT_PRE_REQUEST_MAX,
        }
    }
}

/// Per-key request pacer.
pub struct Throttle {
    /// Reserved start time of the latest request per (provider, key).
    slots: Mutex<HashMap<(String, String), Instant>>,
    /// Per-provider pacing; providers not listed are not paced.
    configs: HashMap<String, ThrottleConfig>,
    pre_request_delay: DelayRange,
}

impl Throttle {
    /// Create a throttle with no provider pacing and the default pre-request delay.
    pub fn new() -> Self {
        Self::with_providers(std::iter::empty(), DelayRange::default())
    }

    /// Create a throttle with pacing for the given providers.
    pub fn with_providers(
        configs: impl IntoIterator<Item = (ProviderId, ThrottleConfig)>,
        pre_request_delay: DelayRange,
    ) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            configs: configs
                .into_iter()
                .map(|(id, config)| (id.into_owned(), config))
                .collect(),
            pre_request_delay,
        }
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<(String, String), Instant>> {
        self.slots.lock().unwrap_or_else(|poisoned| {
            warn!("Throttle mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Pacing configured for a provider.
    pub fn config(&self, provider: &ProviderId) -> ThrottleConfig {
        self.configs
            .get(provider.as_ref())
            .copied()
            .unwrap_or_default()
    }

    /// Wait until this key may send its next request.
    pub async fn await_turn(&self, provider: &ProviderId, key: &str) {
        let wait = self.reserve(provider, key);

        if wait > Duration::ZERO {
            debug!(
                "Throttle: waiting {:?} for '{}' key '{}'",
                wait, provider, key
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Reserve the next start slot for a key and return how long to wait for it.
    fn reserve(&self, provider: &ProviderId, key: &str) -> Duration {
        let spacing = self.config(provider).spacing();
        let now = Instant::now();

        let mut slots = self.lock_slots();
        let slot = match slots.get_mut(&(provider.to_string(), key.to_string())) {
            Some(last) => {
                let next = (*last + spacing).max(now);
                *last = next;
                next
            }
            None => {
                slots.insert((provider.to_string(), key.to_string()), now);
                now
            }
        };

        slot.saturating_duration_since(now)
    }

    /// Short random sleep before an outbound call so request timing is never
    /// perfectly periodic.
    pub async fn add_random_delay(&self) {
        let delay = random_duration(self.pre_request_delay.min, self.pre_request_delay.max);
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
    }

    /// Number of keys seen so far.
    pub fn tracked_keys(&self) -> usize {
        self.lock_slots().len()
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new()
    }
}

fn random_duration(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}
