//! Cookie session for the primary provider.
//!
//! The primary provider only answers API calls that carry the cookies its
//! website hands out to a browser loading the entry page. The session manager
//! obtains those cookies lazily, reuses them until they are older than the
//! refresh interval, and drops them when the provider rejects them.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header;

use super::throttle::{Throttle, SESSION_INIT_KEY};
use crate::errors::MarketDataError;
use crate::models::{ProviderId, Session};
use crate::provider::headers::navigation_headers;

/// Default age after which a session is refreshed.
const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Default timeout of the entry page request.
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Session manager configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Page whose `Set-Cookie` headers make up the session.
    pub entry_url: String,
    /// Sessions older than this are reacquired.
    pub refresh_interval: Duration,
    /// Timeout of the entry page request.
    pub timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            entry_url: "https://www.nseindia.com".to_string(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            timeout: DEFAULT_SESSION_TIMEOUT,
        }
    }
}

/// Something that can hand out a fresh set of session cookies.
#[async_trait]
pub trait CookieSource: Send + Sync {
    async fn fetch_cookies(&self) -> Result<BTreeMap<String, String>, MarketDataError>;
}

/// Loads the provider entry page and collects its cookies.
pub struct HttpCookieSource {
    client: reqwest::Client,
    provider: ProviderId,
    config: SessionConfig,
}

impl HttpCookieSource {
    pub fn new(client: reqwest::Client, provider: ProviderId, config: SessionConfig) -> Self {
        Self {
            client,
            provider,
            config,
        }
    }
}

#[async_trait]
impl CookieSource for HttpCookieSource {
    async fn fetch_cookies(&self) -> Result<BTreeMap<String, String>, MarketDataError> {
        let response = self
            .client
            .get(&self.config.entry_url)
            .headers(navigation_headers())
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::Timeout {
                        provider: self.provider.to_string(),
                    }
                } else {
                    MarketDataError::Network(e)
                }
            })?;

        let status = response.status();
        let cookies = parse_set_cookies(
            response
                .headers()
                .get_all(header::SET_COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        );

        debug!(
            "Session: entry page for '{}' returned {} with {} cookies",
            self.provider,
            status,
            cookies.len()
        );

        Ok(cookies)
    }
}

/// Extracts `name=value` from each `Set-Cookie` header, dropping attributes.
pub fn parse_set_cookies<'a>(headers: impl Iterator<Item = &'a str>) -> BTreeMap<String, String> {
    headers
        .filter_map(|raw| {
            let pair = raw.split(';').next()?.trim();
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Process-wide session for the primary provider.
pub struct SessionManager {
    provider: ProviderId,
    source: Arc<dyn CookieSource>,
    throttle: Arc<Throttle>,
    refresh_interval: Duration,
    session: RwLock<Session>,
    /// Serializes refreshes so a burst of stale callers performs one request.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl SessionManager {
    pub fn new(
        provider: ProviderId,
        source: Arc<dyn CookieSource>,
        throttle: Arc<Throttle>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            provider,
            source,
            throttle,
            refresh_interval,
            session: RwLock::new(Session::default()),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// True if a usable session exists, refreshing it first when stale.
    pub async fn ensure_valid(&self) -> bool {
        if !self.is_stale() {
            return true;
        }

        let _gate = self.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited
        if !self.is_stale() {
            return true;
        }

        match self.refresh().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Session: refresh for '{}' failed: {}", self.provider, e);
                false
            }
        }
    }

    async fn refresh(&self) -> Result<(), MarketDataError> {
        self.throttle
            .await_turn(&self.provider, SESSION_INIT_KEY)
            .await;
        self.throttle.add_random_delay().await;

        let cookies = self.source.fetch_cookies().await?;

        if cookies.is_empty() {
            self.invalidate();
            return Err(MarketDataError::SessionUnavailable {
                provider: self.provider.to_string(),
            });
        }

        info!(
            "Session: refreshed '{}' with {} cookies",
            self.provider,
            cookies.len()
        );
        *self.write_session() = Session::new(cookies);
        Ok(())
    }

    /// Drop the session; the next request performs a full refresh.
    pub fn invalidate(&self) {
        debug!("Session: invalidating '{}'", self.provider);
        *self.write_session() = Session::default();
    }

    /// Drop the session only if it is still the one `sent` was copied from.
    ///
    /// Returns false when another task refreshed it in the meantime; the newer
    /// session is kept.
    pub fn invalidate_if_current(&self, sent: &Session) -> bool {
        let mut session = self.write_session();
        if session.refreshed_at() != sent.refreshed_at() {
            debug!(
                "Session: '{}' was refreshed since the rejected request, keeping it",
                self.provider
            );
            return false;
        }
        debug!("Session: invalidating '{}'", self.provider);
        *session = Session::default();
        true
    }

    /// Copy of the current session.
    pub fn current(&self) -> Session {
        self.read_session().clone()
    }

    pub fn is_stale(&self) -> bool {
        self.read_session().is_stale(self.refresh_interval)
    }

    fn read_session(&self) -> std::sync::RwLockReadGuard<'_, Session> {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_session(&self) -> std::sync::RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(|poisoned| {
            warn!("Session lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
