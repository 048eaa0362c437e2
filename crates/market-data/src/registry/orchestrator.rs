//! Fallback orchestrator: primary -> secondary -> synthetic.
//!
//! `get_quote` is total. Every provider failure is caught here, recorded, and
//! turned into "try the next tier"; the synthetic tier cannot fail. The
//! orchestrator owns all shared state (throttle slots, session, breaker,
//! statistics) and is meant to be created once and shared via `Arc`.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use super::{
    CircuitBreaker, CircuitMetrics, CookieSource, FetchDiagnostics, HttpCookieSource,
    ResponseValidator, SessionManager, SkipReason, SourceStatistics, StatisticsSnapshot, Throttle,
};
use crate::config::MarketDataConfig;
use crate::errors::{MarketDataError, RateLimitRetryPolicy, RetryClass};
use crate::models::{normalize_symbol, ProviderId, Quote, Session};
use crate::provider::{MarketDataProvider, NseProvider, SyntheticQuoteGenerator, YahooChartProvider};

/// Identifier of the synthetic tier in statistics and diagnostics.
pub const SYNTHETIC_PROVIDER_ID: &str = "SYNTHETIC";

/// Drives the fallback chain for a single quote request.
pub struct QuoteOrchestrator {
    primary: Arc<dyn MarketDataProvider>,
    secondary: Arc<dyn MarketDataProvider>,
    synthetic: SyntheticQuoteGenerator,
    sessions: SessionManager,
    throttle: Arc<Throttle>,
    circuit_breaker: CircuitBreaker,
    validator: ResponseValidator,
    stats: Arc<SourceStatistics>,
    retry_policy: RateLimitRetryPolicy,
    primary_timeout: Duration,
    secondary_timeout: Duration,
    request_timeout: Duration,
}

impl QuoteOrchestrator {
    /// Build the production chain: NSE, Yahoo chart and the synthetic generator,
    /// sharing one HTTP client.
    pub fn from_config(config: &MarketDataConfig) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder().build()?;

        let primary = Arc::new(NseProvider::new(client.clone(), &config.nse.base_url));
        let secondary = Arc::new(YahooChartProvider::new(
            client.clone(),
            &config.yahoo.base_url,
            &config.yahoo.symbol_suffix,
        ));
        let cookies = Arc::new(HttpCookieSource::new(
            client,
            Cow::Borrowed(primary.id()),
            config.nse.session.clone(),
        ));

        Ok(Self::new(primary, secondary, cookies, config))
    }

    /// Build a chain from explicit parts.
    pub fn new(
        primary: Arc<dyn MarketDataProvider>,
        secondary: Arc<dyn MarketDataProvider>,
        cookies: Arc<dyn CookieSource>,
        config: &MarketDataConfig,
    ) -> Self {
        let primary_id: ProviderId = Cow::Borrowed(primary.id());
        let secondary_id: ProviderId = Cow::Borrowed(secondary.id());

        let throttle = Arc::new(Throttle::with_providers(
            [
                (primary_id.clone(), config.nse.throttle),
                (secondary_id, config.yahoo.throttle),
            ],
            config.pre_request_delay,
        ));

        let sessions = SessionManager::new(
            primary_id,
            cookies,
            throttle.clone(),
            config.nse.session.refresh_interval,
        );

        Self {
            primary,
            secondary,
            synthetic: SyntheticQuoteGenerator::new(
                config.synthetic.nominal_base,
                config.synthetic.max_jitter_percent,
            ),
            sessions,
            throttle,
            circuit_breaker: CircuitBreaker::with_config(config.circuit_breaker.clone()),
            validator: ResponseValidator::new(),
            stats: Arc::new(SourceStatistics::new()),
            retry_policy: config.rate_limit_retry.clone(),
            primary_timeout: config.nse.timeout,
            secondary_timeout: config.yahoo.timeout,
            request_timeout: config.request_timeout,
        }
    }

    /// Record into an existing statistics tracker instead of a private one.
    pub fn with_statistics(mut self, stats: Arc<SourceStatistics>) -> Self {
        self.stats = stats;
        self
    }

    /// Current quote for `symbol`. Never fails; worst case the quote is
    /// synthetic, which its `source` says.
    pub async fn get_quote(&self, symbol: &str) -> Quote {
        self.get_quote_with_diagnostics(symbol).await.0
    }

    /// Like [`get_quote`](Self::get_quote), plus a record of what each tier did.
    pub async fn get_quote_with_diagnostics(&self, symbol: &str) -> (Quote, FetchDiagnostics) {
        self.stats.record_request();
        let mut diagnostics = FetchDiagnostics::new();

        let Some(symbol) = normalize_symbol(symbol) else {
            warn!("Rejected symbol {:?}, serving synthetic quote", symbol);
            diagnostics.record_skip(Cow::Borrowed(self.primary.id()), SkipReason::InvalidSymbol);
            let quote = self.serve_synthetic(&symbol.trim().to_uppercase(), &mut diagnostics);
            return (quote, diagnostics);
        };

        // Tier whose outcome is not yet recorded; survives the deadline dropping
        // the in-flight future.
        let mut in_flight: Option<ProviderId> = None;
        let live = tokio::time::timeout(
            self.request_timeout,
            self.fetch_live(&symbol, &mut diagnostics, &mut in_flight),
        )
        .await;

        match live {
            Ok(Some(quote)) => {
                debug!("Quote for {}: {}", symbol, diagnostics.summary());
                return (quote, diagnostics);
            }
            Ok(None) => {}
            Err(_) => {
                warn!(
                    "Quote request for {} exceeded {:?}, abandoning live tiers",
                    symbol, self.request_timeout
                );
                self.record_abandoned(&symbol, in_flight, &mut diagnostics);
            }
        }

        let quote = self.serve_synthetic(&symbol, &mut diagnostics);
        info!(
            "Served synthetic quote for {} ({})",
            symbol,
            diagnostics.summary()
        );
        (quote, diagnostics)
    }

    /// Point-in-time copy of the per-provider counters.
    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot()
    }

    /// Breaker state of every provider seen so far.
    pub fn circuit_metrics(&self) -> Vec<CircuitMetrics> {
        self.circuit_breaker.metrics()
    }

    async fn fetch_live(
        &self,
        symbol: &str,
        diagnostics: &mut FetchDiagnostics,
        in_flight: &mut Option<ProviderId>,
    ) -> Option<Quote> {
        *in_flight = Some(Cow::Borrowed(self.primary.id()));
        let primary = self.try_primary(symbol, diagnostics).await;
        *in_flight = None;
        if primary.is_some() {
            return primary;
        }
        self.try_secondary(symbol, diagnostics, in_flight).await
    }

    /// Bookkeeping for the tier cut off by the request deadline. An admitted
    /// secondary call counts as a breaker failure, which also ends a trial.
    fn record_abandoned(
        &self,
        symbol: &str,
        in_flight: Option<ProviderId>,
        diagnostics: &mut FetchDiagnostics,
    ) {
        let secondary_id: ProviderId = Cow::Borrowed(self.secondary.id());

        match in_flight {
            Some(provider_id) => {
                let error = MarketDataError::Timeout {
                    provider: provider_id.to_string(),
                };
                let reached_secondary = provider_id == secondary_id;
                if reached_secondary {
                    self.circuit_breaker.record_failure(&provider_id);
                }
                self.stats.record_failure(&provider_id, symbol, error.reason());
                diagnostics.record_error(provider_id, error.to_string());
                if !reached_secondary {
                    diagnostics.record_skip(secondary_id, SkipReason::RequestTimedOut);
                }
            }
            None => diagnostics.record_skip(secondary_id, SkipReason::RequestTimedOut),
        }
    }

    async fn try_primary(&self, symbol: &str, diagnostics: &mut FetchDiagnostics) -> Option<Quote> {
        let provider_id: ProviderId = Cow::Borrowed(self.primary.id());

        self.throttle.await_turn(&provider_id, symbol).await;

        let session = if self.primary.requires_session() {
            if !self.sessions.ensure_valid().await {
                let error = MarketDataError::SessionUnavailable {
                    provider: provider_id.to_string(),
                };
                warn!("{}, skipping to next tier for {}", error, symbol);
                self.stats.record_failure(&provider_id, symbol, error.reason());
                diagnostics.record_skip(provider_id, SkipReason::SessionUnavailable);
                return None;
            }
            Some(self.sessions.current())
        } else {
            None
        };

        match self
            .attempt(self.primary.as_ref(), symbol, session.as_ref(), self.primary_timeout)
            .await
        {
            Ok(quote) => {
                self.stats.record_success(&provider_id, symbol);
                diagnostics.record_success(provider_id);
                Some(quote)
            }
            Err(e) => {
                if e.retry_class() == RetryClass::InvalidateSession {
                    if let Some(sent) = &session {
                        self.sessions.invalidate_if_current(sent);
                    }
                }
                warn!("Provider '{}' failed for {}: {}", provider_id, symbol, e);
                self.stats.record_failure(&provider_id, symbol, e.reason());
                diagnostics.record_error(provider_id, e.to_string());
                None
            }
        }
    }

    async fn try_secondary(
        &self,
        symbol: &str,
        diagnostics: &mut FetchDiagnostics,
        in_flight: &mut Option<ProviderId>,
    ) -> Option<Quote> {
        let provider_id: ProviderId = Cow::Borrowed(self.secondary.id());

        if !self.circuit_breaker.is_allowed(&provider_id) {
            debug!(
                "{}, skipping network call for {}",
                MarketDataError::CircuitOpen {
                    provider: provider_id.to_string()
                },
                symbol
            );
            diagnostics.record_skip(provider_id, SkipReason::CircuitBreakerOpen);
            return None;
        }

        *in_flight = Some(provider_id.clone());
        self.throttle.await_turn(&provider_id, symbol).await;

        let mut retries = 0;
        let result = loop {
            let outcome = self
                .attempt(self.secondary.as_ref(), symbol, None, self.secondary_timeout)
                .await;

            match outcome {
                Ok(quote) => break Ok(quote),
                Err(e) => match self.retry_policy.next_delay(&e, retries) {
                    Some(delay) => {
                        info!(
                            "Provider '{}' rate limited for {}, retrying in {:?}",
                            provider_id, symbol, delay
                        );
                        diagnostics.record_error(provider_id.clone(), e.to_string());
                        diagnostics.retries += 1;
                        retries += 1;
                        tokio::time::sleep(delay).await;
                    }
                    None => break Err(e),
                },
            }
        };

        *in_flight = None;
        match result {
            Ok(quote) => {
                self.circuit_breaker.record_success(&provider_id);
                self.stats.record_success(&provider_id, symbol);
                diagnostics.record_success(provider_id);
                Some(quote)
            }
            Err(e) => {
                warn!("Provider '{}' failed for {}: {}", provider_id, symbol, e);
                self.circuit_breaker.record_failure(&provider_id);
                self.stats.record_failure(&provider_id, symbol, e.reason());
                diagnostics.record_error(provider_id, e.to_string());
                None
            }
        }
    }

    /// One request to one provider: jitter, bounded fetch, classify, parse, validate.
    async fn attempt(
        &self,
        provider: &dyn MarketDataProvider,
        symbol: &str,
        session: Option<&Session>,
        timeout: Duration,
    ) -> Result<Quote, MarketDataError> {
        self.throttle.add_random_delay().await;

        let body = tokio::time::timeout(timeout, provider.fetch(symbol, session))
            .await
            .map_err(|_| MarketDataError::Timeout {
                provider: provider.id().to_string(),
            })??;

        self.validator.ensure_json(provider.id(), &body)?;

        let quote = provider.parse_quote(symbol, &body)?;
        self.validator.validate_quote(&quote)?;

        Ok(quote)
    }

    fn serve_synthetic(&self, symbol: &str, diagnostics: &mut FetchDiagnostics) -> Quote {
        self.stats.record_synthetic(symbol);
        diagnostics.record_success(Cow::Borrowed(SYNTHETIC_PROVIDER_ID));
        self.synthetic.generate(symbol)
    }
}
