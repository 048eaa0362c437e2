use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::Context;
use equibot_market_data::MarketDataConfig;
use rust_decimal::Decimal;

/// Headroom the HTTP timeout keeps over the quote chain's deadline.
const QUOTE_DEADLINE_MARGIN: Duration = Duration::from_secs(5);

pub struct Config {
    pub listen_addr: SocketAddr,
    pub cors_allow: Vec<String>,
    /// HTTP layer timeout. Never below the quote chain's deadline plus
    /// [`QUOTE_DEADLINE_MARGIN`], so a quote request always completes with a
    /// (possibly synthetic) body.
    pub request_timeout: Duration,
    pub market_data: MarketDataConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let listen_addr: SocketAddr = var("EQB_LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse()
            .context("Invalid EQB_LISTEN_ADDR")?;
        let cors_allow = var("EQB_CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let timeout_ms: u64 = var("EQB_REQUEST_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(60_000);

        let mut md = MarketDataConfig::default();

        if let Some(url) = var("EQB_NSE_BASE_URL") {
            md.nse.session.entry_url = url.clone();
            md.nse.base_url = url;
        }
        if let Some(url) = var("EQB_NSE_ENTRY_URL") {
            md.nse.session.entry_url = url;
        }
        if let Some(ms) = parse::<u64>(&var, "EQB_NSE_MIN_DELAY_MS")? {
            md.nse.throttle.min_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&var, "EQB_NSE_JITTER_MS")? {
            md.nse.throttle.jitter = Duration::from_millis(ms);
        }
        if let Some(secs) = parse::<u64>(&var, "EQB_SESSION_REFRESH_SECS")? {
            md.nse.session.refresh_interval = Duration::from_secs(secs);
        }

        if let Some(url) = var("EQB_YAHOO_BASE_URL") {
            md.yahoo.base_url = url;
        }
        if let Some(suffix) = var("EQB_YAHOO_SYMBOL_SUFFIX") {
            md.yahoo.symbol_suffix = suffix;
        }
        if let Some(ms) = parse::<u64>(&var, "EQB_YAHOO_MIN_DELAY_MS")? {
            md.yahoo.throttle.min_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&var, "EQB_YAHOO_JITTER_MS")? {
            md.yahoo.throttle.jitter = Duration::from_millis(ms);
        }

        if let Some(ms) = parse::<u64>(&var, "EQB_PROVIDER_TIMEOUT_MS")? {
            md.nse.timeout = Duration::from_millis(ms);
            md.yahoo.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&var, "EQB_PRE_REQUEST_DELAY_MIN_MS")? {
            md.pre_request_delay.min = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&var, "EQB_PRE_REQUEST_DELAY_MAX_MS")? {
            md.pre_request_delay.max = Duration::from_millis(ms);
        }
        if md.pre_request_delay.max < md.pre_request_delay.min {
            md.pre_request_delay.max = md.pre_request_delay.min;
        }

        if let Some(n) = parse::<u32>(&var, "EQB_BREAKER_THRESHOLD")? {
            md.circuit_breaker.failure_threshold = n.max(1);
        }
        if let Some(secs) = parse::<u64>(&var, "EQB_BREAKER_TIMEOUT_SECS")? {
            md.circuit_breaker.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse::<u64>(&var, "EQB_RATE_LIMIT_RETRY_MS")? {
            md.rate_limit_retry.delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&var, "EQB_QUOTE_TIMEOUT_MS")? {
            md.request_timeout = Duration::from_millis(ms);
        }
        if let Some(base) = parse::<Decimal>(&var, "EQB_SYNTHETIC_BASE")? {
            md.synthetic.nominal_base = base;
        }

        let request_timeout =
            Duration::from_millis(timeout_ms).max(md.request_timeout + QUOTE_DEADLINE_MARGIN);

        Ok(Self {
            listen_addr,
            cors_allow,
            request_timeout,
            market_data: md,
        })
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|v| v.trim().parse::<T>().with_context(|| format!("Invalid {key}")))
        .transpose()
}
