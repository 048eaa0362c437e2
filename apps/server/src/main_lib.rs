use std::sync::Arc;

use equibot_market_data::QuoteOrchestrator;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

pub struct AppState {
    pub quotes: Arc<QuoteOrchestrator>,
}

pub fn init_tracing() {
    let log_format = std::env::var("EQB_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let md = &config.market_data;
    tracing::info!(
        "Quote chain: primary {} (session via {}), secondary {} (suffix '{}')",
        md.nse.base_url,
        md.nse.session.entry_url,
        md.yahoo.base_url,
        md.yahoo.symbol_suffix
    );
    let orchestrator = QuoteOrchestrator::from_config(md)?;

    Ok(Arc::new(AppState {
        quotes: Arc::new(orchestrator),
    }))
}
