use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderValue,
    routing::get,
    Json, Router,
};
use equibot_market_data::{CircuitMetrics, Quote, StatisticsSnapshot};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{config::Config, main_lib::AppState};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitView {
    pub provider: String,
    pub state: String,
    pub failure_count: u32,
    pub seconds_since_last_failure: Option<u64>,
}

impl From<CircuitMetrics> for CircuitView {
    fn from(m: CircuitMetrics) -> Self {
        Self {
            provider: m.provider,
            state: m.state.to_string(),
            failure_count: m.failure_count,
            seconds_since_last_failure: m.last_failure.map(|at| at.elapsed().as_secs()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesHealth {
    #[serde(flatten)]
    pub statistics: StatisticsSnapshot,
    pub circuits: Vec<CircuitView>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn source_health(State(state): State<Arc<AppState>>) -> Json<SourcesHealth> {
    Json(SourcesHealth {
        statistics: state.quotes.statistics(),
        circuits: state
            .quotes
            .circuit_metrics()
            .into_iter()
            .map(CircuitView::from)
            .collect(),
    })
}

/// Always answers 200; when every live source fails the body is a
/// synthetic quote tagged with `"source": "synthetic"`.
async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Json<Quote> {
    let (quote, diagnostics) = state.quotes.get_quote_with_diagnostics(&symbol).await;
    tracing::debug!("Quote {} via {}", quote.symbol, diagnostics.summary());
    Json(quote)
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let cors = if config.cors_allow.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_allow
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect::<Vec<HeaderValue>>();
        CorsLayer::new().allow_origin(origins)
    };

    let api = Router::new()
        .route("/health", get(health))
        .route("/health/sources", get(source_health))
        .route("/quotes/{symbol}", get(get_quote));

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors)
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}
