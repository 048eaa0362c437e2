//! End-to-end chain over HTTP: entry page cookies, NSE quote, Yahoo fallback.

use std::time::Duration;

use equibot_market_data::{
    MarketDataConfig, QuoteOrchestrator, QuoteSource, SkipReason, ThrottleConfig,
};
use rust_decimal_macros::dec;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INFY_NSE: &str = r#"{
    "info": {"symbol": "INFY", "companyName": "Infosys Limited"},
    "priceInfo": {"lastPrice": "1,510.25", "change": 10.25, "pChange": 0.68,
                  "previousClose": 1500, "open": 1502.5,
                  "intraDayHighLow": {"min": 1498.1, "max": 1515.0}}
}"#;

const INFY_CHART: &str = r#"{"chart":{"result":[{"meta":{
    "longName": "Infosys Limited", "regularMarketPrice": 1509.9,
    "previousClose": 1500.0, "regularMarketDayHigh": 1514.0,
    "regularMarketDayLow": 1497.0, "regularMarketVolume": 4200000}}],"error":null}}"#;

fn config(nse: &MockServer, yahoo: &MockServer) -> MarketDataConfig {
    let mut config = MarketDataConfig::default();
    config.nse.base_url = nse.uri();
    config.nse.session.entry_url = nse.uri();
    config.nse.throttle = ThrottleConfig::default();
    config.nse.timeout = Duration::from_secs(2);
    config.yahoo.base_url = yahoo.uri();
    config.yahoo.throttle = ThrottleConfig::default();
    config.yahoo.timeout = Duration::from_secs(2);
    config.pre_request_delay.min = Duration::ZERO;
    config.pre_request_delay.max = Duration::ZERO;
    config
}

async fn mount_entry_page(nse: &MockServer, expected_hits: u64) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "nsit=abc; Path=/; HttpOnly")
                .append_header("set-cookie", "bm_sv=def; Path=/")
                .set_body_string("<html></html>"),
        )
        .expect(expected_hits)
        .mount(nse)
        .await;
}

#[tokio::test]
async fn primary_quote_uses_session_cookies() {
    let nse = MockServer::start().await;
    let yahoo = MockServer::start().await;
    mount_entry_page(&nse, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/quote-equity"))
        .and(query_param("symbol", "INFY"))
        .and(header("cookie", "bm_sv=def; nsit=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INFY_NSE))
        .expect(2)
        .mount(&nse)
        .await;

    let orchestrator = QuoteOrchestrator::from_config(&config(&nse, &yahoo)).unwrap();

    let first = orchestrator.get_quote(" infy ").await;
    let second = orchestrator.get_quote("INFY").await;

    assert_eq!(first.source, QuoteSource::Primary);
    assert_eq!(first.last_price, dec!(1510.25));
    assert_eq!(first.company_name.as_deref(), Some("Infosys Limited"));
    assert_eq!(second.source, QuoteSource::Primary);

    let stats = orchestrator.statistics();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.provider("NSE").unwrap().success, 2);
}

#[tokio::test]
async fn rejected_session_is_refreshed_then_secondary_serves() {
    let nse = MockServer::start().await;
    let yahoo = MockServer::start().await;
    // Initial session plus the refresh after the 401.
    mount_entry_page(&nse, 2).await;
    Mock::given(method("GET"))
        .and(path("/api/quote-equity"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&nse)
        .await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/INFY.NS"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INFY_CHART))
        .mount(&yahoo)
        .await;

    let orchestrator = QuoteOrchestrator::from_config(&config(&nse, &yahoo)).unwrap();

    let (first, diagnostics) = orchestrator.get_quote_with_diagnostics("INFY").await;
    assert_eq!(first.source, QuoteSource::Secondary);
    assert_eq!(first.last_price, dec!(1509.9));
    assert_eq!(diagnostics.network_attempts("NSE"), 1);

    let second = orchestrator.get_quote("INFY").await;
    assert_eq!(second.source, QuoteSource::Secondary);

    let stats = orchestrator.statistics();
    let nse_stats = stats.provider("NSE").unwrap();
    assert_eq!(nse_stats.failure, 2);
    assert_eq!(
        nse_stats.last_failure.as_ref().map(|f| f.reason.as_str()),
        Some("authentication_failure")
    );
    assert_eq!(stats.provider("YAHOO").unwrap().success, 2);
}

#[tokio::test]
async fn open_breaker_skips_secondary_and_serves_synthetic() {
    let nse = MockServer::start().await;
    let yahoo = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&nse)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&yahoo)
        .await;

    let mut config = config(&nse, &yahoo);
    config.circuit_breaker.failure_threshold = 2;
    let orchestrator = QuoteOrchestrator::from_config(&config).unwrap();

    for _ in 0..2 {
        let quote = orchestrator.get_quote("TCS").await;
        assert_eq!(quote.source, QuoteSource::Synthetic);
    }

    let (quote, diagnostics) = orchestrator.get_quote_with_diagnostics("TCS").await;
    assert_eq!(quote.source, QuoteSource::Synthetic);
    assert!(diagnostics.was_skipped("NSE", &SkipReason::SessionUnavailable));
    assert!(diagnostics.was_skipped("YAHOO", &SkipReason::CircuitBreakerOpen));
    assert_eq!(orchestrator.statistics().synthetic, 3);
}
