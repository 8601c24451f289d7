//! End-to-end pipeline tests: mocked REST endpoints plus a local push feed

mod support;

use crypto_tracker::config::Config;
use crypto_tracker::dispatch::PriceUpdate;
use crypto_tracker::market::{Direction, SymbolPair};
use crypto_tracker::pipeline::Pipeline;
use crypto_tracker::ws::ConnectionState;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use support::{wait_until, MockFeed};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, feed: &MockFeed) -> Config {
    let mut config = Config::default();
    config.endpoints.rest_url = server.uri();
    config.endpoints.stream_url = feed.url();
    config.baseline.retry_delay_secs = 1;
    config.stream.reconnect_delay_secs = 1;
    config.dispatch.interval_ms = 10;
    config
}

async fn mount_open_prices(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/tradingDay"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_tick_fans_out_to_every_row_of_symbol() {
    let server = MockServer::start().await;
    let feed = MockFeed::start().await;
    mount_open_prices(
        &server,
        serde_json::json!([
            {"symbol": "ETHUSDT", "openPrice": "50.00"},
            {"symbol": "BTCUSDT", "openPrice": "100.00"}
        ]),
    )
    .await;

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<PriceUpdate>>();
    let pipeline = Pipeline::new(&config(&server, &feed), Arc::new(tx)).unwrap();

    let ids = pipeline
        .track_many(vec![
            SymbolPair::new("ETHUSDT", "ETH", "USDT"),
            SymbolPair::new("BTCUSDT", "BTC", "USDT"),
            SymbolPair::new("ETHUSDT", "ETH", "USDT"),
        ])
        .await;
    assert_eq!(ids.len(), 3);
    assert_eq!(pipeline.baselines().get("ETHUSDT"), Some(dec!(50)));

    pipeline.start();
    feed.wait_for_frames(1).await;
    wait_until(|| pipeline.dispatcher().is_running()).await;
    assert_eq!(pipeline.connection().state(), ConnectionState::Connected);

    feed.send_ticker("ETHUSDT", "45.00");

    let batch = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.len(), 2);
    let rows: Vec<_> = batch.iter().map(|u| u.row).collect();
    assert_eq!(rows, vec![ids[0], ids[2]]);
    for update in &batch {
        assert_eq!(update.price, dec!(45));
        assert_eq!(update.change, dec!(-5));
        assert_eq!(update.change_percent, dec!(-10));
        assert_eq!(update.direction(), Direction::Down);
    }

    let row = pipeline.rows().get(ids[2]).unwrap();
    assert_eq!(row.state.price, dec!(45));
    let untouched = pipeline.rows().get(ids[1]).unwrap();
    assert_eq!(untouched.state.price, dec!(0));

    pipeline.shutdown().await;
    assert!(!pipeline.dispatcher().is_running());
}

#[tokio::test]
async fn test_last_row_removal_unsubscribes() {
    let server = MockServer::start().await;
    let feed = MockFeed::start().await;
    mount_open_prices(&server, serde_json::json!([{"symbol": "ETHUSDT", "openPrice": "50"}])).await;

    let (tx, _rx) = mpsc::unbounded_channel::<Vec<PriceUpdate>>();
    let pipeline = Pipeline::new(&config(&server, &feed), Arc::new(tx)).unwrap();

    let first = pipeline.track(SymbolPair::from_symbol("ETHUSDT")).await;
    let second = pipeline.track(SymbolPair::from_symbol("ETHUSDT")).await;

    pipeline.start();
    feed.wait_for_frames(1).await;

    pipeline.untrack(first).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(feed.frames().len(), 1);
    assert!(pipeline.connection().registry().contains("ETHUSDT"));

    pipeline.untrack(second).unwrap();
    let frames = feed.wait_for_frames(2).await;
    let frame: serde_json::Value = serde_json::from_str(&frames[1]).unwrap();
    assert_eq!(frame["method"], "UNSUBSCRIBE");
    assert_eq!(frame["params"], serde_json::json!(["ethusdt@miniTicker"]));
    assert!(pipeline.rows().is_empty());

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_zero_baseline_is_refetched() {
    let server = MockServer::start().await;
    let feed = MockFeed::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/tradingDay"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{"symbol": "SOLUSDT", "openPrice": "0.0"}])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_open_prices(&server, serde_json::json!([{"symbol": "SOLUSDT", "openPrice": "20.5"}])).await;

    let (tx, _rx) = mpsc::unbounded_channel::<Vec<PriceUpdate>>();
    let pipeline = Pipeline::new(&config(&server, &feed), Arc::new(tx)).unwrap();

    pipeline.track(SymbolPair::from_symbol("SOLUSDT")).await;
    assert_eq!(pipeline.baselines().get("SOLUSDT"), None);

    wait_until(|| pipeline.baselines().get("SOLUSDT") == Some(dec!(20.5))).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    pipeline.shutdown().await;
}

fn requested_symbols(request: &wiremock::Request) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(key, _)| key == "symbols")
        .map(|(_, value)| value.into_owned())
}

#[tokio::test]
async fn test_startup_fetches_baselines_once() {
    let server = MockServer::start().await;
    let feed = MockFeed::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/tradingDay"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"symbol": "BTCUSDT", "openPrice": "100"},
            {"symbol": "SOLUSDT", "openPrice": "0"}
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_open_prices(&server, serde_json::json!([{"symbol": "SOLUSDT", "openPrice": "5"}])).await;

    let (tx, _rx) = mpsc::unbounded_channel::<Vec<PriceUpdate>>();
    let pipeline = Pipeline::new(&config(&server, &feed), Arc::new(tx)).unwrap();

    pipeline
        .track_many(vec![
            SymbolPair::from_symbol("BTCUSDT"),
            SymbolPair::from_symbol("BTCUSDT"),
            SymbolPair::from_symbol("SOLUSDT"),
        ])
        .await;
    pipeline.start();
    feed.wait_for_frames(1).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requested_symbols(&requests[0]).as_deref(),
        Some(r#"["BTCUSDT","SOLUSDT"]"#)
    );

    // One retry wave for the zero subset, nothing after it resolves
    wait_until(|| pipeline.baselines().get("SOLUSDT") == Some(dec!(5))).await;
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requested_symbols(&requests[1]).as_deref(), Some(r#"["SOLUSDT"]"#));
    assert_eq!(pipeline.baselines().get("BTCUSDT"), Some(dec!(100)));

    pipeline.shutdown().await;
}
