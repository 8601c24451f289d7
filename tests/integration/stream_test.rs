//! Stream connection integration tests against a local feed

mod support;

use crypto_tracker::feed::IngressBuffer;
use crypto_tracker::ws::{ConnectionState, StreamConnection, SubscriptionRegistry, WsConfig};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use support::{wait_until, MockFeed};

fn connection(feed: &MockFeed) -> (StreamConnection, Arc<IngressBuffer>) {
    let config = WsConfig::new(feed.url())
        .max_reconnects(10)
        .reconnect_delay(Duration::from_millis(20));
    let buffer = Arc::new(IngressBuffer::new(100));
    let connection = StreamConnection::new(
        config,
        Arc::new(SubscriptionRegistry::new()),
        buffer.clone(),
    );
    (connection, buffer)
}

async fn wait_for_state(connection: &StreamConnection, state: ConnectionState) {
    let mut rx = connection.watch_state();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == state))
        .await
        .expect("state not reached within 5s")
        .expect("state channel closed");
}

#[tokio::test]
async fn test_subscriptions_replayed_on_connect() {
    let feed = MockFeed::start().await;
    let (connection, _buffer) = connection(&feed);

    // Not connected yet: recorded only
    assert!(!connection.subscribe(["ETHUSDT", "BTCUSDT"]));
    assert!(connection.connect());

    let frames = feed.wait_for_frames(1).await;
    assert_eq!(frames.len(), 1);
    let frame = &feed.json_frames()[0];
    assert_eq!(frame["method"], "SUBSCRIBE");
    assert_eq!(
        frame["params"],
        serde_json::json!(["btcusdt@miniTicker", "ethusdt@miniTicker"])
    );

    connection.close().await;
}

#[tokio::test]
async fn test_connect_is_noop_while_active() {
    let feed = MockFeed::start().await;
    let (connection, _buffer) = connection(&feed);

    assert!(connection.connect());
    assert!(!connection.connect());
    wait_for_state(&connection, ConnectionState::Connected).await;
    assert!(!connection.connect());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(feed.accepts(), 1);

    connection.close().await;
}

#[tokio::test]
async fn test_ticks_land_in_buffer() {
    let feed = MockFeed::start().await;
    let (connection, buffer) = connection(&feed);

    connection.subscribe_one("BTCUSDT");
    connection.connect();
    feed.wait_for_frames(1).await;

    feed.send(r#"{"result":null,"id":1}"#);
    feed.send("not json");
    feed.send_ticker("BTCUSDT", "50000.5");

    wait_until(|| buffer.len() == 1).await;
    let tick = buffer.pop().unwrap();
    assert_eq!(tick.symbol, "BTCUSDT");
    assert_eq!(tick.last_price, dec!(50000.5));

    connection.close().await;
}

#[tokio::test]
async fn test_subscribe_while_connected_is_idempotent() {
    let feed = MockFeed::start().await;
    let (connection, _buffer) = connection(&feed);

    connection.connect();
    wait_for_state(&connection, ConnectionState::Connected).await;
    // Let the open-time replay pass first
    tokio::time::sleep(Duration::from_millis(50)).await;

    connection.subscribe_one("SOLUSDT");
    assert!(!connection.subscribe_one("SOLUSDT"));

    feed.wait_for_frames(1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let frames = feed.json_frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["params"], serde_json::json!(["solusdt@miniTicker"]));

    assert!(connection.unsubscribe_one("SOLUSDT"));
    let frames = feed.wait_for_frames(2).await;
    let unsubscribe: serde_json::Value = serde_json::from_str(&frames[1]).unwrap();
    assert_eq!(unsubscribe["method"], "UNSUBSCRIBE");

    connection.close().await;
}

#[tokio::test]
async fn test_reconnect_after_drop_replays_subscriptions() {
    let feed = MockFeed::start().await;
    let (connection, _buffer) = connection(&feed);

    connection.subscribe(["BTCUSDT", "ETHUSDT"]);
    connection.connect();
    feed.wait_for_frames(1).await;

    feed.drop_connections();
    feed.wait_for_accepts(2).await;

    feed.wait_for_frames(2).await;
    let frames = feed.json_frames();
    assert_eq!(frames[0]["params"], frames[1]["params"]);

    let replay = &frames[1];
    assert_eq!(replay["method"], "SUBSCRIBE");
    assert_eq!(
        replay["params"],
        serde_json::json!(["btcusdt@miniTicker", "ethusdt@miniTicker"])
    );

    wait_for_state(&connection, ConnectionState::Connected).await;
    assert_eq!(connection.reconnect_attempts(), 0);

    connection.close().await;
}

#[tokio::test]
async fn test_manual_close_does_not_reconnect() {
    let feed = MockFeed::start().await;
    let (connection, _buffer) = connection(&feed);

    connection.connect();
    wait_for_state(&connection, ConnectionState::Connected).await;

    connection.close().await;
    assert!(!connection.is_running());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(feed.accepts(), 1);
    assert_ne!(connection.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_reconnect_attempts_are_capped() {
    let feed = MockFeed::start_rejecting().await;
    let (connection, _buffer) = connection(&feed);

    connection.connect();

    // One initial attempt plus ten reconnects
    feed.wait_for_accepts(11).await;
    wait_until(|| !connection.is_running()).await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(feed.accepts(), 11);
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    // An explicit connect starts a fresh round of attempts
    assert!(connection.connect());
    feed.wait_for_accepts(12).await;

    connection.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_subscribe_during_open_sends_each_symbol_once() {
    let feed = MockFeed::start().await;
    let (connection, _buffer) = connection(&feed);
    let connection = Arc::new(connection);

    let symbols: Vec<String> = (0..60).map(|i| format!("SYM{i}USDT")).collect();
    let subscriber = {
        let connection = connection.clone();
        let symbols = symbols.clone();
        tokio::spawn(async move {
            for symbol in &symbols {
                connection.subscribe_one(symbol);
                tokio::task::yield_now().await;
            }
        })
    };
    connection.connect();
    subscriber.await.unwrap();
    wait_for_state(&connection, ConnectionState::Connected).await;

    let sent = || -> Vec<String> {
        feed.json_frames()
            .iter()
            .filter(|frame| frame["method"] == "SUBSCRIBE")
            .flat_map(|frame| frame["params"].as_array().cloned().unwrap_or_default())
            .filter_map(|param| param.as_str().map(str::to_string))
            .collect()
    };
    wait_until(|| {
        let sent = sent();
        symbols
            .iter()
            .all(|s| sent.contains(&format!("{}@miniTicker", s.to_lowercase())))
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let sent = sent();
    assert_eq!(sent.len(), symbols.len());
    for symbol in &symbols {
        let stream = format!("{}@miniTicker", symbol.to_lowercase());
        assert_eq!(sent.iter().filter(|s| **s == stream).count(), 1, "{stream}");
    }

    connection.close().await;
}
