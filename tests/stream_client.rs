//! Stream Client Integration Tests
//!
//! Exercises the full client lifecycle over an in-memory transport:
//! authentication, subscription deltas, dispatch, reconnection, and
//! shutdown.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use alpaca_stream::{Channel, StreamClient, StreamClientError, StreamConfig};

use support::MockConnector;

fn test_config() -> StreamConfig {
    let mut config = StreamConfig::new("test-key", "test-secret").unwrap();
    config.websocket.auth_timeout = Duration::from_millis(500);
    config.websocket.heartbeat_interval = Duration::from_secs(60);
    config.websocket.reconnect_delay_initial = Duration::from_millis(10);
    config.websocket.reconnect_delay_max = Duration::from_millis(50);
    config.websocket.max_reconnect_attempts = 3;
    config.websocket.shutdown_timeout = Duration::from_secs(1);
    config
}

fn test_client(connector: &MockConnector) -> StreamClient {
    support::init_tracing();
    StreamClient::with_connector(test_config(), Arc::new(connector.clone()))
}

/// Give the driver task a moment to process queued work.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn connect_authenticates_and_disconnect_tears_down() {
    let connector = MockConnector::new();
    let client = test_client(&connector);

    client.connect().await.unwrap();

    assert!(client.is_connected());
    assert!(client.is_authenticated());
    assert_eq!(connector.connect_count(), 1);

    let sent = connector.sent_texts();
    assert!(sent[0].contains(r#""action":"auth""#));
    assert!(sent[0].contains("test-key"));
    assert!(sent[0].contains("test-secret"));

    client.disconnect().await;
    assert!(!client.is_connected());
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn connect_is_noop_when_already_authenticated() {
    let connector = MockConnector::new();
    let client = test_client(&connector);

    client.connect().await.unwrap();
    client.connect().await.unwrap();

    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test]
async fn connect_times_out_without_authentication() {
    let connector = MockConnector::silent();
    let client = {
        let mut config = test_config();
        config.websocket.auth_timeout = Duration::from_millis(100);
        StreamClient::with_connector(config, Arc::new(connector.clone()))
    };

    let result = client.connect().await;

    assert!(matches!(result, Err(StreamClientError::Authentication(_))));
    assert!(!client.is_connected());
    assert!(!client.is_authenticated());
    assert!(!client.will_reconnect());
}

#[tokio::test]
async fn auth_error_ack_is_not_fatal_before_timeout() {
    let connector = MockConnector::silent();
    let client = {
        let mut config = test_config();
        config.websocket.auth_timeout = Duration::from_millis(200);
        StreamClient::with_connector(config, Arc::new(connector.clone()))
    };

    let client_task = async { client.connect().await };
    let inject_task = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        connector.inject(r#"[{"T":"error","code":402,"msg":"auth failed"}]"#);
    };

    let (result, ()) = tokio::join!(client_task, inject_task);

    // The error ack is logged only; the timeout is the surfacing point.
    assert!(matches!(result, Err(StreamClientError::Authentication(_))));
}

#[tokio::test]
async fn subscriptions_registered_before_connect_are_replayed() {
    let connector = MockConnector::new();
    let client = test_client(&connector);

    client.subscribe_quotes(["aapl", "MSFT"], Arc::new(|_| {}));
    client.subscribe_bars("spy", Arc::new(|_| {}));

    client.connect().await.unwrap();
    settle().await;

    let sent = connector.sent_texts();
    assert!(
        sent.iter()
            .any(|t| t.contains(r#""action":"subscribe""#)
                && t.contains(r#""quotes":["AAPL","MSFT"]"#)),
        "expected quote replay in {sent:?}"
    );
    assert!(
        sent.iter()
            .any(|t| t.contains(r#""action":"subscribe""#) && t.contains(r#""bars":["SPY"]"#)),
        "expected bar replay in {sent:?}"
    );
}

#[tokio::test]
async fn subscribe_while_connected_sends_only_new_symbols() {
    let connector = MockConnector::new();
    let client = test_client(&connector);
    client.connect().await.unwrap();

    client.subscribe_quotes("AAPL", Arc::new(|_| {}));
    settle().await;

    client.subscribe_quotes(["aapl", "msft"], Arc::new(|_| {}));
    settle().await;

    let subscribes: Vec<String> = connector
        .sent_texts()
        .into_iter()
        .filter(|t| t.contains(r#""action":"subscribe""#))
        .collect();

    assert_eq!(subscribes.len(), 2);
    assert!(subscribes[0].contains(r#""quotes":["AAPL"]"#));
    assert!(subscribes[1].contains(r#""quotes":["MSFT"]"#));
    assert!(!subscribes[1].contains("AAPL"));
}

#[tokio::test]
async fn fully_duplicate_subscribe_sends_nothing() {
    let connector = MockConnector::new();
    let client = test_client(&connector);
    client.connect().await.unwrap();

    client.subscribe_trades(["TSLA"], Arc::new(|_| {}));
    settle().await;
    let before = connector.sent_texts().len();

    client.subscribe_trades(["tsla", "TSLA"], Arc::new(|_| {}));
    settle().await;

    assert_eq!(connector.sent_texts().len(), before);
}

#[tokio::test]
async fn unsubscribe_sends_only_the_intersection() {
    let connector = MockConnector::new();
    let client = test_client(&connector);
    client.connect().await.unwrap();

    client.subscribe_quotes(["AAPL", "MSFT"], Arc::new(|_| {}));
    settle().await;

    client.unsubscribe_quotes(["msft", "TSLA"]);
    settle().await;

    let unsubscribes: Vec<String> = connector
        .sent_texts()
        .into_iter()
        .filter(|t| t.contains(r#""action":"unsubscribe""#))
        .collect();

    assert_eq!(unsubscribes.len(), 1);
    assert!(unsubscribes[0].contains(r#""quotes":["MSFT"]"#));
    assert!(!unsubscribes[0].contains("TSLA"));
    assert_eq!(
        client.subscriptions(Channel::Quotes),
        vec!["AAPL".to_string()]
    );
}

#[tokio::test]
async fn unsubscribe_of_unknown_symbols_sends_nothing() {
    let connector = MockConnector::new();
    let client = test_client(&connector);
    client.connect().await.unwrap();
    let before = connector.sent_texts().len();

    client.unsubscribe_bars(["SPY"]);
    settle().await;

    assert_eq!(connector.sent_texts().len(), before);
}

#[tokio::test]
async fn inbound_data_reaches_handlers() {
    let connector = MockConnector::new();
    let client = test_client(&connector);

    let quotes = Arc::new(Mutex::new(Vec::new()));
    let trades = Arc::new(Mutex::new(Vec::new()));

    let quote_sink = Arc::clone(&quotes);
    client.subscribe_quotes("AAPL", Arc::new(move |q| {
        quote_sink.lock().unwrap().push(q);
    }));
    let trade_sink = Arc::clone(&trades);
    client.subscribe_trades("AAPL", Arc::new(move |t| {
        trade_sink.lock().unwrap().push(t);
    }));

    client.connect().await.unwrap();

    connector.inject(
        r#"[
            {"T":"q","S":"AAPL","bp":150.0,"bs":1,"ap":150.01,"as":2,"bx":"Q","ax":"P","t":"2024-01-15T10:00:00Z"},
            {"T":"t","S":"AAPL","i":96921,"p":150.005,"s":100,"x":"D","t":"2024-01-15T10:00:01Z"}
        ]"#,
    );
    settle().await;

    let quotes = quotes.lock().unwrap();
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].symbol, "AAPL");
    assert!((quotes[0].bid_price - 150.0).abs() < f64::EPSILON);

    let trades = trades.lock().unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].trade_id, "96921");
}

#[tokio::test]
async fn malformed_record_does_not_stop_the_stream() {
    let connector = MockConnector::new();
    let client = test_client(&connector);

    let bars = Arc::new(Mutex::new(Vec::new()));
    let bar_sink = Arc::clone(&bars);
    client.subscribe_bars("SPY", Arc::new(move |b| {
        bar_sink.lock().unwrap().push(b);
    }));

    client.connect().await.unwrap();

    connector.inject(r#"[{"T":"b","S":"SPY","t":"garbage"}]"#);
    connector.inject(
        r#"[{"T":"b","S":"SPY","o":388.9,"h":389.1,"l":388.8,"c":389.0,"v":49378,"n":461,"vw":389.06,"t":"2024-01-15T10:00:00Z"}]"#,
    );
    settle().await;

    assert!(client.is_authenticated());
    let bars = bars.lock().unwrap();
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].volume, 49378);
}

#[tokio::test]
async fn panicking_handler_does_not_kill_the_connection() {
    let connector = MockConnector::new();
    let client = test_client(&connector);

    let delivered = Arc::new(Mutex::new(0usize));
    client.subscribe_quotes("AAPL", Arc::new(|_| panic!("handler failure")));
    let counter = Arc::clone(&delivered);
    client.subscribe_quotes("AAPL", Arc::new(move |_| {
        *counter.lock().unwrap() += 1;
    }));

    client.connect().await.unwrap();

    connector.inject(r#"[{"T":"q","S":"AAPL","bp":150.0,"ap":150.01}]"#);
    settle().await;

    assert!(client.is_authenticated());
    assert_eq!(*delivered.lock().unwrap(), 1);
}

#[tokio::test]
async fn unanswered_pings_force_a_reconnect() {
    let connector = MockConnector::new();
    let client = {
        let mut config = test_config();
        config.websocket.heartbeat_interval = Duration::from_millis(30);
        config.websocket.heartbeat_timeout = Duration::from_millis(20);
        StreamClient::with_connector(config, Arc::new(connector.clone()))
    };

    client.connect().await.unwrap();

    // The mock never answers pings and sends no traffic after the auth
    // acks, so the grace period lapses and the driver rebuilds the
    // connection rather than sitting on a silent socket.
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(
        connector.connect_count() >= 2,
        "expected a heartbeat-driven reconnect, got {} connections",
        connector.connect_count()
    );
}

#[tokio::test]
async fn dropped_connection_reconnects_and_restores_subscriptions() {
    let connector = MockConnector::new();
    let client = test_client(&connector);

    client.subscribe_quotes(["AAPL"], Arc::new(|_| {}));
    client.connect().await.unwrap();
    settle().await;

    connector.drop_connection();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(client.is_authenticated());
    assert!(connector.connect_count() >= 2);

    // Every authentication replays the registry.
    let replays = connector
        .sent_texts()
        .into_iter()
        .filter(|t| t.contains(r#""action":"subscribe""#) && t.contains("AAPL"))
        .count();
    assert!(replays >= 2, "expected replay after reconnect");
}

#[tokio::test]
async fn reconnect_gives_up_after_max_attempts() {
    let connector = MockConnector::new();
    let client = test_client(&connector);

    client.connect().await.unwrap();

    connector.fail_next_connects(usize::MAX);
    connector.drop_connection();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(!client.is_connected());
    assert!(!client.will_reconnect());
    assert_eq!(client.reconnect_attempts(), 3);
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test]
async fn disconnect_prevents_reconnection() {
    let connector = MockConnector::new();
    let client = test_client(&connector);

    client.connect().await.unwrap();
    client.disconnect().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(connector.connect_count(), 1);
    assert!(!client.is_connected());
}

#[tokio::test]
async fn client_can_reconnect_after_disconnect() {
    let connector = MockConnector::new();
    let client = test_client(&connector);
    client.subscribe_quotes("AAPL", Arc::new(|_| {}));

    client.connect().await.unwrap();
    client.disconnect().await;
    client.connect().await.unwrap();
    settle().await;

    assert!(client.is_authenticated());
    assert_eq!(connector.connect_count(), 2);
    assert_eq!(
        client.subscriptions(Channel::Quotes),
        vec!["AAPL".to_string()]
    );
}

#[tokio::test]
async fn dropping_session_guard_disables_reconnection() {
    let connector = MockConnector::new();
    let client = test_client(&connector);

    {
        let _session = client.session().await.unwrap();
        assert!(client.will_reconnect());
    }

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!client.will_reconnect());
    assert!(!client.is_connected());
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test]
async fn session_guard_connects_and_disconnects() {
    let connector = MockConnector::new();
    let client = test_client(&connector);

    {
        let session = client.session().await.unwrap();
        assert!(session.is_authenticated());
        session.subscribe_quotes("AAPL", Arc::new(|_| {}));
        session.close().await;
    }

    assert!(!client.is_connected());
    assert_eq!(
        client.subscriptions(Channel::Quotes),
        vec!["AAPL".to_string()]
    );
}
