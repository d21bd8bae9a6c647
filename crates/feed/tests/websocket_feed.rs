//! End-to-end feed client tests against a local WebSocket classifier stub.

use futures_util::SinkExt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use idsfeed_config::FeedConfig;
use idsfeed_lib::{ConnectionState, FeedClient, FeedHandle, WebSocketConnector};
use idsfeed_schema::{Classification, ConnectionEvent, TrafficSource};

/// Accepts WebSocket clients one at a time. Each connection gets the frames
/// sent on the next receiver from `sessions`, then the server closes it.
async fn start_classifier_stub(
    mut sessions: mpsc::UnboundedReceiver<Vec<Message>>,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Some(frames) = sessions.recv().await {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let mut ws = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(_) => continue,
            };
            for frame in frames {
                if ws.send(frame).await.is_err() {
                    break;
                }
            }
            let _ = ws.close(None).await;
        }
    });

    addr
}

fn record(id: &str, classification: &str, confidence: &str) -> Message {
    Message::Text(format!(
        r#"{{"id":"{id}","timestamp":"2025-06-01T08:00:00","src_ip":"10.9.8.7","src_port":5353,"dst_ip":"224.0.0.251","dst_port":5353,"protocol":"UDP","service":"mdns","duration":0.0,"src_bytes":120,"dst_bytes":0,"classification":"{classification}","traffic_source":"human","traffic_source_confidence":{confidence}}}"#
    ))
}

fn config_for(addr: SocketAddr) -> FeedConfig {
    let mut config = FeedConfig::default();
    config.name = "ws-integration".to_string();
    config.endpoint = format!("ws://{}", addr);
    config.buffer_capacity = 3;
    config.backoff.min_ms = 20;
    config.backoff.max_ms = 100;
    config
}

async fn wait_for<F>(handle: &FeedHandle, mut done: F)
where
    F: FnMut(&[ConnectionEvent], &ConnectionState) -> bool,
{
    let publisher = handle.publisher();
    for _ in 0..200 {
        let update = publisher.current();
        if done(&update.events, &update.state) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached, last update: {:?}", publisher.current());
}

#[tokio::test]
async fn test_stream_validated_into_bounded_window() {
    let (session_tx, session_rx) = mpsc::unbounded_channel();
    session_tx
        .send(vec![
            record("r1", "normal", "0.9"),
            Message::Text("not json at all".to_string()),
            record("r2", "weird", "\"NaN\""),
            Message::Binary(record("r3", "anomaly", "NaN").into_data()),
            Message::Ping(vec![1, 2, 3]),
            record("r4", "normal", "1.7"),
        ])
        .unwrap();
    let addr = start_classifier_stub(session_rx).await;

    let connector = WebSocketConnector::new(format!("ws://{}", addr));
    let handle = FeedClient::new(&config_for(addr), connector).spawn();

    wait_for(&handle, |events, _| {
        events.last().map(|e| e.id.as_str()) == Some("r4")
    })
    .await;

    let events = handle.publisher().current().events;
    let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["r2", "r3", "r4"]);

    assert_eq!(events[0].classification, Classification::Anomaly);
    assert_eq!(events[0].traffic_source_confidence, 0.5);
    assert_eq!(events[1].traffic_source_confidence, 0.5);
    assert_eq!(events[2].traffic_source_confidence, 0.5);
    assert_eq!(events[2].protocol, "udp");
    assert_eq!(events[2].traffic_source, TrafficSource::Human);
    assert_eq!(handle.stats().dropped(), 1);
    assert_eq!(handle.stats().accepted(), 4);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let (session_tx, session_rx) = mpsc::unbounded_channel();
    session_tx.send(vec![record("first", "normal", "0.2")]).unwrap();
    session_tx.send(vec![record("second", "anomaly", "0.8")]).unwrap();
    let addr = start_classifier_stub(session_rx).await;

    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&states);

    let connector = WebSocketConnector::new(format!("ws://{}", addr));
    let handle = FeedClient::new(&config_for(addr), connector).spawn();
    let subscription = handle.subscribe(move |state: &ConnectionState, events: &[ConnectionEvent]| {
        sink.lock().unwrap().push((state.clone(), events.len()));
    });

    wait_for(&handle, |events, _| events.len() == 2).await;

    let ids: Vec<_> = handle
        .publisher()
        .current()
        .events
        .iter()
        .map(|e| e.id.clone())
        .collect();
    assert_eq!(ids, vec!["first", "second"]);
    assert!(handle.stats().reconnects() >= 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let seen = states.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&(ConnectionState::Connecting, 0)));
    assert!(seen.iter().any(|(_, len)| *len == 2));

    assert!(handle.unsubscribe(subscription));
    assert!(!handle.unsubscribe(subscription));

    let publisher = handle.publisher();
    handle.shutdown().await.unwrap();
    assert_eq!(publisher.state(), ConnectionState::Stopped);
}

#[tokio::test]
async fn test_invalid_utf8_binary_frame_is_dropped() {
    let mut corrupt = record("bad", "normal", "0.4").into_data();
    let at = corrupt.windows(4).position(|w| w == b"mdns").unwrap();
    corrupt.insert(at + 2, 0xff);

    let (session_tx, session_rx) = mpsc::unbounded_channel();
    session_tx.send(vec![Message::Binary(corrupt)]).unwrap();
    let addr = start_classifier_stub(session_rx).await;

    let connector = WebSocketConnector::new(format!("ws://{}", addr));
    let handle = FeedClient::new(&config_for(addr), connector).spawn();
    let stats = handle.stats();

    for _ in 0..200 {
        if stats.dropped() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(stats.dropped(), 1);
    assert_eq!(stats.accepted(), 0);
    assert!(handle.publisher().current().events.is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_pings_keep_quiet_connection_alive() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        loop {
            tokio::time::sleep(Duration::from_millis(300)).await;
            if ws.send(Message::Ping(b"hb".to_vec())).await.is_err() {
                break;
            }
        }
    });

    let mut config = config_for(addr);
    config.read_timeout_secs = Some(1);
    let connector = WebSocketConnector::new(format!("ws://{}", addr));
    let handle = FeedClient::new(&config, connector).spawn();

    tokio::time::sleep(Duration::from_millis(3500)).await;

    assert_eq!(handle.state(), ConnectionState::Connected);
    assert_eq!(handle.stats().reconnects(), 0);
    assert_eq!(handle.stats().connect_attempts(), 1);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_endpoint_reports_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let connector = WebSocketConnector::new(format!("ws://{}", addr));
    let handle = FeedClient::new(&config_for(addr), connector).spawn();

    wait_for(&handle, |_, state| matches!(state, ConnectionState::Error(_))).await;
    assert!(handle.publisher().current().events.is_empty());

    let publisher = handle.publisher();
    handle.shutdown().await.unwrap();
    assert_eq!(publisher.state(), ConnectionState::Stopped);
}
