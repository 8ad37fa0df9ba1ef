#![allow(clippy::unwrap_used)]
// Integration tests for the SSE transport using wiremock.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tablero_api::{
    EventStreamHandle, ReconnectConfig, StaticToken, StreamMessage, StreamStatus, TransportConfig,
};

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
}

fn fast_retry() -> ReconnectConfig {
    ReconnectConfig {
        retry_delay: Duration::from_millis(50),
        max_retries: None,
    }
}

async fn wait_for_status(
    rx: &mut tokio::sync::watch::Receiver<StreamStatus>,
    want: StreamStatus,
) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| *s == want))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_stream_delivers_parsed_messages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mesas/stream"))
        .and(header("accept", "text/event-stream"))
        .respond_with(sse(concat!(
            "data: {\"type\":\"connected\",\"message\":\"ok\"}\n\n",
            ": heartbeat\n\n",
            "data: not-json\n\n",
            "data: {\"type\":\"mesa_update\",\"data\":[{\"id_mesa\":1,\"estado\":\"ocupada\",\"updated_at\":100}]}\n\n",
        )))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let url = Url::parse(&format!("{}/mesas/stream", server.uri())).unwrap();
    let handle = EventStreamHandle::connect(
        url,
        Arc::new(StaticToken::anonymous()),
        &TransportConfig::default(),
        fast_retry(),
        cancel.clone(),
    )
    .unwrap();
    let mut rx = handle.subscribe();

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(*first, StreamMessage::Connected { .. }));

    // The malformed frame is skipped without ending the connection.
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let StreamMessage::TableUpdate(ref tables) = *second else {
        panic!("expected table update, got {second:?}");
    };
    assert_eq!(tables[0].id_mesa, 1);

    handle.shutdown();
    let mut status = handle.status();
    wait_for_status(&mut status, StreamStatus::Closed).await;
}

#[tokio::test]
async fn test_stream_reconnects_after_body_ends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mesas/stream"))
        .respond_with(sse("id: 7\ndata: {\"type\":\"connected\"}\n\n"))
        .expect(2..)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let url = Url::parse(&format!("{}/mesas/stream", server.uri())).unwrap();
    let handle = EventStreamHandle::connect(
        url,
        Arc::new(StaticToken::anonymous()),
        &TransportConfig::default(),
        fast_retry(),
        cancel.clone(),
    )
    .unwrap();
    let mut rx = handle.subscribe();

    for _ in 0..2 {
        let msg = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(*msg, StreamMessage::Connected { .. }));
    }

    cancel.cancel();

    // The retry carried the last event id.
    let requests = server.received_requests().await.unwrap();
    assert!(
        requests
            .iter()
            .skip(1)
            .any(|r| r.headers.get("last-event-id").is_some_and(|v| v == "7")),
        "no reconnect carried Last-Event-ID"
    );
}

#[tokio::test]
async fn test_stream_unauthorized_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mesas/stream"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let url = Url::parse(&format!("{}/mesas/stream", server.uri())).unwrap();
    let handle = EventStreamHandle::connect(
        url,
        Arc::new(StaticToken::anonymous()),
        &TransportConfig::default(),
        fast_retry(),
        cancel.clone(),
    )
    .unwrap();

    let mut status = handle.status();
    wait_for_status(&mut status, StreamStatus::Unauthorized).await;

    // Give a would-be retry time to happen; the mock expects one call.
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
}

#[tokio::test]
async fn test_stream_gives_up_after_retry_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/mesas/stream"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let url = Url::parse(&format!("{}/mesas/stream", server.uri())).unwrap();
    let handle = EventStreamHandle::connect(
        url,
        Arc::new(StaticToken::anonymous()),
        &TransportConfig::default(),
        ReconnectConfig {
            retry_delay: Duration::from_millis(10),
            max_retries: Some(2),
        },
        CancellationToken::new(),
    )
    .unwrap();

    let mut status = handle.status();
    wait_for_status(&mut status, StreamStatus::Closed).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}
