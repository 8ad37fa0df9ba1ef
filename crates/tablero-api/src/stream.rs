//! Server-Sent Events stream with EventSource-style reconnect.
//!
//! Connects to the server's event-stream endpoint and broadcasts parsed
//! [`StreamMessage`]s through a [`tokio::sync::broadcast`] channel, while
//! publishing the transport's [`StreamStatus`] through a `watch`.
//!
//! Reconnection follows the EventSource model: a fixed retry delay that
//! the server may change with a `retry:` field, and the last seen event
//! id resent as `Last-Event-ID`. A 401 on the handshake is terminal.
//!
//! # Example
//!
//! ```rust,ignore
//! use tablero_api::stream::{EventStreamHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let url = client.url("mesas/stream")?;
//! let handle = EventStreamHandle::connect(
//!     url,
//!     client.tokens(),
//!     &TransportConfig::default(),
//!     ReconnectConfig::default(),
//!     cancel.clone(),
//! )?;
//! let mut rx = handle.subscribe();
//!
//! while let Ok(msg) = rx.recv().await {
//!     println!("{msg:?}");
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::auth::{TokenProvider, bearer_header};
use crate::error::Error;
use crate::models::{MesaRecord, ReservacionRecord};
use crate::transport::TransportConfig;

// ── Broadcast channel capacity ───────────────────────────────────────

const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// Largest event, or unterminated line, the decoder buffers. Anything
/// bigger is dropped up to the next event boundary.
const MAX_EVENT_BYTES: usize = 1024 * 1024;

// ── StreamMessage ────────────────────────────────────────────────────

/// A parsed message from the event stream.
///
/// Closed over the message kinds the dashboard understands; anything
/// else lands in [`Unknown`](Self::Unknown) and is ignored downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// Handshake greeting. Logged only.
    Connected { message: Option<String> },
    /// One or more tables changed.
    TableUpdate(Vec<MesaRecord>),
    /// One or more reservations changed.
    ReservationUpdate(Vec<ReservacionRecord>),
    /// A well-formed message of a type this client does not handle.
    Unknown { kind: String },
}

/// Raw JSON envelope: `{ "type": "...", "data": ..., "message": "..." }`.
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl StreamMessage {
    /// Parse an SSE `data` payload.
    ///
    /// The message type comes from the JSON `type` field, falling back to
    /// the SSE `event:` name when the payload omits it. `data` may be a
    /// single object or an array of objects.
    pub fn parse(event_name: &str, payload: &str) -> Result<Self, Error> {
        let raw: RawMessage = serde_json::from_str(payload).map_err(|e| deser_error(&e, payload))?;

        let kind = match raw.kind {
            Some(kind) => kind,
            None if event_name != "message" => event_name.to_owned(),
            None => {
                return Err(Error::Deserialization {
                    message: "stream message has no type".into(),
                    body: payload.to_owned(),
                });
            }
        };

        match kind.as_str() {
            "connected" => Ok(Self::Connected {
                message: raw.message,
            }),
            "mesa_update" => Ok(Self::TableUpdate(records(raw.data, payload)?)),
            "reserva_update" | "reservacion_update" => {
                Ok(Self::ReservationUpdate(records(raw.data, payload)?))
            }
            _ => Ok(Self::Unknown { kind }),
        }
    }
}

fn records<T: serde::de::DeserializeOwned>(
    data: Option<serde_json::Value>,
    payload: &str,
) -> Result<Vec<T>, Error> {
    match data {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(|e| deser_error(&e, payload)))
            .collect(),
        Some(obj @ serde_json::Value::Object(_)) => serde_json::from_value(obj)
            .map(|one| vec![one])
            .map_err(|e| deser_error(&e, payload)),
        _ => Err(Error::Deserialization {
            message: "update message has no data".into(),
            body: payload.to_owned(),
        }),
    }
}

fn deser_error(e: &serde_json::Error, payload: &str) -> Error {
    Error::Deserialization {
        message: e.to_string(),
        body: payload.to_owned(),
    }
}

// ── StreamStatus ─────────────────────────────────────────────────────

/// Transport-level state, mirroring EventSource `readyState` plus the
/// terminal outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Handshake in progress (first attempt or a retry).
    Connecting,
    /// Response headers received; messages are flowing.
    Open,
    /// The connection failed or dropped; a retry is pending.
    Error,
    /// The server rejected the credential. No further retries.
    Unauthorized,
    /// The loop has exited (shutdown or retry limit).
    Closed,
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// EventSource-style retry configuration.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay between a drop and the next attempt. Default: 3s.
    /// The server may override it with a `retry:` field.
    pub retry_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(3),
            max_retries: None,
        }
    }
}

// ── EventStreamHandle ────────────────────────────────────────────────

/// Handle to a running event stream.
///
/// Call [`shutdown`](Self::shutdown) (or cancel the token passed to
/// [`connect`](Self::connect)) to tear down the background task.
pub struct EventStreamHandle {
    message_rx: broadcast::Receiver<Arc<StreamMessage>>,
    status_rx: watch::Receiver<StreamStatus>,
    cancel: CancellationToken,
}

impl EventStreamHandle {
    /// Spawn the connect/read/retry loop for `url`.
    ///
    /// Returns once the task is spawned; the first handshake happens
    /// asynchronously. Must be called inside a tokio runtime.
    pub fn connect(
        url: Url,
        tokens: Arc<dyn TokenProvider>,
        transport: &TransportConfig,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        let http = transport.build_stream_client()?;
        let (message_tx, message_rx) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        let (status_tx, status_rx) = watch::channel(StreamStatus::Connecting);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let conn = Connection {
                http,
                url,
                tokens,
                message_tx,
                status_tx,
            };
            sse_loop(conn, reconnect, task_cancel).await;
        });

        Ok(Self {
            message_rx,
            status_rx,
            cancel,
        })
    }

    /// Get a new broadcast receiver for parsed messages.
    ///
    /// If a consumer falls behind, it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StreamMessage>> {
        self.message_rx.resubscribe()
    }

    /// Observe the transport status.
    pub fn status(&self) -> watch::Receiver<StreamStatus> {
        self.status_rx.clone()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

struct Connection {
    http: reqwest::Client,
    url: Url,
    tokens: Arc<dyn TokenProvider>,
    message_tx: broadcast::Sender<Arc<StreamMessage>>,
    status_tx: watch::Sender<StreamStatus>,
}

/// Main loop: connect → read → on drop, wait `retry` → reconnect.
async fn sse_loop(conn: Connection, reconnect: ReconnectConfig, cancel: CancellationToken) {
    let mut decoder = SseDecoder::new(reconnect.retry_delay);
    let mut failures: u32 = 0;

    loop {
        conn.status_tx.send_replace(StreamStatus::Connecting);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&conn, &mut decoder, &cancel) => result,
        };

        if cancel.is_cancelled() {
            break;
        }

        match result {
            Ok(()) => {
                tracing::info!("event stream ended, reconnecting");
                failures = 0;
            }
            Err(Error::Authentication { message }) => {
                tracing::warn!(%message, "event stream rejected credential, not retrying");
                conn.status_tx.send_replace(StreamStatus::Unauthorized);
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, failures, "event stream error");
                failures += 1;

                if let Some(max) = reconnect.max_retries {
                    if failures > max {
                        tracing::error!(max_retries = max, "event stream retry limit reached, giving up");
                        break;
                    }
                }
            }
        }

        conn.status_tx.send_replace(StreamStatus::Error);

        let delay = decoder.retry_delay();
        tracing::debug!(delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "waiting before reconnect");

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    conn.status_tx.send_replace(StreamStatus::Closed);
    tracing::debug!("event stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open one streaming response and read events until it ends.
async fn connect_and_read(
    conn: &Connection,
    decoder: &mut SseDecoder,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %conn.url, "connecting to event stream");

    let mut request = conn
        .http
        .get(conn.url.clone())
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .header(reqwest::header::CACHE_CONTROL, "no-cache");
    if let Some(token) = conn.tokens.bearer_token() {
        request = request.header(reqwest::header::AUTHORIZATION, bearer_header(&token));
    }
    if let Some(id) = decoder.last_event_id() {
        request = request.header("Last-Event-ID", id);
    }

    let resp = request.send().await?;
    match resp.status() {
        StatusCode::UNAUTHORIZED => {
            return Err(Error::Authentication {
                message: "event stream handshake returned 401".into(),
            });
        }
        status if !status.is_success() => {
            return Err(Error::Stream(format!("handshake returned HTTP {status}")));
        }
        _ => {}
    }

    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("text/event-stream") {
        return Err(Error::Stream(format!(
            "unexpected content type {content_type:?}"
        )));
    }

    conn.status_tx.send_replace(StreamStatus::Open);
    tracing::info!("event stream open");

    decoder.reset();
    let mut body = resp.bytes_stream();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            chunk = body.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        for event in decoder.feed(&bytes) {
                            parse_and_broadcast(&event, &conn.message_tx);
                        }
                    }
                    Some(Err(e)) => return Err(Error::Transport(e)),
                    None => return Ok(()),
                }
            }
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse a dispatched SSE event and broadcast it. Malformed payloads are
/// logged and dropped; they never end the connection.
fn parse_and_broadcast(event: &SseEvent, message_tx: &broadcast::Sender<Arc<StreamMessage>>) {
    match StreamMessage::parse(&event.event, &event.data) {
        Ok(msg) => {
            // No receivers right now is fine.
            let _ = message_tx.send(Arc::new(msg));
        }
        Err(e) => {
            tracing::warn!(error = %e, event = %event.event, "discarding malformed stream message");
        }
    }
}

// ── SSE wire decoding ────────────────────────────────────────────────

/// A dispatched event (blank-line terminated block with at least one
/// `data:` line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Lines may be split across chunks; partial lines are buffered as
/// bytes so multi-byte UTF-8 sequences survive the split. The last
/// event id and retry delay persist across [`reset`](Self::reset).
#[derive(Debug)]
pub(crate) struct SseDecoder {
    pending: BytesMut,
    data: String,
    event: Option<String>,
    last_event_id: Option<String>,
    retry: Duration,
    /// The rest of the current line was over the limit.
    skip_line: bool,
    /// The current event was over the limit.
    discard: bool,
}

impl SseDecoder {
    pub(crate) fn new(retry: Duration) -> Self {
        Self {
            pending: BytesMut::new(),
            data: String::new(),
            event: None,
            last_event_id: None,
            retry,
            skip_line: false,
            discard: false,
        }
    }

    pub(crate) fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    pub(crate) fn retry_delay(&self) -> Duration {
        self.retry
    }

    /// Drop any half-read event before a new connection.
    pub(crate) fn reset(&mut self) {
        self.pending.clear();
        self.data.clear();
        self.event = None;
        self.skip_line = false;
        self.discard = false;
    }

    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line = self.pending.split_to(pos + 1);
            if std::mem::take(&mut self.skip_line) {
                continue;
            }
            let line = line.strip_suffix(b"\n").unwrap_or(&line[..]);
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let line = String::from_utf8_lossy(line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        if self.pending.len() > MAX_EVENT_BYTES {
            tracing::warn!(
                buffered = self.pending.len(),
                "event stream line exceeds size limit, discarding event"
            );
            self.pending.clear();
            self.skip_line = true;
            self.discard = true;
        }

        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.push_data(value),
            "event" => self.event = Some(value.to_owned()),
            "id" if !value.contains('\0') => self.last_event_id = Some(value.to_owned()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Duration::from_millis(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn push_data(&mut self, value: &str) {
        if self.discard {
            return;
        }
        if self.data.len() + value.len() >= MAX_EVENT_BYTES {
            tracing::warn!(
                buffered = self.data.len(),
                "event stream event exceeds size limit, discarding"
            );
            self.data.clear();
            self.discard = true;
            return;
        }
        self.data.push_str(value);
        self.data.push('\n');
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take().unwrap_or_else(|| "message".into());
        if std::mem::take(&mut self.discard) {
            self.data.clear();
            return None;
        }
        if self.data.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop();
        Some(SseEvent { event, data })
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::UpdatedAt;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.retry_delay, Duration::from_secs(3));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn decoder_handles_lines_split_across_chunks() {
        let mut dec = SseDecoder::new(Duration::from_secs(3));
        assert!(dec.feed(b"data: {\"type\":").is_empty());
        assert!(dec.feed(b"\"connected\"}\n").is_empty());
        let events = dec.feed(b"\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "message".into(),
                data: "{\"type\":\"connected\"}".into(),
            }]
        );
    }

    #[test]
    fn decoder_joins_multiline_data_and_skips_comments() {
        let mut dec = SseDecoder::new(Duration::from_secs(3));
        let events = dec.feed(b": keep-alive\r\ndata: a\r\ndata: b\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "a\nb");
    }

    #[test]
    fn decoder_tracks_id_retry_and_event_name() {
        let mut dec = SseDecoder::new(Duration::from_secs(3));
        let events = dec.feed(b"id: 42\nretry: 1500\nevent: mesa_update\ndata: {}\n\n");
        assert_eq!(events[0].event, "mesa_update");
        assert_eq!(dec.last_event_id(), Some("42"));
        assert_eq!(dec.retry_delay(), Duration::from_millis(1500));

        dec.reset();
        assert_eq!(dec.last_event_id(), Some("42"));
    }

    #[test]
    fn decoder_ignores_blocks_without_data() {
        let mut dec = SseDecoder::new(Duration::from_secs(3));
        assert!(dec.feed(b"event: ping\n\n").is_empty());
        // The event name does not leak into the next block.
        let events = dec.feed(b"data: x\n\n");
        assert_eq!(events[0].event, "message");
    }

    #[test]
    fn decoder_drops_an_unterminated_line_over_the_limit() {
        let mut dec = SseDecoder::new(Duration::from_secs(3));
        assert!(dec.feed(b"data: ").is_empty());
        let chunk = vec![b'x'; 64 * 1024];
        for _ in 0..20 {
            assert!(dec.feed(&chunk).is_empty());
        }
        assert!(dec.pending.len() <= MAX_EVENT_BYTES + chunk.len());

        let events = dec.feed(b"xx\n\ndata: ok\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "message".into(),
                data: "ok".into(),
            }]
        );
    }

    #[test]
    fn decoder_drops_an_event_whose_data_lines_exceed_the_limit() {
        let mut dec = SseDecoder::new(Duration::from_secs(3));
        let mut line = b"data: ".to_vec();
        line.extend(vec![b'y'; 300 * 1024]);
        line.push(b'\n');
        for _ in 0..4 {
            assert!(dec.feed(&line).is_empty());
        }
        assert!(dec.data.is_empty());

        let events = dec.feed(b"\ndata: next\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "next");
    }

    #[test]
    fn decoder_keeps_utf8_split_across_chunks() {
        let mut dec = SseDecoder::new(Duration::from_secs(3));
        let text = "data: Reservación\n\n".as_bytes();
        let (a, b) = text.split_at(16);
        assert!(dec.feed(a).is_empty());
        let events = dec.feed(b);
        assert_eq!(events[0].data, "Reservación");
    }

    #[test]
    fn parse_connected() {
        let msg =
            StreamMessage::parse("message", r#"{"type":"connected","message":"hola"}"#).unwrap();
        assert_eq!(
            msg,
            StreamMessage::Connected {
                message: Some("hola".into())
            }
        );
    }

    #[test]
    fn parse_table_update_array() {
        let msg = StreamMessage::parse(
            "message",
            r#"{"type":"mesa_update","data":[{"id_mesa":1,"estado":"ocupada","updated_at":100}]}"#,
        )
        .unwrap();
        let StreamMessage::TableUpdate(tables) = msg else {
            panic!("expected table update");
        };
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].estado.as_deref(), Some("ocupada"));
        assert_eq!(tables[0].updated_at, Some(UpdatedAt::Counter(100)));
    }

    #[test]
    fn parse_reservation_update_single_object_and_alias() {
        for kind in ["reserva_update", "reservacion_update"] {
            let payload = format!(
                r#"{{"type":"{kind}","data":{{"id_reserva":7,"estado":"confirmada","updated_at":5}}}}"#
            );
            let msg = StreamMessage::parse("message", &payload).unwrap();
            assert!(
                matches!(msg, StreamMessage::ReservationUpdate(ref r) if r.len() == 1 && r[0].id_reserva == 7),
                "{kind}: {msg:?}"
            );
        }
    }

    #[test]
    fn parse_falls_back_to_event_name() {
        let msg = StreamMessage::parse("mesa_update", r#"{"data":[{"id_mesa":2}]}"#).unwrap();
        assert!(matches!(msg, StreamMessage::TableUpdate(_)));
    }

    #[test]
    fn parse_unknown_type_is_not_an_error() {
        let msg = StreamMessage::parse("message", r#"{"type":"menu_update","data":[]}"#).unwrap();
        assert_eq!(
            msg,
            StreamMessage::Unknown {
                kind: "menu_update".into()
            }
        );
    }

    #[test]
    fn parse_rejects_malformed_payloads() {
        assert!(StreamMessage::parse("message", "not json").is_err());
        assert!(StreamMessage::parse("message", r#"{"data":[]}"#).is_err());
        assert!(StreamMessage::parse("message", r#"{"type":"mesa_update"}"#).is_err());
        assert!(
            StreamMessage::parse("message", r#"{"type":"mesa_update","data":[{"estado":"x"}]}"#)
                .is_err()
        );
    }

    #[test]
    fn parse_and_broadcast_drops_malformed() {
        let (tx, mut rx) = broadcast::channel::<Arc<StreamMessage>>(16);
        parse_and_broadcast(
            &SseEvent {
                event: "message".into(),
                data: "{oops".into(),
            },
            &tx,
        );
        assert!(rx.try_recv().is_err());

        parse_and_broadcast(
            &SseEvent {
                event: "message".into(),
                data: r#"{"type":"connected"}"#.into(),
            },
            &tx,
        );
        assert!(matches!(
            *rx.try_recv().unwrap(),
            StreamMessage::Connected { .. }
        ));
    }
}
