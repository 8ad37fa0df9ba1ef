// ── Push channel ──
//
// Bridges the server's event stream into the reconciler. Transport
// status becomes the dashboard's `ConnectionState`; every table or
// reservation record in a message becomes one revision-checked update.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use strum::Display;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use tablero_api::{EventStreamHandle, ReconnectConfig, StreamMessage, StreamStatus, TransportConfig};

use crate::auth::Session;
use crate::error::CoreError;
use crate::model::{Reservation, Table, Update};
use crate::poll::{Poller, SyncDomain};
use crate::reconcile::{Origin, Reconciler};

/// Push channel health as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Online,
    Offline,
}

impl From<StreamStatus> for ConnectionState {
    fn from(status: StreamStatus) -> Self {
        match status {
            StreamStatus::Connecting => Self::Connecting,
            StreamStatus::Open => Self::Online,
            StreamStatus::Error | StreamStatus::Unauthorized | StreamStatus::Closed => {
                Self::Offline
            }
        }
    }
}

/// What the bridge task needs, bundled to keep the spawn call short.
pub(crate) struct PushWiring {
    pub reconciler: Reconciler,
    pub poller: Poller,
    pub session: Arc<Session>,
    pub state: Arc<watch::Sender<ConnectionState>>,
}

/// A running push channel: the stream transport plus its bridge task.
pub(crate) struct PushChannel {
    handle: EventStreamHandle,
    cancel: CancellationToken,
    closed: AtomicBool,
}

impl PushChannel {
    /// Start the stream and the bridge task. Returns once both are
    /// spawned; the handshake happens in the background.
    pub(crate) fn open(
        url: Url,
        transport: &TransportConfig,
        reconnect: ReconnectConfig,
        wiring: PushWiring,
        cancel: CancellationToken,
    ) -> Result<(Self, JoinHandle<()>), CoreError> {
        let handle = EventStreamHandle::connect(
            url.clone(),
            wiring.session.tokens(),
            transport,
            reconnect,
            cancel.clone(),
        )?;
        let bridge = tokio::spawn(bridge_task(
            handle.subscribe(),
            handle.status(),
            wiring,
            cancel.clone(),
        ));
        info!(%url, "event stream spawned (handshake in progress)");
        Ok((
            Self {
                handle,
                cancel,
                closed: AtomicBool::new(false),
            },
            bridge,
        ))
    }

    /// The transport gave up for good (credential rejected or retry
    /// limit reached).
    pub(crate) fn is_finished(&self) -> bool {
        matches!(
            *self.handle.status().borrow(),
            StreamStatus::Unauthorized | StreamStatus::Closed
        )
    }

    /// Tear down the stream. Returns `true` on the first call only.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.handle.shutdown();
        self.cancel.cancel();
        debug!("event stream closed");
        true
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn bridge_task(
    mut messages: broadcast::Receiver<Arc<StreamMessage>>,
    mut status: watch::Receiver<StreamStatus>,
    wiring: PushWiring,
    cancel: CancellationToken,
) {
    let mut status_open = true;
    let mut been_online = false;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = status.changed(), if status_open => {
                if changed.is_err() {
                    status_open = false;
                    continue;
                }
                let current = *status.borrow_and_update();
                on_status(&wiring, current, &mut been_online);
            }
            result = messages.recv() => match result {
                Ok(message) => on_message(&wiring, &message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event bridge lagged, requesting a full poll");
                    wiring.poller.request(SyncDomain::Tables);
                    wiring.poller.request(SyncDomain::Reservations);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    wiring.state.send_replace(ConnectionState::Offline);
    debug!("event bridge stopped");
}

fn on_status(wiring: &PushWiring, status: StreamStatus, been_online: &mut bool) {
    let state = ConnectionState::from(status);
    wiring.state.send_if_modified(|current| {
        let changed = *current != state;
        *current = state;
        changed
    });

    match status {
        StreamStatus::Open => {
            if *been_online {
                // Events sent while we were away are lost; catch up.
                info!("event stream reconnected, requesting a full poll");
                wiring.poller.request(SyncDomain::Tables);
                wiring.poller.request(SyncDomain::Reservations);
            }
            *been_online = true;
        }
        StreamStatus::Unauthorized => wiring.session.invalidate("push"),
        StreamStatus::Connecting | StreamStatus::Error | StreamStatus::Closed => {}
    }
}

fn on_message(wiring: &PushWiring, message: &StreamMessage) {
    match message {
        StreamMessage::Connected { message } => {
            info!(greeting = message.as_deref().unwrap_or_default(), "event stream connected");
        }
        StreamMessage::TableUpdate(records) => {
            for record in records {
                match Update::<Table>::try_from(record.clone()) {
                    Ok(update) => {
                        wiring.reconciler.apply(Origin::Push, &update);
                    }
                    Err(e) => warn!(id = record.id_mesa, error = %e, "discarding table update"),
                }
            }
        }
        StreamMessage::ReservationUpdate(records) => {
            for record in records {
                match Update::<Reservation>::try_from(record.clone()) {
                    Ok(update) => {
                        wiring.reconciler.apply(Origin::Push, &update);
                    }
                    Err(e) => {
                        warn!(id = record.id_reserva, error = %e, "discarding reservation update");
                    }
                }
            }
        }
        StreamMessage::Unknown { kind } => debug!(%kind, "ignoring stream message"),
    }
}
