// ── Dashboard facade ──
//
// Owns one sync session: the snapshot store, both channels, the
// mutation gateway and the background tasks. Everything a presentation
// layer needs goes through here.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Local, NaiveDateTime};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tablero_api::{ReconnectConfig, RestClient, TlsMode, TransportConfig};

use crate::aggregate::{self, Aggregates};
use crate::auth::{AuthProvider, Session};
use crate::command::{Command, CommandResult, ReservationChanges};
use crate::config::{DashboardConfig, PollIntervals, TlsVerification};
use crate::error::CoreError;
use crate::model::{
    Reservation, ReservationFilter, ReservationId, ServerStats, Table, TableId, TableStatus,
};
use crate::mutation::{MutationGateway, PendingMutation};
use crate::poll::{IssueMap, Poller, SyncDomain, SyncIssue};
use crate::push::{ConnectionState, PushChannel, PushWiring};
use crate::reconcile::Reconciler;
use crate::store::{Snapshot, SnapshotStore, Subscription};
use crate::stream::SnapshotStream;

/// The main entry point for consumers.
///
/// Cheaply cloneable. Create with [`new()`](Self::new), call
/// [`start()`](Self::start) to load and begin syncing, and
/// [`dispose()`](Self::dispose) when the view goes away. Dropping the
/// last clone also stops every background task.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

struct DashboardInner {
    config: DashboardConfig,
    store: Arc<SnapshotStore>,
    reconciler: Reconciler,
    client: RestClient,
    transport: TransportConfig,
    session: Arc<Session>,
    poller: Poller,
    gateway: MutationGateway,
    connection_state: Arc<watch::Sender<ConnectionState>>,
    aggregates: Arc<watch::Sender<Arc<Aggregates>>>,
    _aggregates_listener: Subscription,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    push: Mutex<Option<PushChannel>>,
    started: AtomicBool,
    disposed: AtomicBool,
}

impl Drop for DashboardInner {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.store.dispose();
    }
}

impl Dashboard {
    /// Build the engine. Does no I/O and spawns nothing.
    pub fn new(config: DashboardConfig, auth: Arc<dyn AuthProvider>) -> Result<Self, CoreError> {
        let store = Arc::new(SnapshotStore::new(config.tie_break));
        let reconciler = Reconciler::new(Arc::clone(&store));
        let session = Arc::new(Session::new(auth));
        let transport = build_transport(&config);
        let client = RestClient::new(config.url.clone(), session.tokens(), &transport)?;

        let poller = Poller::new(
            client.clone(),
            reconciler.clone(),
            Arc::clone(&session),
            config.reservation_filter.clone(),
        );
        let gateway = MutationGateway::new(client.clone(), reconciler.clone(), Arc::clone(&session));

        let (connection_state, _) = watch::channel(ConnectionState::Offline);
        let preview_len = config.preview_len;
        let (aggregates, _) = watch::channel(Arc::new(aggregate::compute(
            &store.snapshot(),
            Local::now().naive_local(),
            preview_len,
        )));
        let aggregates = Arc::new(aggregates);
        let publish = Arc::clone(&aggregates);
        let aggregates_listener = store.on_change(move |snapshot| {
            let fresh = aggregate::compute(snapshot, Local::now().naive_local(), preview_len);
            publish.send_replace(Arc::new(fresh));
        });

        Ok(Self {
            inner: Arc::new(DashboardInner {
                config,
                store,
                reconciler,
                client,
                transport,
                session,
                poller,
                gateway,
                connection_state: Arc::new(connection_state),
                aggregates,
                _aggregates_listener: aggregates_listener,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                push: Mutex::new(None),
                started: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }),
        })
    }

    /// One-shot: build, run closure, dispose. No timers and no stream,
    /// for single CLI invocations that fetch what they need themselves.
    pub async fn oneshot<F, Fut, T>(
        config: DashboardConfig,
        auth: Arc<dyn AuthProvider>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Dashboard) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config;
        cfg.push_enabled = false;
        cfg.poll = PollIntervals::disabled();

        let dashboard = Dashboard::new(cfg, auth)?;
        let result = f(dashboard.clone()).await;
        dashboard.dispose().await;
        result
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.inner.store
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Load every domain once, then start the poll timers and, if
    /// enabled, the push channel.
    ///
    /// Failures of the initial load are not fatal: they show up in
    /// [`current_issues()`](Self::current_issues) and the timers keep
    /// retrying. Calling `start` twice is a no-op.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.is_disposed() {
            return Err(CoreError::Disposed);
        }
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let poller = &self.inner.poller;
        let (tables, reservations, statistics) = tokio::join!(
            poller.fetch(SyncDomain::Tables),
            poller.fetch(SyncDomain::Reservations),
            poller.fetch(SyncDomain::Statistics),
        );
        let failed = [tables, reservations, statistics]
            .iter()
            .filter(|r| r.is_err())
            .count();
        if self.is_disposed() {
            return Err(CoreError::Disposed);
        }
        if failed > 0 {
            warn!(failed, "initial load incomplete, background sync will retry");
        }

        let mut handles = self.inner.task_handles.lock().await;
        handles.extend(poller.spawn(self.inner.config.poll, &self.inner.cancel));

        if self.inner.config.push_enabled {
            if let Some(bridge) = self.open_push().await {
                handles.push(bridge);
            }
        } else {
            debug!("push channel disabled, relying on polling");
        }

        info!(
            tables = self.inner.store.snapshot().table_count(),
            reservations = self.inner.store.snapshot().reservation_count(),
            "dashboard started"
        );
        Ok(())
    }

    /// Stop everything: close the stream, cancel the timers, and seal the
    /// store so that in-flight calls resolve without touching it. Safe to
    /// call more than once.
    pub async fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.store.dispose();
        self.inner.cancel.cancel();
        if let Some(push) = self.inner.push.lock().await.take() {
            push.close();
        }

        let handles = std::mem::take(&mut *self.inner.task_handles.lock().await);
        for handle in handles {
            let _ = handle.await;
        }
        self.inner
            .connection_state
            .send_replace(ConnectionState::Offline);
        info!("dashboard disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Open the push channel if none is running. Non-fatal on failure.
    async fn open_push(&self) -> Option<JoinHandle<()>> {
        let mut slot = self.inner.push.lock().await;
        if slot.as_ref().is_some_and(|push| !push.is_finished()) {
            return None;
        }

        let url = match self.inner.client.url(&self.inner.config.stream_path) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "invalid event stream path, push disabled");
                return None;
            }
        };
        self.inner
            .connection_state
            .send_replace(ConnectionState::Connecting);

        let wiring = PushWiring {
            reconciler: self.inner.reconciler.clone(),
            poller: self.inner.poller.clone(),
            session: Arc::clone(&self.inner.session),
            state: Arc::clone(&self.inner.connection_state),
        };
        let reconnect = ReconnectConfig {
            retry_delay: self.inner.config.stream_retry,
            max_retries: None,
        };
        match PushChannel::open(
            url,
            &self.inner.transport,
            reconnect,
            wiring,
            self.inner.cancel.child_token(),
        ) {
            Ok((push, bridge)) => {
                if let Some(old) = slot.replace(push) {
                    old.close();
                }
                Some(bridge)
            }
            Err(e) => {
                warn!(error = %e, "event stream unavailable, relying on polling");
                self.inner
                    .connection_state
                    .send_replace(ConnectionState::Offline);
                None
            }
        }
    }

    // ── Snapshot access ──────────────────────────────────────────────

    /// Register a change callback, called synchronously with the new
    /// snapshot after every applied change.
    pub fn on_change<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<Snapshot>) + Send + Sync + 'static,
    {
        self.inner.store.on_change(listener)
    }

    pub fn subscribe(&self) -> SnapshotStream {
        self.inner.store.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.store.snapshot()
    }

    // ── Derived views ────────────────────────────────────────────────

    /// Aggregates of the current snapshot as of now.
    pub fn aggregates(&self) -> Aggregates {
        self.aggregates_at(Local::now().naive_local())
    }

    pub fn aggregates_at(&self, now: NaiveDateTime) -> Aggregates {
        aggregate::compute(&self.snapshot(), now, self.inner.config.preview_len)
    }

    /// Aggregates republished on every store change.
    pub fn watch_aggregates(&self) -> watch::Receiver<Arc<Aggregates>> {
        self.inner.aggregates.subscribe()
    }

    /// The server's own counters from the last statistics poll.
    pub fn server_stats(&self) -> Option<Arc<ServerStats>> {
        self.inner.poller.server_stats().borrow().clone()
    }

    pub fn watch_server_stats(&self) -> watch::Receiver<Option<Arc<ServerStats>>> {
        self.inner.poller.server_stats()
    }

    // ── Health ───────────────────────────────────────────────────────

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn current_connection_state(&self) -> ConnectionState {
        *self.inner.connection_state.borrow()
    }

    /// Background sync failures, keyed by domain, for a banner.
    pub fn issues(&self) -> watch::Receiver<IssueMap> {
        self.inner.poller.issues()
    }

    pub fn current_issues(&self) -> Vec<SyncIssue> {
        self.inner.poller.current_issues()
    }

    /// Polling stopped after a rejected credential.
    pub fn is_polling_halted(&self) -> bool {
        self.inner.session.is_halted()
    }

    /// Tell the engine the credential was renewed: lift the polling
    /// halt, fetch everything once, and reopen the stream if the server
    /// had shut it.
    pub async fn reauthenticated(&self) {
        if self.is_disposed() {
            return;
        }
        self.inner.session.resume();
        for domain in [
            SyncDomain::Tables,
            SyncDomain::Reservations,
            SyncDomain::Statistics,
        ] {
            self.inner.poller.request(domain);
        }
        if self.inner.config.push_enabled && self.inner.started.load(Ordering::SeqCst) {
            if let Some(bridge) = self.open_push().await {
                self.inner.task_handles.lock().await.push(bridge);
            }
        }
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Fetch one domain now and wait for it to be applied.
    pub async fn refresh(&self, domain: SyncDomain) -> Result<(), CoreError> {
        if self.is_disposed() {
            return Err(CoreError::Disposed);
        }
        self.inner.poller.fetch(domain).await
    }

    /// Fetch every domain concurrently. Returns the first failure.
    pub async fn refresh_all(&self) -> Result<(), CoreError> {
        let (tables, reservations, statistics) = tokio::join!(
            self.refresh(SyncDomain::Tables),
            self.refresh(SyncDomain::Reservations),
            self.refresh(SyncDomain::Statistics),
        );
        tables.and(reservations).and(statistics)
    }

    /// Change which reservations are synced. Returns `false` when the
    /// filter is unchanged; otherwise the reservations are refetched
    /// once in the background.
    pub fn set_reservation_filter(&self, filter: ReservationFilter) -> bool {
        self.inner.poller.set_filter(filter)
    }

    pub fn reservation_filter(&self) -> ReservationFilter {
        self.inner.poller.filter()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Execute a mutation. The snapshot reflects the server's answer by
    /// the time this returns `Ok`.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if self.is_disposed() {
            return Err(CoreError::Disposed);
        }
        self.inner.gateway.execute(cmd).await
    }

    /// Mutations awaiting the server, for optimistic overlays.
    pub fn pending_mutations(&self) -> Vec<PendingMutation> {
        self.inner.gateway.pending()
    }

    pub async fn set_table_status(
        &self,
        id: TableId,
        status: TableStatus,
    ) -> Result<Arc<Table>, CoreError> {
        match self.execute(Command::SetTableStatus { id, status }).await? {
            CommandResult::Table(table) => Ok(table),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn update_reservation(
        &self,
        id: ReservationId,
        changes: ReservationChanges,
        admin_override: bool,
    ) -> Result<Arc<Reservation>, CoreError> {
        let cmd = Command::UpdateReservation {
            id,
            changes,
            admin_override,
        };
        match self.execute(cmd).await? {
            CommandResult::Reservation(reservation) => Ok(reservation),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn delete_reservation(&self, id: ReservationId) -> Result<(), CoreError> {
        self.execute(Command::DeleteReservation { id }).await?;
        Ok(())
    }
}

fn unexpected(result: &CommandResult) -> CoreError {
    CoreError::Internal(format!("unexpected command result: {result:?}"))
}

fn build_transport(config: &DashboardConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::auth::StaticCredentials;

    fn dashboard() -> Dashboard {
        let mut config = DashboardConfig::new("http://127.0.0.1:9/api/v1/".parse().unwrap());
        config.push_enabled = false;
        config.poll = PollIntervals::disabled();
        Dashboard::new(config, Arc::new(StaticCredentials::new(None))).unwrap()
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_seals_the_store() {
        let d = dashboard();
        d.dispose().await;
        d.dispose().await;
        assert!(d.is_disposed());
        assert!(d.store().is_disposed());
        assert!(matches!(d.start().await, Err(CoreError::Disposed)));
        assert!(matches!(
            d.refresh(SyncDomain::Tables).await,
            Err(CoreError::Disposed)
        ));
        assert_eq!(d.current_connection_state(), ConnectionState::Offline);
    }

    #[test]
    fn identical_filter_is_ignored() {
        let d = dashboard();
        let current = d.reservation_filter();
        assert!(!d.set_reservation_filter(current.clone()));
        assert!(d.set_reservation_filter(current.with_date(None)));
    }

    #[test]
    fn tls_modes_map_to_transport() {
        assert!(matches!(
            tls_to_transport(&TlsVerification::DangerAcceptInvalid),
            TlsMode::DangerAcceptInvalid
        ));
        assert!(matches!(
            tls_to_transport(&TlsVerification::SystemDefaults),
            TlsMode::System
        ));
    }
}
