// ── Poll channel ──
//
// Periodic full fetches per data domain. Each listing replaces its
// entity kind in the store through the reconciler, so a response that
// was overtaken by a newer push event loses the revision check instead
// of rolling state back. Failures surface as `SyncIssue`s and never
// touch the snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use strum::{Display, EnumIter};
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tablero_api::{ReservacionQuery, RestClient};

use crate::aggregate;
use crate::auth::Session;
use crate::config::PollIntervals;
use crate::convert::convert_all;
use crate::error::CoreError;
use crate::model::{Reservation, ReservationFilter, ServerStats, Table};
use crate::reconcile::{Origin, Reconciler};

/// Independently polled slices of server state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncDomain {
    Tables,
    Reservations,
    Statistics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueKind {
    /// Server unreachable or timed out.
    Connection,
    /// Credential rejected; polling is halted.
    Auth,
    /// Server answered with an error status.
    Server,
    /// Server answered with data that failed validation.
    Parse,
}

impl IssueKind {
    fn of(err: &CoreError) -> Self {
        match err {
            CoreError::Auth { .. } => Self::Auth,
            CoreError::Parse { .. } => Self::Parse,
            CoreError::Timeout { .. } | CoreError::Transport { status: None, .. } => {
                Self::Connection
            }
            _ => Self::Server,
        }
    }
}

/// A non-blocking sync failure, for a banner. Cleared by the next
/// successful fetch of the same domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncIssue {
    pub domain: SyncDomain,
    pub kind: IssueKind,
    pub message: String,
    pub since: DateTime<Utc>,
}

pub type IssueMap = BTreeMap<SyncDomain, SyncIssue>;

// ── Poller ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Triggers {
    tables: Notify,
    reservations: Notify,
    statistics: Notify,
}

impl Triggers {
    fn get(&self, domain: SyncDomain) -> &Notify {
        match domain {
            SyncDomain::Tables => &self.tables,
            SyncDomain::Reservations => &self.reservations,
            SyncDomain::Statistics => &self.statistics,
        }
    }
}

struct PollerInner {
    client: RestClient,
    reconciler: Reconciler,
    session: Arc<Session>,
    filter: watch::Sender<ReservationFilter>,
    issues: watch::Sender<IssueMap>,
    server_stats: watch::Sender<Option<Arc<ServerStats>>>,
    triggers: Triggers,
}

/// Fetch logic plus the state the poll tasks share. Cheap to clone.
#[derive(Clone)]
pub(crate) struct Poller {
    inner: Arc<PollerInner>,
}

impl Poller {
    pub(crate) fn new(
        client: RestClient,
        reconciler: Reconciler,
        session: Arc<Session>,
        filter: ReservationFilter,
    ) -> Self {
        let (filter, _) = watch::channel(filter);
        let (issues, _) = watch::channel(IssueMap::new());
        let (server_stats, _) = watch::channel(None);
        Self {
            inner: Arc::new(PollerInner {
                client,
                reconciler,
                session,
                filter,
                issues,
                server_stats,
                triggers: Triggers::default(),
            }),
        }
    }

    // ── Observables ──────────────────────────────────────────────────

    pub(crate) fn issues(&self) -> watch::Receiver<IssueMap> {
        self.inner.issues.subscribe()
    }

    pub(crate) fn current_issues(&self) -> Vec<SyncIssue> {
        self.inner.issues.borrow().values().cloned().collect()
    }

    pub(crate) fn server_stats(&self) -> watch::Receiver<Option<Arc<ServerStats>>> {
        self.inner.server_stats.subscribe()
    }

    pub(crate) fn filter(&self) -> ReservationFilter {
        self.inner.filter.borrow().clone()
    }

    /// Change the reservation filter. Returns `false` if it was already
    /// set to `filter`; only a real change wakes the reservations task.
    pub(crate) fn set_filter(&self, filter: ReservationFilter) -> bool {
        self.inner.filter.send_if_modified(|current| {
            if *current == filter {
                false
            } else {
                *current = filter;
                true
            }
        })
    }

    /// Ask the domain's task to fetch as soon as it can.
    pub(crate) fn request(&self, domain: SyncDomain) {
        self.inner.triggers.get(domain).notify_one();
    }

    fn session(&self) -> &Session {
        &self.inner.session
    }

    // ── Fetching ─────────────────────────────────────────────────────

    /// Fetch one domain and apply it. Failures are recorded as issues;
    /// an auth failure also halts polling. Only re-authentication lifts
    /// the halt; public endpoints keep succeeding with a rejected token.
    pub(crate) async fn fetch(&self, domain: SyncDomain) -> Result<(), CoreError> {
        let result = match domain {
            SyncDomain::Tables => self.fetch_tables().await,
            SyncDomain::Reservations => self.fetch_reservations().await,
            SyncDomain::Statistics => self.fetch_statistics().await,
        };
        match &result {
            Ok(()) => self.clear_issue(domain),
            Err(CoreError::Disposed) => {}
            Err(e) => {
                if e.is_auth() {
                    self.session().invalidate("poll");
                }
                warn!(%domain, error = %e, "poll failed");
                self.record_issue(domain, e);
            }
        }
        result
    }

    /// Snapshot version a listing is issued against. Entries written
    /// after it are newer than anything the listing can speak for.
    fn issued_at(&self) -> u64 {
        self.inner.reconciler.store().snapshot().version()
    }

    async fn fetch_tables(&self) -> Result<(), CoreError> {
        let issued_at = self.issued_at();
        let records = self.inner.client.list_tables().await?;
        let tables: Vec<Table> = convert_all(records)?;
        self.inner
            .reconciler
            .replace_all(Origin::Poll, tables, issued_at)
            .map(|_| ())
            .ok_or(CoreError::Disposed)
    }

    async fn fetch_reservations(&self) -> Result<(), CoreError> {
        let filter = self.filter();
        let query = ReservacionQuery::from(&filter);
        let issued_at = self.issued_at();
        let records = self.inner.client.list_reservations(&query).await?;
        if *self.inner.filter.borrow() != filter {
            // The filter moved while we were fetching; the task will
            // refetch for the new one.
            debug!("reservation filter changed mid-fetch, dropping listing");
            return Ok(());
        }
        let reservations: Vec<Reservation> = convert_all(records)?;
        self.inner
            .reconciler
            .replace_all(Origin::Poll, reservations, issued_at)
            .map(|_| ())
            .ok_or(CoreError::Disposed)
    }

    async fn fetch_statistics(&self) -> Result<(), CoreError> {
        let stats = ServerStats::from(self.inner.client.get_statistics().await?);
        if self.inner.reconciler.store().is_disposed() {
            return Err(CoreError::Disposed);
        }
        self.cross_check(&stats);
        self.inner.server_stats.send_replace(Some(Arc::new(stats)));
        Ok(())
    }

    /// Server counters are informational. Disagreement is expected
    /// while the reservation filter narrows the local view.
    fn cross_check(&self, stats: &ServerStats) {
        let snapshot = self.inner.reconciler.store().snapshot();
        let local = aggregate::compute(&snapshot, Local::now().naive_local(), 0);
        let server = (
            stats.total_tables,
            stats.available_tables,
            stats.occupied_tables,
            stats.reserved_tables,
        );
        let mine = (
            local.tables.total,
            local.tables.available,
            local.tables.occupied,
            local.tables.reserved,
        );
        if server != mine {
            debug!(?server, local = ?mine, "server table counters differ from snapshot");
        }
    }

    // ── Issues ───────────────────────────────────────────────────────

    fn record_issue(&self, domain: SyncDomain, err: &CoreError) {
        let kind = IssueKind::of(err);
        let message = err.to_string();
        self.inner.issues.send_if_modified(|issues| {
            if let Some(existing) = issues.get(&domain) {
                if existing.kind == kind && existing.message == message {
                    return false;
                }
            }
            issues.insert(
                domain,
                SyncIssue {
                    domain,
                    kind,
                    message,
                    since: Utc::now(),
                },
            );
            true
        });
    }

    fn clear_issue(&self, domain: SyncDomain) {
        self.inner
            .issues
            .send_if_modified(|issues| issues.remove(&domain).is_some());
    }

    // ── Tasks ────────────────────────────────────────────────────────

    /// Spawn one task per domain with a non-zero interval; domains with
    /// a zero interval still get a task for manual and filter wakeups.
    pub(crate) fn spawn(
        &self,
        intervals: PollIntervals,
        cancel: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        [
            (SyncDomain::Tables, intervals.tables),
            (SyncDomain::Reservations, intervals.reservations),
            (SyncDomain::Statistics, intervals.statistics),
        ]
        .into_iter()
        .map(|(domain, period)| {
            // Subscribe before spawning so a filter change made right
            // after `spawn` returns is not missed.
            let filter_rx = self.inner.filter.subscribe();
            tokio::spawn(poll_task(
                self.clone(),
                domain,
                period,
                filter_rx,
                cancel.clone(),
            ))
        })
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Interval,
    Requested,
    FilterChanged,
}

async fn next_tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn poll_task(
    poller: Poller,
    domain: SyncDomain,
    period: Duration,
    mut filter_rx: watch::Receiver<ReservationFilter>,
    cancel: CancellationToken,
) {
    let mut interval = if period.is_zero() {
        None
    } else {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await; // consume the immediate first tick
        Some(interval)
    };
    let watch_filter = domain == SyncDomain::Reservations;

    loop {
        let wake = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = poller.inner.triggers.get(domain).notified() => Wake::Requested,
            Ok(()) = filter_rx.changed(), if watch_filter => Wake::FilterChanged,
            () = next_tick(interval.as_mut()) => Wake::Interval,
        };

        if wake != Wake::Interval {
            // An out-of-band fetch restarts the period.
            if let Some(interval) = interval.as_mut() {
                interval.reset();
            }
        }
        if wake == Wake::FilterChanged {
            info!(filter = ?poller.filter(), "reservation filter changed, refetching");
        }
        if poller.session().is_halted() {
            debug!(%domain, ?wake, "polling halted until re-authentication");
            continue;
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = poller.fetch(domain) => {}
        }
    }
    debug!(%domain, "poll task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_kinds_follow_error_kinds() {
        assert_eq!(
            IssueKind::of(&CoreError::Auth {
                message: String::new()
            }),
            IssueKind::Auth
        );
        assert_eq!(
            IssueKind::of(&CoreError::Transport {
                message: String::new(),
                status: None
            }),
            IssueKind::Connection
        );
        assert_eq!(
            IssueKind::of(&CoreError::Transport {
                message: String::new(),
                status: Some(500)
            }),
            IssueKind::Server
        );
        assert_eq!(
            IssueKind::of(&CoreError::Parse {
                message: String::new()
            }),
            IssueKind::Parse
        );
    }

    #[test]
    fn domain_names() {
        assert_eq!(SyncDomain::Reservations.to_string(), "reservations");
    }
}
