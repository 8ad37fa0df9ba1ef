//! Live table and reservation sync engine between `tablero-api` and UI
//! consumers (CLI, dashboards).
//!
//! - **[`Dashboard`]**: facade owning one sync session.
//!   [`start()`](Dashboard::start) loads every domain, then spawns the
//!   poll timers and the push channel; [`dispose()`](Dashboard::dispose)
//!   tears them down exactly once. [`Dashboard::oneshot()`] is the
//!   fire-and-forget mode for single CLI invocations.
//!
//! - **[`SnapshotStore`]**: immutable [`Snapshot`]s published through a
//!   `tokio::sync::watch` channel. Every write is revision-checked per
//!   entity, so the final state does not depend on whether a push event
//!   or a poll response arrived first. Confirmed mutation responses skip
//!   the check; confirmed deletes leave a tombstone.
//!
//! - **[`SnapshotStream`]** and [`Subscription`]: async and callback
//!   ways to observe the store.
//!
//! - **[`Command`]**: typed mutations. At most one per entity is in
//!   flight; a second one fails with [`CoreError::Conflict`].
//!
//! - **[`Aggregates`]**: table and reservation counts plus the upcoming
//!   preview, recomputed from each snapshot.

pub mod aggregate;
pub mod auth;
pub mod command;
pub mod config;
mod convert;
pub mod dashboard;
pub mod error;
pub mod model;
mod mutation;
pub mod poll;
pub mod push;
mod reconcile;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use aggregate::{Aggregates, ReservationCounts, TableCounts, TodayCounts};
pub use auth::{AuthProvider, StaticCredentials};
pub use command::{Command, CommandResult, ReservationChanges};
pub use config::{DashboardConfig, PollIntervals, TieBreak, TlsVerification};
pub use dashboard::Dashboard;
pub use error::CoreError;
pub use mutation::PendingMutation;
pub use poll::{IssueKind, IssueMap, SyncDomain, SyncIssue};
pub use push::ConnectionState;
pub use store::{Listener, Snapshot, SnapshotStore, Subscription};
pub use stream::{SnapshotStream, SnapshotWatchStream};

pub use model::{
    EntityKey, EntityKind, Reservation, ReservationFilter, ReservationId, ReservationStatus,
    Revision, ServerStats, Table, TableId, TableStatus, TableType,
};
