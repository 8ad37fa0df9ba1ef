// ── Mutation gateway ──
//
// Executes admin commands against the server. At most one mutation per
// entity is in flight; the server's response is applied as confirmed
// state. A failed call leaves the snapshot exactly as it was.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tracing::{debug, info, warn};

use tablero_api::{ReservacionUpdate, RestClient};

use crate::auth::Session;
use crate::command::{Command, CommandResult, ReservationChanges};
use crate::convert::table_update_body;
use crate::error::CoreError;
use crate::model::{
    EntityKey, Record, Reservation, ReservationId, Table, TableId, TableStatus, Update,
};
use crate::reconcile::Reconciler;
use crate::store::Stored;

/// A mutation awaiting the server's answer, for optimistic overlays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMutation {
    pub key: EntityKey,
    pub description: String,
    /// Target table status, when the command sets one.
    pub table_status: Option<TableStatus>,
    pub started_at: DateTime<Utc>,
}

type InFlight = Arc<DashMap<EntityKey, PendingMutation>>;

/// Releases the in-flight slot however the call ends, including when
/// the caller drops the future.
struct InFlightGuard {
    in_flight: InFlight,
    key: EntityKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

#[derive(Clone)]
pub(crate) struct MutationGateway {
    client: RestClient,
    reconciler: Reconciler,
    session: Arc<Session>,
    in_flight: InFlight,
}

impl MutationGateway {
    pub(crate) fn new(client: RestClient, reconciler: Reconciler, session: Arc<Session>) -> Self {
        Self {
            client,
            reconciler,
            session,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub(crate) fn pending(&self) -> Vec<PendingMutation> {
        let mut pending: Vec<PendingMutation> =
            self.in_flight.iter().map(|e| e.value().clone()).collect();
        pending.sort_by_key(|p| p.key);
        pending
    }

    fn claim(&self, command: &Command) -> Result<InFlightGuard, CoreError> {
        let key = command.key();
        match self.in_flight.entry(key) {
            Entry::Occupied(_) => Err(CoreError::Conflict { key }),
            Entry::Vacant(slot) => {
                slot.insert(PendingMutation {
                    key,
                    description: command.describe(),
                    table_status: match command {
                        Command::SetTableStatus { status, .. } => Some(*status),
                        _ => None,
                    },
                    started_at: Utc::now(),
                });
                Ok(InFlightGuard {
                    in_flight: Arc::clone(&self.in_flight),
                    key,
                })
            }
        }
    }

    /// Run one command. Validation failures are reported before any
    /// request is sent.
    pub(crate) async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        if self.reconciler.store().is_disposed() {
            return Err(CoreError::Disposed);
        }
        let key = command.key();
        self.validate(&command)?;
        let _guard = self.claim(&command)?;
        debug!(%key, command = %command.describe(), "executing mutation");

        let result = match command {
            Command::SetTableStatus { id, status } => self.set_table_status(id, status).await,
            Command::UpdateReservation { id, changes, .. } => {
                self.update_reservation(id, &changes).await
            }
            Command::DeleteReservation { id } => self.delete_reservation(id).await,
        };

        match &result {
            Ok(_) => info!(%key, "mutation confirmed"),
            Err(e) => {
                if e.is_auth() {
                    self.session.invalidate("mutation");
                }
                warn!(%key, error = %e, "mutation failed");
            }
        }
        result.map_err(|e| e.for_entity(key))
    }

    fn validate(&self, command: &Command) -> Result<(), CoreError> {
        let Command::UpdateReservation {
            id,
            changes,
            admin_override,
        } = command
        else {
            return Ok(());
        };
        if changes.is_empty() {
            return Err(CoreError::Validation {
                message: format!("no changes given for reservation {id}"),
            });
        }
        let (Some(next), Some(current)) = (
            changes.status,
            self.reconciler.store().snapshot().reservation(*id).cloned(),
        ) else {
            // Unknown locally: the server is the judge.
            return Ok(());
        };
        if current.status.can_transition_to(next, *admin_override) {
            Ok(())
        } else {
            Err(CoreError::InvalidTransition {
                id: *id,
                from: current.status,
                to: next,
            })
        }
    }

    async fn set_table_status(
        &self,
        id: TableId,
        status: TableStatus,
    ) -> Result<CommandResult, CoreError> {
        let record = self
            .client
            .update_table(id.get(), &table_update_body(status))
            .await?;
        let update = Update::<Table>::try_from(record)?;
        let table = self.confirmed(update)?;
        Ok(CommandResult::Table(Arc::new(table)))
    }

    async fn update_reservation(
        &self,
        id: ReservationId,
        changes: &ReservationChanges,
    ) -> Result<CommandResult, CoreError> {
        let record = self
            .client
            .update_reservation(id.get(), &ReservacionUpdate::from(changes))
            .await?;
        let update = Update::<Reservation>::try_from(record)?;
        // A full reservation record replaces the local one outright so a
        // cleared table assignment is not masked by the merge.
        let reservation = match Reservation::from_patch(update.id, &update.patch, update.revision) {
            Some(complete) => {
                self.reconciler.confirm(complete.clone());
                complete
            }
            None => self.confirmed(update)?,
        };
        Ok(CommandResult::Reservation(Arc::new(reservation)))
    }

    async fn delete_reservation(&self, id: ReservationId) -> Result<CommandResult, CoreError> {
        self.client.delete_reservation(id.get()).await?;
        self.reconciler.confirm_removed::<Reservation>(id);
        Ok(CommandResult::Deleted(EntityKey::Reservation(id)))
    }

    /// Merge the server's answer over what the snapshot holds and store
    /// it as confirmed. The response may omit nested fields the listing
    /// carried, so it is treated as a patch.
    fn confirmed<T: Stored>(&self, update: Update<T>) -> Result<T, CoreError> {
        let snapshot = self.reconciler.store().snapshot();
        let entity = match T::map(&snapshot).get(&update.id) {
            Some(current) => current.merged(&update.patch, update.revision),
            None => T::from_patch(update.id, &update.patch, update.revision).ok_or_else(|| {
                CoreError::Parse {
                    message: format!("server response for {} is incomplete", update.key()),
                }
            })?,
        };
        self.reconciler.confirm(entity.clone());
        Ok(entity)
    }
}
