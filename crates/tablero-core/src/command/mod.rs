// ── Command API ──
//
// All write operations flow through a unified `Command` enum. The
// mutation gateway routes each variant to its REST call and applies
// the server's answer to the store as confirmed state.

pub mod requests;

use std::sync::Arc;

use crate::model::{EntityKey, Reservation, ReservationId, Table, TableId, TableStatus};

pub use requests::ReservationChanges;

/// All write operations against the reservation server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ── Tables ───────────────────────────────────────────────────────
    SetTableStatus {
        id: TableId,
        status: TableStatus,
    },

    // ── Reservations ─────────────────────────────────────────────────
    UpdateReservation {
        id: ReservationId,
        changes: ReservationChanges,
        /// Allow leaving `cancelada`.
        admin_override: bool,
    },
    DeleteReservation {
        id: ReservationId,
    },
}

impl Command {
    /// The entity this command writes to.
    pub fn key(&self) -> EntityKey {
        match self {
            Self::SetTableStatus { id, .. } => EntityKey::Table(*id),
            Self::UpdateReservation { id, .. } | Self::DeleteReservation { id } => {
                EntityKey::Reservation(*id)
            }
        }
    }

    /// Short human label, used for pending-mutation overlays and logs.
    pub fn describe(&self) -> String {
        match self {
            Self::SetTableStatus { id, status } => format!("table {id} -> {status}"),
            Self::UpdateReservation { id, changes, .. } => match changes.status {
                Some(status) => format!("reservation {id} -> {status}"),
                None => format!("edit reservation {id}"),
            },
            Self::DeleteReservation { id } => format!("delete reservation {id}"),
        }
    }
}

/// Result of a command execution: the confirmed entity as the server
/// returned it.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    Table(Arc<Table>),
    Reservation(Arc<Reservation>),
    Deleted(EntityKey),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReservationStatus;

    #[test]
    fn keys_and_labels() {
        let cmd = Command::UpdateReservation {
            id: ReservationId(3),
            changes: ReservationChanges::status(ReservationStatus::Confirmed),
            admin_override: false,
        };
        assert_eq!(cmd.key(), EntityKey::Reservation(ReservationId(3)));
        assert_eq!(cmd.describe(), "reservation 3 -> confirmada");

        let cmd = Command::SetTableStatus {
            id: TableId(1),
            status: TableStatus::Occupied,
        };
        assert_eq!(cmd.describe(), "table 1 -> ocupada");
    }

    #[test]
    fn empty_changes() {
        assert!(ReservationChanges::default().is_empty());
        assert!(!ReservationChanges::status(ReservationStatus::Pending).is_empty());
    }
}
