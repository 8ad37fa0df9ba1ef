// ── Immutable snapshot ──

use std::sync::Arc;

use super::collection::EntityMap;
use crate::model::{Record, Reservation, ReservationId, Table, TableId};

/// Point-in-time view of every known table and reservation.
///
/// Snapshots are shared as `Arc<Snapshot>` and never change once
/// published; a write produces a new one. Iteration order is by id.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    tables: EntityMap<Table>,
    reservations: EntityMap<Reservation>,
    version: u64,
}

impl Snapshot {
    /// Bumped on every applied change. Starts at 0 (empty).
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tables(&self) -> impl ExactSizeIterator<Item = &Arc<Table>> {
        self.tables.values()
    }

    pub fn table(&self, id: TableId) -> Option<&Arc<Table>> {
        self.tables.get(&id)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn reservations(&self) -> impl ExactSizeIterator<Item = &Arc<Reservation>> {
        self.reservations.values()
    }

    pub fn reservation(&self, id: ReservationId) -> Option<&Arc<Reservation>> {
        self.reservations.get(&id)
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    /// The version the write in progress will publish.
    pub(crate) fn next_version(&self) -> u64 {
        self.version + 1
    }

    pub(crate) fn bump(&mut self) {
        self.version += 1;
    }
}

/// Selects the map that holds a given entity kind.
pub(crate) trait Stored: Record {
    fn map(snapshot: &Snapshot) -> &EntityMap<Self>;
    fn map_mut(snapshot: &mut Snapshot) -> &mut EntityMap<Self>;
}

impl Stored for Table {
    fn map(snapshot: &Snapshot) -> &EntityMap<Self> {
        &snapshot.tables
    }

    fn map_mut(snapshot: &mut Snapshot) -> &mut EntityMap<Self> {
        &mut snapshot.tables
    }
}

impl Stored for Reservation {
    fn map(snapshot: &Snapshot) -> &EntityMap<Self> {
        &snapshot.reservations
    }

    fn map_mut(snapshot: &mut Snapshot) -> &mut EntityMap<Self> {
        &mut snapshot.reservations
    }
}
