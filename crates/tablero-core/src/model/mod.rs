// ── Domain model ──
//
// Canonical entity types held in the snapshot. Wire records from
// `tablero-api` are validated into these by `crate::convert`.

mod ids;
mod reservation;
mod revision;
mod stats;
mod table;

use std::fmt;
use std::hash::Hash;

pub use ids::{EntityKey, EntityKind, ReservationId, TableId};
pub use reservation::{Reservation, ReservationFilter, ReservationPatch, ReservationStatus};
pub use revision::Revision;
pub use stats::ServerStats;
pub use table::{Table, TablePatch, TableStatus, TableType};

/// An entity the snapshot can hold: identified, revisioned, and
/// patchable by partial updates.
pub trait Record: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    type Id: Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Into<EntityKey> + Send + Sync;
    type Patch: Clone + fmt::Debug + Send + Sync;

    const KIND: EntityKind;

    fn id(&self) -> Self::Id;

    fn revision(&self) -> Revision;

    /// Apply the fields present in `patch` on top of `self`.
    fn merged(&self, patch: &Self::Patch, revision: Revision) -> Self;

    /// Build a fresh entity from a patch, or `None` when the patch lacks
    /// a required field.
    fn from_patch(id: Self::Id, patch: &Self::Patch, revision: Revision) -> Option<Self>;
}

/// One incoming change for a single entity, as produced by the
/// channels and the mutation gateway.
#[derive(Debug, Clone)]
pub struct Update<T: Record> {
    pub id: T::Id,
    pub patch: T::Patch,
    pub revision: Revision,
}

impl<T: Record> Update<T> {
    pub fn key(&self) -> EntityKey {
        self.id.into()
    }
}
