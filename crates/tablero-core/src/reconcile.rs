// ── Reconciler ──
//
// The single funnel between the three update sources and the snapshot
// store. It routes by origin and leaves the staleness decision to the
// store's revision check. No business rules live here.

use std::sync::Arc;

use strum::Display;
use tracing::{debug, trace};

use crate::model::Update;
use crate::store::{ReplaceOutcome, SnapshotStore, Stored, Verdict};

/// Where an update came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum Origin {
    Poll,
    Push,
    Mutation,
}

#[derive(Clone)]
pub(crate) struct Reconciler {
    store: Arc<SnapshotStore>,
}

impl Reconciler {
    pub(crate) fn new(store: Arc<SnapshotStore>) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Offer a partial update from the push or poll channel.
    pub(crate) fn apply<T: Stored>(&self, origin: Origin, update: &Update<T>) -> Verdict {
        let verdict = self.store.apply(update, false);
        log_verdict(origin, update, verdict);
        verdict
    }

    /// Replace one entity kind with a full authoritative listing that
    /// was requested when the store was at version `issued_at`.
    pub(crate) fn replace_all<T: Stored>(
        &self,
        origin: Origin,
        entities: Vec<T>,
        issued_at: u64,
    ) -> Option<ReplaceOutcome> {
        let count = entities.len();
        let outcome = self.store.replace_all(entities, issued_at);
        match outcome {
            Some(o) if o.rejected > 0 || o.kept > 0 => debug!(
                %origin, kind = %T::KIND, count,
                applied = o.applied, rejected = o.rejected, pruned = o.pruned, kept = o.kept,
                "full replace kept newer local entries"
            ),
            Some(o) => trace!(
                %origin, kind = %T::KIND, count,
                applied = o.applied, pruned = o.pruned,
                "full replace applied"
            ),
            None => trace!(%origin, kind = %T::KIND, "store disposed, listing dropped"),
        }
        outcome
    }

    /// Store the server's answer to a mutation. Wins over any revision
    /// already held.
    pub(crate) fn confirm<T: Stored>(&self, entity: T) -> Verdict {
        let id = entity.id();
        let verdict = self.store.put_confirmed(entity);
        trace!(origin = %Origin::Mutation, kind = %T::KIND, %id, ?verdict, "confirmed");
        verdict
    }

    /// Drop an entity the server confirmed deleted.
    pub(crate) fn confirm_removed<T: Stored>(&self, id: T::Id) -> bool {
        let removed = self.store.remove_confirmed::<T>(id);
        trace!(origin = %Origin::Mutation, kind = %T::KIND, %id, removed, "confirmed delete");
        removed
    }
}

fn log_verdict<T: Stored>(origin: Origin, update: &Update<T>, verdict: Verdict) {
    let kind = T::KIND;
    let id = update.id;
    let revision = update.revision;
    match verdict {
        Verdict::Applied => trace!(%origin, %kind, %id, %revision, "applied"),
        Verdict::Unchanged => trace!(%origin, %kind, %id, %revision, "no-op"),
        Verdict::Stale | Verdict::Tombstoned => {
            trace!(%origin, %kind, %id, %revision, ?verdict, "rejected as stale");
        }
        Verdict::Incomplete => {
            debug!(%origin, %kind, %id, "partial update for unknown entity dropped");
        }
        Verdict::Disposed => trace!(%origin, %kind, %id, "store disposed, update dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TieBreak;
    use crate::model::{Revision, Table, TableId, TablePatch, TableStatus};

    #[test]
    fn routes_every_origin_through_the_revision_check() {
        let store = Arc::new(SnapshotStore::new(TieBreak::KeepExisting));
        let rec = Reconciler::new(Arc::clone(&store));

        let push = Update::<Table> {
            id: TableId(1),
            patch: TablePatch::status(TableStatus::Occupied),
            revision: Revision::new(100),
        };
        assert_eq!(rec.apply(Origin::Push, &push), Verdict::Applied);

        let poll = Update::<Table> {
            revision: Revision::new(90),
            patch: TablePatch::status(TableStatus::Available),
            ..push.clone()
        };
        assert_eq!(rec.apply(Origin::Poll, &poll), Verdict::Stale);
        assert_eq!(
            store.snapshot().table(TableId(1)).map(|t| t.status),
            Some(TableStatus::Occupied)
        );
        assert_eq!(rec.store().snapshot().version(), 1);
    }
}
