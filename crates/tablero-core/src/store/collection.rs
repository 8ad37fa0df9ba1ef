// ── Revision-checked entity map ──
//
// Copy-on-write storage for one entity kind. Every write goes through a
// staleness check against the stored revision (or the tombstone left by
// a confirmed delete). Maps are cloned cheaply into snapshots: the live
// map sits behind an `Arc` and is only copied when written while a
// snapshot still holds it.
//
// Each id also remembers the store version of its last write, so a full
// listing only prunes what it could have seen when it was requested.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::config::TieBreak;
use crate::model::{Record, Revision, Update};

/// Result of offering one update to the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// The entity was inserted or replaced.
    Applied,
    /// The update was accepted but produced an identical entity.
    Unchanged,
    /// The stored revision is newer (or equal, under `KeepExisting`).
    Stale,
    /// A confirmed delete at an equal or newer revision shadows it.
    Tombstoned,
    /// A partial update for an entity the map does not hold.
    Incomplete,
    /// The store no longer accepts writes.
    Disposed,
}

impl Verdict {
    pub(crate) fn changed(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Counts from a full replace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ReplaceOutcome {
    pub applied: usize,
    pub rejected: usize,
    pub pruned: usize,
    /// Absent from the listing but written after it was requested.
    pub kept: usize,
}

impl ReplaceOutcome {
    pub(crate) fn changed(&self) -> bool {
        self.applied > 0 || self.pruned > 0
    }
}

#[derive(Debug)]
pub(crate) struct EntityMap<T: Record> {
    live: Arc<BTreeMap<T::Id, Arc<T>>>,
    /// Revisions of confirmed deletes, so an overtaken event cannot
    /// resurrect the entity.
    tombstones: HashMap<T::Id, Revision>,
    /// Store version of the last write per live or tombstoned id.
    written: HashMap<T::Id, u64>,
}

impl<T: Record> Clone for EntityMap<T> {
    fn clone(&self) -> Self {
        Self {
            live: Arc::clone(&self.live),
            tombstones: self.tombstones.clone(),
            written: self.written.clone(),
        }
    }
}

impl<T: Record> Default for EntityMap<T> {
    fn default() -> Self {
        Self {
            live: Arc::new(BTreeMap::new()),
            tombstones: HashMap::new(),
            written: HashMap::new(),
        }
    }
}

impl<T: Record> EntityMap<T> {
    pub(crate) fn get(&self, id: &T::Id) -> Option<&Arc<T>> {
        self.live.get(id)
    }

    pub(crate) fn values(&self) -> impl ExactSizeIterator<Item = &Arc<T>> {
        self.live.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }

    #[cfg(test)]
    pub(crate) fn tombstone(&self, id: &T::Id) -> Option<Revision> {
        self.tombstones.get(id).copied()
    }

    fn written_after(&self, id: &T::Id, version: u64) -> bool {
        self.written.get(id).is_some_and(|&at| at > version)
    }

    /// Decide whether an update may overwrite what the map holds,
    /// without touching the map.
    pub(crate) fn judge(&self, update: &Update<T>, tie: TieBreak, confirmed: bool) -> Verdict {
        if confirmed {
            return self.judge_shape(update);
        }
        if let Some(current) = self.live.get(&update.id) {
            let newer = update.revision > current.revision()
                || (update.revision == current.revision() && tie == TieBreak::LastArrival);
            if !newer {
                return Verdict::Stale;
            }
        } else if let Some(&deleted_at) = self.tombstones.get(&update.id) {
            // Equal revisions never resurrect, whatever the tie rule.
            if update.revision <= deleted_at {
                return Verdict::Tombstoned;
            }
        }
        self.judge_shape(update)
    }

    fn judge_shape(&self, update: &Update<T>) -> Verdict {
        match self.live.get(&update.id) {
            Some(current) => {
                if current.merged(&update.patch, update.revision) == **current {
                    Verdict::Unchanged
                } else {
                    Verdict::Applied
                }
            }
            None => {
                if T::from_patch(update.id, &update.patch, update.revision).is_some() {
                    Verdict::Applied
                } else {
                    Verdict::Incomplete
                }
            }
        }
    }

    /// Apply an update already judged [`Verdict::Applied`], as part of
    /// store version `at`.
    pub(crate) fn commit(&mut self, update: &Update<T>, at: u64) {
        let next = match self.live.get(&update.id) {
            Some(current) => current.merged(&update.patch, update.revision),
            None => match T::from_patch(update.id, &update.patch, update.revision) {
                Some(entity) => entity,
                None => return,
            },
        };
        self.tombstones.remove(&update.id);
        self.written.insert(update.id, at);
        Arc::make_mut(&mut self.live).insert(update.id, Arc::new(next));
    }

    /// Judge a whole-entity replacement.
    pub(crate) fn judge_entity(&self, entity: &T, tie: TieBreak) -> Verdict {
        let id = entity.id();
        if let Some(current) = self.live.get(&id) {
            if **current == *entity {
                return Verdict::Unchanged;
            }
            let newer = entity.revision() > current.revision()
                || (entity.revision() == current.revision() && tie == TieBreak::LastArrival);
            if !newer {
                return Verdict::Stale;
            }
        } else if let Some(&deleted_at) = self.tombstones.get(&id) {
            if entity.revision() <= deleted_at {
                return Verdict::Tombstoned;
            }
        }
        Verdict::Applied
    }

    pub(crate) fn insert(&mut self, entity: T, at: u64) {
        let id = entity.id();
        self.tombstones.remove(&id);
        self.written.insert(id, at);
        Arc::make_mut(&mut self.live).insert(id, Arc::new(entity));
    }

    /// Upsert the full authoritative set, then drop the entities the set
    /// does not contain. `issued_at` is the store version when the set
    /// was requested: ids written after it are kept, since the server
    /// answered before it knew about them. Incoming entities still go
    /// through the revision check. Tombstones for ids absent from the
    /// set are released under the same rule.
    pub(crate) fn replace_all(
        &mut self,
        entities: Vec<T>,
        tie: TieBreak,
        issued_at: u64,
        at: u64,
    ) -> ReplaceOutcome {
        let mut outcome = ReplaceOutcome::default();
        let incoming: HashSet<T::Id> = entities.iter().map(|e| e.id()).collect();

        for entity in entities {
            match self.judge_entity(&entity, tie) {
                Verdict::Applied => {
                    self.insert(entity, at);
                    outcome.applied += 1;
                }
                Verdict::Unchanged => {}
                _ => outcome.rejected += 1,
            }
        }

        let (kept, absent): (Vec<T::Id>, Vec<T::Id>) = self
            .live
            .keys()
            .filter(|id| !incoming.contains(*id))
            .copied()
            .partition(|id| self.written_after(id, issued_at));
        outcome.kept = kept.len();
        if !absent.is_empty() {
            let live = Arc::make_mut(&mut self.live);
            for id in &absent {
                live.remove(id);
            }
            outcome.pruned = absent.len();
        }

        let written = &self.written;
        self.tombstones.retain(|id, _| {
            incoming.contains(id) || written.get(id).is_some_and(|&w| w > issued_at)
        });
        let (live, tombstones) = (&self.live, &self.tombstones);
        self.written
            .retain(|id, _| live.contains_key(id) || tombstones.contains_key(id));

        outcome
    }

    /// Remove after a server-confirmed delete, leaving a tombstone at
    /// the entity's last known revision.
    pub(crate) fn remove_confirmed(&mut self, id: T::Id, at: u64) -> bool {
        if !self.live.contains_key(&id) {
            return false;
        }
        let removed = Arc::make_mut(&mut self.live).remove(&id);
        let deleted_at = removed.map_or(Revision::UNKNOWN, |e| e.revision());
        self.tombstones.insert(id, deleted_at);
        self.written.insert(id, at);
        true
    }
}
