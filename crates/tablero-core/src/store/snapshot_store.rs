// ── Snapshot store ──
//
// Single writer path for dashboard state. Writes run inside the watch
// channel's critical section, so each one is atomic with respect to
// readers and to other writers on any thread. Listeners are called
// synchronously after a write that changed something.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::trace;

use super::collection::{ReplaceOutcome, Verdict};
use super::snapshot::{Snapshot, Stored};
use crate::config::TieBreak;
use crate::model::Update;
use crate::stream::SnapshotStream;

/// Change callback. Receives the newest snapshot at call time.
pub type Listener = Arc<dyn Fn(&Arc<Snapshot>) + Send + Sync>;

pub struct SnapshotStore {
    state: watch::Sender<Arc<Snapshot>>,
    listeners: DashMap<u64, Listener>,
    next_listener: AtomicU64,
    disposed: AtomicBool,
    tie_break: TieBreak,
}

impl SnapshotStore {
    pub fn new(tie_break: TieBreak) -> Self {
        let (state, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            state,
            listeners: DashMap::new(),
            next_listener: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
            tie_break,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// The current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.state.subscribe())
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    // ── Listeners ────────────────────────────────────────────────────

    /// Register a change callback. The returned [`Subscription`]
    /// unregisters it when dropped or on
    /// [`unsubscribe`](Subscription::unsubscribe).
    ///
    /// A disposed store accepts the registration but never calls it.
    pub fn on_change<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&Arc<Snapshot>) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        if !self.is_disposed() {
            self.listeners.insert(id, Arc::new(listener));
        }
        Subscription {
            store: Arc::downgrade(self),
            id,
        }
    }

    fn notify(&self) {
        // Collect first: a listener may unsubscribe or write re-entrantly.
        let listeners: Vec<Listener> = self
            .listeners
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        if listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for listener in listeners {
            if self.is_disposed() {
                break;
            }
            listener(&snapshot);
        }
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Offer one update. `confirmed` skips the revision check: it marks
    /// the server's direct answer to a mutation.
    pub(crate) fn apply<T: Stored>(&self, update: &Update<T>, confirmed: bool) -> Verdict {
        let mut verdict = Verdict::Disposed;
        let modified = self.state.send_if_modified(|snap| {
            if self.is_disposed() {
                return false;
            }
            verdict = T::map(snap).judge(update, self.tie_break, confirmed);
            if !verdict.changed() {
                return false;
            }
            let snap = Arc::make_mut(snap);
            let at = snap.next_version();
            T::map_mut(snap).commit(update, at);
            snap.bump();
            true
        });
        if modified {
            self.notify();
        }
        verdict
    }

    /// Store a whole entity the server just returned for a mutation.
    pub(crate) fn put_confirmed<T: Stored>(&self, entity: T) -> Verdict {
        let mut verdict = Verdict::Disposed;
        let modified = self.state.send_if_modified(|snap| {
            if self.is_disposed() {
                return false;
            }
            let unchanged = T::map(snap)
                .get(&entity.id())
                .is_some_and(|current| **current == entity);
            if unchanged {
                verdict = Verdict::Unchanged;
                return false;
            }
            let snap = Arc::make_mut(snap);
            let at = snap.next_version();
            T::map_mut(snap).insert(entity.clone(), at);
            snap.bump();
            verdict = Verdict::Applied;
            true
        });
        if modified {
            self.notify();
        }
        verdict
    }

    /// Replace the full set of one entity kind with a listing requested
    /// at store version `issued_at`. `None` when disposed.
    pub(crate) fn replace_all<T: Stored>(
        &self,
        entities: Vec<T>,
        issued_at: u64,
    ) -> Option<ReplaceOutcome> {
        let mut outcome = None;
        let modified = self.state.send_if_modified(|snap| {
            if self.is_disposed() {
                return false;
            }
            let snap = Arc::make_mut(snap);
            let at = snap.next_version();
            let result = T::map_mut(snap).replace_all(entities, self.tie_break, issued_at, at);
            if result.changed() {
                snap.bump();
            }
            outcome = Some(result);
            result.changed()
        });
        if modified {
            self.notify();
        }
        outcome
    }

    /// Remove after a confirmed delete. Returns `true` if the entity
    /// was present.
    pub(crate) fn remove_confirmed<T: Stored>(&self, id: T::Id) -> bool {
        let modified = self.state.send_if_modified(|snap| {
            if self.is_disposed() || T::map(snap).get(&id).is_none() {
                return false;
            }
            let snap = Arc::make_mut(snap);
            let at = snap.next_version();
            let removed = T::map_mut(snap).remove_confirmed(id, at);
            if removed {
                snap.bump();
            }
            removed
        });
        if modified {
            self.notify();
        }
        modified
    }

    /// Stop accepting writes and drop every listener. Returns `true` on
    /// the first call only.
    pub(crate) fn dispose(&self) -> bool {
        let mut first = false;
        // Flip the flag inside the critical section so no write can
        // straddle it.
        self.state.send_if_modified(|_| {
            first = !self.disposed.swap(true, Ordering::SeqCst);
            false
        });
        self.listeners.clear();
        if first {
            trace!("snapshot store disposed");
        }
        first
    }
}

// ── Subscription handle ──────────────────────────────────────────────

/// Keeps a change listener registered. Dropping it unregisters.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    store: Weak<SnapshotStore>,
    id: u64,
}

impl Subscription {
    /// Unregister the listener. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if let Some(store) = self.store.upgrade() {
            store.listeners.remove(&self.id);
        }
    }

    /// Keep the listener registered for the store's lifetime.
    pub fn detach(mut self) {
        self.store = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
