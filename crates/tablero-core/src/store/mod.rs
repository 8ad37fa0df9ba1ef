// ── Snapshot store ──
//
// Revision-checked entity storage with push-based change notification.

mod collection;
mod snapshot;
mod snapshot_store;

pub(crate) use collection::{ReplaceOutcome, Verdict};
pub use snapshot::Snapshot;
pub(crate) use snapshot::Stored;
pub use snapshot_store::{Listener, SnapshotStore, Subscription};
