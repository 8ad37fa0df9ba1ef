// ── Aggregator ──
//
// Derived dashboard views. A pure function of one snapshot and a clock
// reading: a single linear pass over each entity kind.

use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;

use crate::model::{Reservation, ReservationStatus, TableStatus};
use crate::store::Snapshot;

/// Table counts by status. `available + occupied + reserved == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub total: u64,
    pub available: u64,
    pub occupied: u64,
    pub reserved: u64,
}

impl TableCounts {
    /// Share of tables not available, in percent.
    pub fn occupancy_pct(&self) -> f64 {
        percent(self.occupied + self.reserved, self.total)
    }
}

/// Reservation counts by status across the loaded reservations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReservationCounts {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub cancelled: u64,
    pub completed: u64,
}

impl ReservationCounts {
    pub fn of(&self, status: ReservationStatus) -> u64 {
        match status {
            ReservationStatus::Pending => self.pending,
            ReservationStatus::Confirmed => self.confirmed,
            ReservationStatus::Cancelled => self.cancelled,
            ReservationStatus::Completed => self.completed,
        }
    }

    /// Percentage of all reservations in `status`; 0 when there are none.
    pub fn share(&self, status: ReservationStatus) -> f64 {
        percent(self.of(status), self.total)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TodayCounts {
    pub total: u64,
    pub confirmed: u64,
    pub pending: u64,
}

/// Everything the dashboard header and side panels show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregates {
    pub tables: TableCounts,
    pub reservations: ReservationCounts,
    pub today: TodayCounts,
    /// Today's reservations from the current minute on, soonest first,
    /// cancelled ones left out.
    pub upcoming: Vec<Arc<Reservation>>,
    /// Snapshot version these figures were derived from.
    pub version: u64,
    pub computed_at: NaiveDateTime,
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

fn truncate_to_minute(now: NaiveDateTime) -> NaiveDateTime {
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

/// Derive every dashboard figure from `snapshot` as of `now` (local
/// wall-clock time, as reservations are booked in it).
pub fn compute(snapshot: &Snapshot, now: NaiveDateTime, preview_len: usize) -> Aggregates {
    let mut tables = TableCounts::default();
    for table in snapshot.tables() {
        tables.total += 1;
        match table.status {
            TableStatus::Available => tables.available += 1,
            TableStatus::Occupied => tables.occupied += 1,
            TableStatus::Reserved => tables.reserved += 1,
        }
    }

    let today_date = now.date();
    let cutoff = truncate_to_minute(now);
    let mut reservations = ReservationCounts::default();
    let mut today = TodayCounts::default();
    let mut upcoming: Vec<&Arc<Reservation>> = Vec::new();

    for reservation in snapshot.reservations() {
        reservations.total += 1;
        match reservation.status {
            ReservationStatus::Pending => reservations.pending += 1,
            ReservationStatus::Confirmed => reservations.confirmed += 1,
            ReservationStatus::Cancelled => reservations.cancelled += 1,
            ReservationStatus::Completed => reservations.completed += 1,
        }

        if reservation.date != today_date {
            continue;
        }
        today.total += 1;
        match reservation.status {
            ReservationStatus::Confirmed => today.confirmed += 1,
            ReservationStatus::Pending => today.pending += 1,
            ReservationStatus::Cancelled | ReservationStatus::Completed => {}
        }
        if reservation.status != ReservationStatus::Cancelled && reservation.starts_at() >= cutoff {
            upcoming.push(reservation);
        }
    }

    upcoming.sort_by_key(|r| (r.time, r.id));
    let upcoming = upcoming
        .into_iter()
        .take(preview_len)
        .map(Arc::clone)
        .collect();

    Aggregates {
        tables,
        reservations,
        today,
        upcoming,
        version: snapshot.version(),
        computed_at: now,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::TieBreak;
    use crate::model::{
        Record, ReservationId, ReservationPatch, Revision, Table, TableId, TablePatch, Update,
    };
    use crate::store::SnapshotStore;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(19, 0, 42)
            .unwrap()
    }

    fn seed_table(store: &SnapshotStore, id: i64, status: TableStatus) {
        store.apply(
            &Update::<Table> {
                id: TableId(id),
                patch: TablePatch::status(status),
                revision: Revision::new(1),
            },
            false,
        );
    }

    fn seed_reservation(
        store: &SnapshotStore,
        id: i64,
        day: u32,
        (h, m): (u32, u32),
        status: ReservationStatus,
    ) {
        let patch = ReservationPatch {
            first_name: Some(format!("guest{id}")),
            party_size: Some(2),
            date: NaiveDate::from_ymd_opt(2024, 1, day),
            time: NaiveTime::from_hms_opt(h, m, 0),
            status: Some(status),
            ..ReservationPatch::default()
        };
        let reservation =
            Reservation::from_patch(ReservationId(id), &patch, Revision::new(1)).unwrap();
        store.put_confirmed(reservation);
    }

    #[test]
    fn empty_snapshot_has_zero_shares() {
        let agg = compute(&Snapshot::default(), now(), 5);
        assert_eq!(agg.tables, TableCounts::default());
        assert!(agg.upcoming.is_empty());
        assert!(agg.reservations.share(ReservationStatus::Pending).abs() < f64::EPSILON);
        assert!(agg.tables.occupancy_pct().abs() < f64::EPSILON);
    }

    #[test]
    fn table_counts_sum_to_total() {
        let store = SnapshotStore::new(TieBreak::KeepExisting);
        seed_table(&store, 1, TableStatus::Available);
        seed_table(&store, 2, TableStatus::Occupied);
        seed_table(&store, 3, TableStatus::Reserved);
        seed_table(&store, 4, TableStatus::Occupied);

        let t = compute(&store.snapshot(), now(), 5).tables;
        assert_eq!(t.total, 4);
        assert_eq!(t.available + t.occupied + t.reserved, t.total);
        assert!((t.occupancy_pct() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn upcoming_keeps_today_from_this_minute_without_cancelled() {
        let store = SnapshotStore::new(TieBreak::KeepExisting);
        seed_reservation(&store, 1, 1, (18, 30), ReservationStatus::Confirmed);
        seed_reservation(&store, 2, 1, (19, 0), ReservationStatus::Pending);
        seed_reservation(&store, 3, 1, (21, 0), ReservationStatus::Cancelled);
        seed_reservation(&store, 4, 1, (20, 15), ReservationStatus::Confirmed);
        seed_reservation(&store, 5, 2, (19, 30), ReservationStatus::Pending);
        seed_reservation(&store, 6, 1, (19, 0), ReservationStatus::Confirmed);

        let agg = compute(&store.snapshot(), now(), 5);
        let ids: Vec<i64> = agg.upcoming.iter().map(|r| r.id.get()).collect();
        assert_eq!(ids, vec![2, 6, 4]);

        assert_eq!(agg.reservations.total, 6);
        assert_eq!(agg.reservations.confirmed, 3);
        assert_eq!(agg.reservations.cancelled, 1);
        assert_eq!(
            agg.today,
            TodayCounts {
                total: 5,
                confirmed: 3,
                pending: 1,
            }
        );
        assert!((agg.reservations.share(ReservationStatus::Pending) - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn preview_is_capped() {
        let store = SnapshotStore::new(TieBreak::KeepExisting);
        for id in 1..=8 {
            let minute = u32::try_from(id).unwrap();
            seed_reservation(&store, id, 1, (20, minute), ReservationStatus::Pending);
        }
        let agg = compute(&store.snapshot(), now(), 5);
        assert_eq!(agg.upcoming.len(), 5);
        assert_eq!(agg.upcoming[0].id, ReservationId(1));
        assert_eq!(compute(&store.snapshot(), now(), 0).upcoming.len(), 0);
    }
}
