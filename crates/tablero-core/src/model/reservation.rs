// ── Reservation domain types ──

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::{EntityKind, Record, ReservationId, Revision, TableId};

/// Lifecycle status of a reservation. Closed set; the wire spellings
/// are the server's.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum ReservationStatus {
    #[serde(rename = "pendiente")]
    #[strum(serialize = "pendiente")]
    Pending,
    #[serde(rename = "confirmada")]
    #[strum(serialize = "confirmada")]
    Confirmed,
    #[serde(rename = "cancelada")]
    #[strum(serialize = "cancelada")]
    Cancelled,
    #[serde(rename = "completada")]
    #[strum(serialize = "completada")]
    Completed,
}

impl ReservationStatus {
    /// Whether an admin may move a reservation from `self` to `next`.
    ///
    /// `Completed` is terminal. Leaving `Cancelled` needs an explicit
    /// override. Re-asserting the current status is always allowed.
    pub fn can_transition_to(self, next: Self, admin_override: bool) -> bool {
        if self == next {
            return true;
        }
        match self {
            Self::Completed => false,
            Self::Cancelled => admin_override,
            Self::Pending | Self::Confirmed => true,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub party_size: u32,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub table_id: Option<TableId>,
    pub status: ReservationStatus,
    pub created_at: Option<NaiveDateTime>,
    pub revision: Revision,
}

impl Reservation {
    pub fn full_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (false, true) => self.first_name.clone(),
            _ => self.last_name.clone(),
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// Partial reservation state. `None` means "not present in the message".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub party_size: Option<u32>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub table_id: Option<TableId>,
    pub status: Option<ReservationStatus>,
    pub created_at: Option<NaiveDateTime>,
}

impl Record for Reservation {
    type Id = ReservationId;
    type Patch = ReservationPatch;
    const KIND: EntityKind = EntityKind::Reservation;

    fn id(&self) -> ReservationId {
        self.id
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn merged(&self, patch: &ReservationPatch, revision: Revision) -> Self {
        let mut next = self.clone();
        if let Some(ref v) = patch.first_name {
            next.first_name.clone_from(v);
        }
        if let Some(ref v) = patch.last_name {
            next.last_name.clone_from(v);
        }
        if let Some(ref v) = patch.email {
            next.email.clone_from(v);
        }
        if patch.phone.is_some() {
            next.phone.clone_from(&patch.phone);
        }
        if let Some(v) = patch.party_size {
            next.party_size = v;
        }
        if let Some(v) = patch.date {
            next.date = v;
        }
        if let Some(v) = patch.time {
            next.time = v;
        }
        if patch.table_id.is_some() {
            next.table_id = patch.table_id;
        }
        if let Some(v) = patch.status {
            next.status = v;
        }
        if patch.created_at.is_some() {
            next.created_at = patch.created_at;
        }
        next.revision = revision;
        next
    }

    fn from_patch(id: ReservationId, patch: &ReservationPatch, revision: Revision) -> Option<Self> {
        Some(Self {
            id,
            first_name: patch.first_name.clone().unwrap_or_default(),
            last_name: patch.last_name.clone().unwrap_or_default(),
            email: patch.email.clone().unwrap_or_default(),
            phone: patch.phone.clone(),
            party_size: patch.party_size?,
            date: patch.date?,
            time: patch.time?,
            table_id: patch.table_id,
            status: patch.status?,
            created_at: patch.created_at,
            revision,
        })
    }
}

/// Server-side filter for the reservation list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    pub date: Option<NaiveDate>,
}

impl ReservationFilter {
    /// All statuses, today's date in local time.
    pub fn today() -> Self {
        Self {
            status: None,
            date: Some(Local::now().date_naive()),
        }
    }

    /// No filter at all.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: Option<ReservationStatus>) -> Self {
        self.status = status;
        self
    }

    pub fn with_date(mut self, date: Option<NaiveDate>) -> Self {
        self.date = date;
        self
    }
}
