// ── Core identity types ──
//
// Server-assigned integer ids, wrapped so a table id can never be passed
// where a reservation id is expected. Ids are stable and never reused.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }
    };
}

integer_id!(
    /// `id_mesa`.
    TableId
);

integer_id!(
    /// `id_reserva`.
    ReservationId
);

/// The two entity kinds held in a snapshot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Table,
    Reservation,
}

/// A `(kind, id)` pair: the unit of staleness checks and of the
/// one-mutation-in-flight rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityKey {
    Table(TableId),
    Reservation(ReservationId),
}

impl EntityKey {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Table(_) => EntityKind::Table,
            Self::Reservation(_) => EntityKind::Reservation,
        }
    }

    pub fn raw_id(&self) -> i64 {
        match self {
            Self::Table(id) => id.get(),
            Self::Reservation(id) => id.get(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.raw_id())
    }
}

impl From<TableId> for EntityKey {
    fn from(id: TableId) -> Self {
        Self::Table(id)
    }
}

impl From<ReservationId> for EntityKey {
    fn from(id: ReservationId) -> Self {
        Self::Reservation(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_and_display() {
        let id: TableId = " 12 ".parse().unwrap();
        assert_eq!(id, TableId(12));
        assert_eq!(id.to_string(), "12");
        assert!("mesa-1".parse::<ReservationId>().is_err());
    }

    #[test]
    fn entity_key_display_names_the_kind() {
        assert_eq!(EntityKey::from(TableId(3)).to_string(), "table 3");
        assert_eq!(
            EntityKey::from(ReservationId(9)).to_string(),
            "reservation 9"
        );
    }

    #[test]
    fn table_and_reservation_keys_never_collide() {
        assert_ne!(
            EntityKey::from(TableId(1)),
            EntityKey::from(ReservationId(1))
        );
    }
}
