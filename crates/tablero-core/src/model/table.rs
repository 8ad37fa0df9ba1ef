// ── Table domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::{EntityKind, Record, Revision, TableId};

/// Occupancy status of a table. Closed set; the wire spellings are the
/// server's.
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
pub enum TableStatus {
    #[serde(rename = "disponible")]
    #[strum(serialize = "disponible")]
    Available,
    #[serde(rename = "ocupada")]
    #[strum(serialize = "ocupada")]
    Occupied,
    #[serde(rename = "reservada")]
    #[strum(serialize = "reservada")]
    Reserved,
}

/// Capacity class of a table (`tipo_mesa`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableType {
    pub id: i64,
    pub description: Option<String>,
    pub seats: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: TableId,
    /// Display number; falls back to the id when the server omits it.
    pub number: i64,
    pub type_id: Option<i64>,
    pub table_type: Option<TableType>,
    pub status: TableStatus,
    pub occupants: Option<u32>,
    pub revision: Revision,
}

/// Partial table state as carried by stream events and mutation
/// responses. `None` means "not present in the message".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TablePatch {
    pub number: Option<i64>,
    pub type_id: Option<i64>,
    pub table_type: Option<TableType>,
    pub status: Option<TableStatus>,
    pub occupants: Option<u32>,
}

impl TablePatch {
    pub fn status(status: TableStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

impl Record for Table {
    type Id = TableId;
    type Patch = TablePatch;
    const KIND: EntityKind = EntityKind::Table;

    fn id(&self) -> TableId {
        self.id
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn merged(&self, patch: &TablePatch, revision: Revision) -> Self {
        let mut next = self.clone();
        if let Some(number) = patch.number {
            next.number = number;
        }
        if let Some(type_id) = patch.type_id {
            // A new type id invalidates the embedded type unless the
            // patch carries the matching one.
            if next.type_id != Some(type_id) {
                next.table_type = None;
            }
            next.type_id = Some(type_id);
        }
        if let Some(ref table_type) = patch.table_type {
            next.type_id = Some(table_type.id);
            next.table_type = Some(table_type.clone());
        }
        if let Some(status) = patch.status {
            next.status = status;
        }
        if let Some(occupants) = patch.occupants {
            next.occupants = Some(occupants);
        }
        next.revision = revision;
        next
    }

    fn from_patch(id: TableId, patch: &TablePatch, revision: Revision) -> Option<Self> {
        let status = patch.status?;
        Some(Self {
            id,
            number: patch.number.unwrap_or(id.get()),
            type_id: patch
                .type_id
                .or_else(|| patch.table_type.as_ref().map(|t| t.id)),
            table_type: patch.table_type.clone(),
            status,
            occupants: patch.occupants,
            revision,
        })
    }
}

impl Table {
    pub fn seats(&self) -> Option<u32> {
        self.table_type.as_ref().and_then(|t| t.seats)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn table(status: TableStatus) -> Table {
        Table::from_patch(TableId(1), &TablePatch::status(status), Revision::new(10)).unwrap()
    }

    #[test]
    fn status_uses_server_spelling() {
        assert_eq!(TableStatus::Occupied.to_string(), "ocupada");
        assert_eq!(
            TableStatus::from_str("reservada").unwrap(),
            TableStatus::Reserved
        );
        assert!(TableStatus::from_str("broken").is_err());
        assert!(TableStatus::from_str("Disponible").is_err());
    }

    #[test]
    fn creating_requires_a_status() {
        assert!(Table::from_patch(TableId(2), &TablePatch::default(), Revision::new(1)).is_none());
        let t = table(TableStatus::Available);
        assert_eq!(t.number, 1);
        assert_eq!(t.revision, Revision::new(10));
    }

    #[test]
    fn merge_keeps_fields_the_patch_omits() {
        let mut base = table(TableStatus::Available);
        base.table_type = Some(TableType {
            id: 3,
            description: Some("Terraza".into()),
            seats: Some(4),
        });
        base.type_id = Some(3);

        let next = base.merged(&TablePatch::status(TableStatus::Occupied), Revision::new(11));
        assert_eq!(next.status, TableStatus::Occupied);
        assert_eq!(next.seats(), Some(4));
        assert_eq!(next.revision, Revision::new(11));
    }

    #[test]
    fn merge_drops_stale_type_details_on_type_change() {
        let mut base = table(TableStatus::Available);
        base.type_id = Some(3);
        base.table_type = Some(TableType {
            id: 3,
            description: None,
            seats: Some(4),
        });
        let patch = TablePatch {
            type_id: Some(5),
            ..TablePatch::default()
        };
        let next = base.merged(&patch, Revision::new(11));
        assert_eq!(next.type_id, Some(5));
        assert!(next.table_type.is_none());
    }
}
