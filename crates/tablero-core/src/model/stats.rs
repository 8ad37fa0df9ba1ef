// ── Server-computed dashboard counters ──
//
// Informational only: the dashboard's own aggregates are derived from
// the snapshot. These are kept so the two can be compared.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStats {
    pub total_reservations: u64,
    pub reservations_today: u64,
    pub pending_reservations: u64,
    pub confirmed_today: u64,
    /// Keyed by wire status spelling; unknown keys are kept verbatim.
    pub reservations_by_status: BTreeMap<String, u64>,
    pub total_tables: u64,
    pub available_tables: u64,
    pub occupied_tables: u64,
    pub reserved_tables: u64,
}
