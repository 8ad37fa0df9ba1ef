// ── Server modification stamps ──
//
// Every entity carries the server's `updated_at`. Integer stamps are
// compared as-is; ISO-8601 strings are normalized to epoch
// milliseconds so both shapes share one total order.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tablero_api::UpdatedAt;

use crate::error::CoreError;

/// Totally ordered modification stamp. Higher is newer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(i64);

impl Revision {
    /// Stamp for data that carried no `updated_at`. Loses to any real stamp.
    pub const UNKNOWN: Self = Self(i64::MIN);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub fn is_known(self) -> bool {
        self != Self::UNKNOWN
    }

    /// Normalize a wire stamp. An absent stamp is [`Revision::UNKNOWN`].
    pub fn from_wire(stamp: Option<&UpdatedAt>) -> Result<Self, CoreError> {
        match stamp {
            None => Ok(Self::UNKNOWN),
            Some(UpdatedAt::Counter(n)) => Ok(Self(*n)),
            Some(UpdatedAt::Timestamp(raw)) => parse_timestamp(raw).map(Self),
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("unknown")
        }
    }
}

/// Naive stamps are server-local wall time; they are treated as UTC,
/// which preserves ordering between stamps from the same server.
fn parse_timestamp(raw: &str) -> Result<i64, CoreError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|dt| dt.and_utc().timestamp_millis())
        .map_err(|e| CoreError::Parse {
            message: format!("invalid updated_at {raw:?}: {e}"),
        })
}
