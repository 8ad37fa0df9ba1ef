// ── Runtime dashboard configuration ──
//
// Describes *where* the server is and *how often* to sync. Never touches
// disk: the CLI builds a `DashboardConfig` from its profile and hands it
// in, together with an `AuthProvider`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::ReservationFilter;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed development servers).
    DangerAcceptInvalid,
}

/// How two updates carrying the *same* revision are resolved.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TieBreak {
    /// The entry already in the snapshot stays.
    #[default]
    KeepExisting,
    /// The update that arrives last wins.
    LastArrival,
}

/// Poll cadence per data domain. A zero duration disables the timer;
/// manual refreshes and filter changes still fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub tables: Duration,
    pub reservations: Duration,
    pub statistics: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            tables: Duration::from_secs(10),
            reservations: Duration::from_secs(10),
            statistics: Duration::from_secs(30),
        }
    }
}

impl PollIntervals {
    /// All timers off.
    pub fn disabled() -> Self {
        Self {
            tables: Duration::ZERO,
            reservations: Duration::ZERO,
            statistics: Duration::ZERO,
        }
    }
}

/// Configuration for one dashboard instance.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// API root, e.g. `http://localhost:8000/api/v1/`.
    pub url: Url,
    /// Event stream path, relative to `url`.
    pub stream_path: String,
    pub tls: TlsVerification,
    /// Per-request timeout for REST calls.
    pub timeout: Duration,
    /// Open the push channel on start.
    pub push_enabled: bool,
    /// Delay between stream reconnect attempts, unless the server sends
    /// its own `retry:` hint.
    pub stream_retry: Duration,
    pub poll: PollIntervals,
    /// Length of the upcoming-reservations preview.
    pub preview_len: usize,
    pub tie_break: TieBreak,
    /// Reservation filter applied from the first fetch.
    pub reservation_filter: ReservationFilter,
}

pub const DEFAULT_STREAM_PATH: &str = "mesas/stream";
pub const DEFAULT_PREVIEW_LEN: usize = 5;

impl DashboardConfig {
    /// Defaults for everything but the server URL. The initial
    /// reservation filter is today's date.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            stream_path: DEFAULT_STREAM_PATH.into(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            push_enabled: true,
            stream_retry: Duration::from_secs(3),
            poll: PollIntervals::default(),
            preview_len: DEFAULT_PREVIEW_LEN,
            tie_break: TieBreak::default(),
            reservation_filter: ReservationFilter::today(),
        }
    }
}
