// ── Core error types ──
//
// User-facing errors from tablero-core. Consumers never see reqwest or
// JSON failures directly: the `From<tablero_api::Error>` impl folds
// transport-layer errors into the kinds a dashboard can act on.

use thiserror::Error;

use crate::model::{EntityKey, ReservationId, ReservationStatus};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    /// Server unreachable, or it answered with a non-2xx status.
    #[error("Request failed: {message}")]
    Transport {
        message: String,
        /// HTTP status code (if the server answered).
        status: Option<u16>,
    },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The server rejected the credential. Polling halts until the
    /// dashboard is told the session was re-established.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Invalid data from server: {message}")]
    Parse { message: String },

    #[error("Not found: {entity_type} {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("A change to {key} is already in flight")]
    Conflict { key: EntityKey },

    /// A command rejected before any request was sent.
    #[error("Invalid command: {message}")]
    Validation { message: String },

    #[error("Reservation {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
    },

    #[error("Dashboard has been disposed")]
    Disposed,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Re-label a generic not-found for the entity a call addressed.
    pub(crate) fn for_entity(self, key: EntityKey) -> Self {
        match self {
            Self::NotFound { .. } => Self::NotFound {
                entity_type: key.kind().to_string(),
                identifier: key.raw_id().to_string(),
            },
            other => other,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tablero_api::Error> for CoreError {
    fn from(err: tablero_api::Error) -> Self {
        match err {
            tablero_api::Error::Authentication { message } => CoreError::Auth { message },
            tablero_api::Error::MissingToken => CoreError::Auth {
                message: "no credential available".into(),
            },
            // The REST client reports its own timeouts as `Timeout`; a
            // raw one here has no known limit.
            tablero_api::Error::Transport(ref e) => CoreError::Transport {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            tablero_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            tablero_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            tablero_api::Error::Tls(msg) => CoreError::Transport {
                message: format!("TLS error: {msg}"),
                status: None,
            },
            tablero_api::Error::Api { status, message } => CoreError::Transport {
                message,
                status: Some(status),
            },
            tablero_api::Error::NotFound { path, message: _ } => CoreError::NotFound {
                entity_type: "resource".into(),
                identifier: path,
            },
            tablero_api::Error::Stream(reason) => CoreError::Transport {
                message: format!("Event stream failed: {reason}"),
                status: None,
            },
            tablero_api::Error::Deserialization { message, body: _ } => {
                CoreError::Parse { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TableId;

    #[test]
    fn api_errors_fold_into_core_kinds() {
        let auth: CoreError = tablero_api::Error::Authentication {
            message: "expired".into(),
        }
        .into();
        assert!(auth.is_auth());

        let api: CoreError = tablero_api::Error::Api {
            status: 503,
            message: "down".into(),
        }
        .into();
        assert!(matches!(
            api,
            CoreError::Transport {
                status: Some(503),
                ..
            }
        ));

        let parse: CoreError = tablero_api::Error::Deserialization {
            message: "eof".into(),
            body: String::new(),
        }
        .into();
        assert!(matches!(parse, CoreError::Parse { .. }));

        let timeout: CoreError = tablero_api::Error::Timeout { timeout_secs: 30 }.into();
        assert_eq!(timeout.to_string(), "Request timed out after 30s");
    }

    #[test]
    fn not_found_is_relabelled_for_the_entity() {
        let err: CoreError = tablero_api::Error::NotFound {
            path: "/api/v1/mesas/9".into(),
            message: "missing".into(),
        }
        .into();
        let err = err.for_entity(TableId(9).into());
        assert_eq!(err.to_string(), "Not found: table 9");
    }
}
