//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use tablero_config::ConfigError;
use tablero_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the server: {reason}")]
    #[diagnostic(
        code(tablero::connection_failed),
        help(
            "Check that the reservation server is running and the URL is right.\n\
             Try: tablero config show"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Server error ({status}): {message}")]
    #[diagnostic(code(tablero::api_error))]
    ApiError { status: u16, message: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(tablero::timeout),
        help("Increase timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    #[error("Server sent data that could not be read: {message}")]
    #[diagnostic(code(tablero::invalid_data))]
    InvalidData { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(tablero::auth_failed),
        help(
            "The server rejected the token.\n\
             Store a new one with: tablero config set-token\n\
             Or pass --token / set TABLERO_TOKEN."
        )
    )]
    AuthFailed { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(tablero::not_found),
        help("Run: tablero {list_command} to see what exists")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("A change to {key} is already in progress")]
    #[diagnostic(code(tablero::conflict), help("Wait for it to finish and retry."))]
    Conflict { key: String },

    #[error("Reservation {id} cannot move from {from} to {to}")]
    #[diagnostic(
        code(tablero::invalid_transition),
        help("Completed reservations are final. Leaving 'cancelada' needs --force.")
    )]
    InvalidTransition { id: i64, from: String, to: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(tablero::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(tablero::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: tablero config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(tablero::no_config),
        help(
            "Create a profile with: tablero config init\n\
             Or pass --server. Config expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(tablero::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(tablero::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(tablero::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } | Self::InvalidTransition { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Transport {
                message,
                status: None,
            } => CliError::ConnectionFailed { reason: message },

            CoreError::Transport {
                message,
                status: Some(status),
            } => CliError::ApiError { status, message },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::Auth { message } => CliError::AuthFailed { message },

            CoreError::Parse { message } => CliError::InvalidData { message },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                list_command: format!("{entity_type}s list"),
                resource_type: entity_type,
                identifier,
            },

            CoreError::Conflict { key } => CliError::Conflict {
                key: key.to_string(),
            },

            CoreError::InvalidTransition { id, from, to } => CliError::InvalidTransition {
                id: id.get(),
                from: from.to_string(),
                to: to.to_string(),
            },

            CoreError::Validation { message } => CliError::Validation {
                field: "changes".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Disposed => CliError::Internal("dashboard already shut down".into()),

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other),
        }
    }
}
