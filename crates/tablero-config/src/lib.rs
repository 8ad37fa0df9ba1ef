//! Shared configuration for the tablero CLI.
//!
//! TOML profiles, token resolution (env var, system keyring, plaintext)
//! and translation to `tablero_core::DashboardConfig`. The CLI layers
//! its flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use tablero_core::{DashboardConfig, TieBreak, TlsVerification};

/// Keyring service name under which tokens are stored.
pub const KEYRING_SERVICE: &str = "tablero";

/// Environment variable consulted after a profile's `token_env`.
pub const TOKEN_ENV: &str = "TABLERO_TOKEN";

/// Points the CLI at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "TABLERO_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named server profile. Unset fields fall back to `[defaults]` or
/// to the engine's stock values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// API root, e.g. "http://localhost:8000/api/v1/".
    pub server: String,

    /// Bearer token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name holding the token.
    pub token_env: Option<String>,

    pub ca_cert: Option<PathBuf>,
    pub insecure: Option<bool>,
    pub timeout: Option<u64>,

    /// Open the event stream. Off means polling only.
    pub stream: Option<bool>,
    /// Event stream path relative to `server`.
    pub stream_path: Option<String>,
    /// Seconds between stream reconnect attempts.
    pub retry_secs: Option<u64>,

    /// Poll periods in seconds; 0 disables that timer.
    pub tables_poll_secs: Option<u64>,
    pub reservations_poll_secs: Option<u64>,
    pub stats_poll_secs: Option<u64>,

    pub preview_len: Option<usize>,
    pub tie_break: Option<TieBreak>,
}

impl Profile {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `$TABLERO_CONFIG`, else the platform
/// config directory.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "tablero", "tablero").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tablero");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then the TOML file, then `TABLERO_*` variables.
///
/// Nested keys use a double underscore, e.g.
/// `TABLERO_PROFILES__MAIN__SERVER` or `TABLERO_DEFAULTS__TIMEOUT`.
pub fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed("TABLERO_")
                .ignore(&["CONFIG", "TOKEN"])
                .split("__"),
        )
}

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or does
/// not parse.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Token resolution (without CLI flags) ────────────────────────────

/// Keyring account name for a profile's token.
pub fn keyring_account(profile_name: &str) -> String {
    format!("{profile_name}/token")
}

/// Resolve a bearer token: the profile's `token_env` variable, then
/// `$TABLERO_TOKEN`, then the system keyring, then the plaintext value.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Ok(val) = std::env::var(TOKEN_ENV) {
        return Ok(SecretString::from(val));
    }

    match keyring::Entry::new(KEYRING_SERVICE, &keyring_account(profile_name)) {
        Ok(entry) => match entry.get_password() {
            Ok(secret) => return Ok(SecretString::from(secret)),
            Err(e) => debug!(profile = profile_name, error = %e, "no token in keyring"),
        },
        Err(e) => debug!(error = %e, "keyring unavailable"),
    }

    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation to the engine config ────────────────────────────────

/// Parse a server root. A missing trailing slash is added so relative
/// endpoint paths resolve beneath it.
pub fn parse_server_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url: Url = raw.trim().parse().map_err(|e| ConfigError::Validation {
        field: "server".into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Validation {
            field: "server".into(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Build a `DashboardConfig` from a profile, with `defaults` filling
/// the gaps. No CLI flag overrides.
pub fn profile_to_dashboard_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<DashboardConfig, ConfigError> {
    let mut cfg = DashboardConfig::new(parse_server_url(&profile.server)?);

    cfg.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };
    cfg.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    if let Some(stream) = profile.stream {
        cfg.push_enabled = stream;
    }
    if let Some(ref path) = profile.stream_path {
        cfg.stream_path = path.trim_start_matches('/').to_owned();
    }
    if let Some(secs) = profile.retry_secs {
        if secs == 0 {
            return Err(ConfigError::Validation {
                field: "retry_secs".into(),
                reason: "must be at least 1".into(),
            });
        }
        cfg.stream_retry = Duration::from_secs(secs);
    }

    if let Some(secs) = profile.tables_poll_secs {
        cfg.poll.tables = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.reservations_poll_secs {
        cfg.poll.reservations = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.stats_poll_secs {
        cfg.poll.statistics = Duration::from_secs(secs);
    }
    if let Some(len) = profile.preview_len {
        cfg.preview_len = len;
    }
    if let Some(tie_break) = profile.tie_break {
        cfg.tie_break = tie_break;
    }
    Ok(cfg)
}
