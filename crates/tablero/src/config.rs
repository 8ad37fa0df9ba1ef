//! CLI configuration: thin wrapper around `tablero_config`.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--server, --token, --timeout, -k).

use std::time::Duration;

use secrecy::SecretString;
use tracing::debug;

use tablero_config::ConfigError;
use tablero_core::{DashboardConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use tablero_config::{
    Config, Profile, config_path, keyring_account, load_config, load_config_or_default,
    save_config,
};

/// Everything a command needs to reach the server.
pub struct Resolved {
    pub dashboard: DashboardConfig,
    /// `None` sends requests without an `Authorization` header.
    pub token: Option<SecretString>,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names for diagnostics.
pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config
            .profiles
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Build the engine config from the config file, the active profile and
/// CLI overrides. Without a profile, `--server` alone is enough.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    let profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        None => Profile::new(global.server.clone().ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?),
    };

    let mut dashboard = tablero_config::profile_to_dashboard_config(&profile, &cfg.defaults)?;

    if let Some(ref server) = global.server {
        dashboard.url = tablero_config::parse_server_url(server)?;
    }
    if global.insecure {
        dashboard.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        dashboard.timeout = Duration::from_secs(secs);
    }

    let token = resolve_token_with_flag(&profile, &profile_name, global)?;
    Ok(Resolved { dashboard, token })
}

/// CLI flag first, then the shared resolution chain. A missing token is
/// not an error: the server decides which endpoints need one.
fn resolve_token_with_flag(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<Option<SecretString>, CliError> {
    if let Some(ref token) = global.token {
        return Ok(Some(SecretString::from(token.clone())));
    }
    match tablero_config::resolve_token(profile, profile_name) {
        Ok(token) => Ok(Some(token)),
        Err(ConfigError::NoCredentials { .. }) => {
            debug!(profile = profile_name, "no token configured, sending requests without one");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
