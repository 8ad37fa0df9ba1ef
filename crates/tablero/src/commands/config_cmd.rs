//! Config subcommand handlers.

use std::fmt::Write as _;
use std::str::FromStr;

use dialoguer::{Input, Select};

use tablero_config::KEYRING_SERVICE;
use tablero_core::TieBreak;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking the plaintext token.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "server = \"{}\"", p.server);
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        let numbers = [
            ("timeout", p.timeout),
            ("retry_secs", p.retry_secs),
            ("tables_poll_secs", p.tables_poll_secs),
            ("reservations_poll_secs", p.reservations_poll_secs),
            ("stats_poll_secs", p.stats_poll_secs),
        ];
        for (key, value) in numbers {
            if let Some(v) = value {
                let _ = writeln!(out, "{key} = {v}");
            }
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(stream) = p.stream {
            let _ = writeln!(out, "stream = {stream}");
        }
        if let Some(ref path) = p.stream_path {
            let _ = writeln!(out, "stream_path = \"{path}\"");
        }
        if let Some(len) = p.preview_len {
            let _ = writeln!(out, "preview_len = {len}");
        }
        if let Some(tie_break) = p.tie_break {
            let _ = writeln!(out, "tie_break = \"{tie_break}\"");
        }
    }

    out
}

/// Config with plaintext tokens masked, for structured output.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some("****".into());
        }
    }
    cfg
}

fn save_config(cfg: &Config) -> Result<(), CliError> {
    config::save_config(cfg)?;
    Ok(())
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn keyring_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "keyring".into(),
        reason: format!("keyring access failed: {e}"),
    }
}

fn store_token_in_keyring(profile_name: &str, token: &str) -> Result<(), CliError> {
    keyring::Entry::new(KEYRING_SERVICE, &config::keyring_account(profile_name))
        .map_err(keyring_err)?
        .set_password(token)
        .map_err(keyring_err)
}

fn parse_value<T: FromStr>(key: &str, value: &str, expected: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: key.into(),
        reason: format!("must be {expected}"),
    })
}

const SETTABLE_KEYS: &str = "server, token, token_env, ca_cert, insecure, timeout, stream, \
                             stream_path, retry_secs, tables_poll_secs, reservations_poll_secs, \
                             stats_poll_secs, preview_len, tie_break";

/// Apply `key = value` to a profile. Dashes and underscores are
/// interchangeable in key names.
fn set_profile_key(profile: &mut Profile, key: &str, value: &str) -> Result<(), CliError> {
    let secs = "a number of seconds";
    match key.replace('-', "_").as_str() {
        "server" => {
            tablero_config::parse_server_url(value)?;
            profile.server = value.to_owned();
        }
        "token" => profile.token = Some(value.to_owned()),
        "token_env" => profile.token_env = Some(value.to_owned()),
        "ca_cert" => profile.ca_cert = Some(value.into()),
        "insecure" => profile.insecure = Some(parse_value(key, value, "'true' or 'false'")?),
        "timeout" => profile.timeout = Some(parse_value(key, value, secs)?),
        "stream" => profile.stream = Some(parse_value(key, value, "'true' or 'false'")?),
        "stream_path" => profile.stream_path = Some(value.to_owned()),
        "retry_secs" => profile.retry_secs = Some(parse_value(key, value, secs)?),
        "tables_poll_secs" => profile.tables_poll_secs = Some(parse_value(key, value, secs)?),
        "reservations_poll_secs" => {
            profile.reservations_poll_secs = Some(parse_value(key, value, secs)?);
        }
        "stats_poll_secs" => profile.stats_poll_secs = Some(parse_value(key, value, secs)?),
        "preview_len" => profile.preview_len = Some(parse_value(key, value, "a count")?),
        "tie_break" => {
            let tie_break: TieBreak =
                parse_value(key, value, "'keep-existing' or 'last-arrival'")?;
            profile.tie_break = Some(tie_break);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!("unknown config key '{other}'. Valid keys: {SETTABLE_KEYS}"),
            });
        }
    }
    Ok(())
}

fn init_wizard(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("tablero configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(global.profile.clone().unwrap_or_else(|| "default".into()))
        .interact_text()
        .map_err(prompt_err)?;

    let server: String = Input::new()
        .with_prompt("API root URL")
        .default("http://localhost:8000/api/v1/".into())
        .validate_with(|input: &String| {
            tablero_config::parse_server_url(input)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_err)?;

    let mut profile = Profile::new(server);

    let choices = &[
        "Store a token in the system keyring (recommended)",
        "Read the token from an environment variable",
        "Save the token to the config file (plaintext)",
        "No token",
    ];
    let selection = Select::new()
        .with_prompt("Authentication")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    match selection {
        0 | 2 => {
            let token = rpassword::prompt_password("Token: ").map_err(prompt_err)?;
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "token cannot be empty".into(),
                });
            }
            if selection == 0 {
                store_token_in_keyring(&profile_name, &token)?;
                eprintln!("   Token stored in system keyring");
            } else {
                profile.token = Some(token);
            }
        }
        1 => {
            let var: String = Input::new()
                .with_prompt("Variable name")
                .default("TABLERO_TOKEN".into())
                .interact_text()
                .map_err(prompt_err)?;
            profile.token_env = Some(var);
        }
        _ => {}
    }

    let mut cfg = config::load_config_or_default();
    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    save_config(&cfg)?;

    eprintln!("\nConfiguration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: tablero tables list");
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init_wizard(global),

        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config()?);
            let out = output::render_single(global.output, &cfg, format_config_redacted, |c| {
                c.default_profile.clone().unwrap_or_default()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config()?;
            let profile_name = config::active_profile_name(global, &cfg);
            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_profile_key(profile, &key, &value)?;
            save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Set {key} on profile '{profile_name}'");
            }
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: tablero config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetToken { profile } => {
            let cfg = config::load_config()?;
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&profile_name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name: profile_name,
                });
            }

            let token = rpassword::prompt_password("Token: ").map_err(prompt_err)?;
            if token.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "value cannot be empty".into(),
                });
            }
            store_token_in_keyring(&profile_name, &token)?;
            if !global.quiet {
                eprintln!("Token stored in system keyring for profile '{profile_name}'");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn keys_accept_dashes_and_parse_values() {
        let mut p = Profile::new("http://localhost:8000/api/v1/");
        set_profile_key(&mut p, "stats-poll-secs", "45").unwrap();
        set_profile_key(&mut p, "stream", "false").unwrap();
        set_profile_key(&mut p, "tie_break", "last-arrival").unwrap();
        assert_eq!(p.stats_poll_secs, Some(45));
        assert_eq!(p.stream, Some(false));
        assert_eq!(p.tie_break, Some(TieBreak::LastArrival));
    }

    #[test]
    fn bad_values_are_usage_errors() {
        let mut p = Profile::default();
        for (key, value) in [
            ("timeout", "soon"),
            ("insecure", "maybe"),
            ("server", "nope"),
            ("tie_break", "coin-flip"),
            ("colour", "red"),
        ] {
            let err = set_profile_key(&mut p, key, value).unwrap_err();
            assert_eq!(err.exit_code(), crate::error::exit_code::USAGE, "{key}");
        }
        assert_eq!(p, Profile::default());
    }

    #[test]
    fn show_masks_the_token() {
        let mut cfg = Config::default();
        let mut p = Profile::new("http://localhost:8000/api/v1/");
        p.token = Some("s3cret".into());
        cfg.profiles.insert("local".into(), p);

        let text = format_config_redacted(&redacted(&cfg));
        assert!(text.contains("token = \"****\""));
        assert!(!text.contains("s3cret"));
    }
}
