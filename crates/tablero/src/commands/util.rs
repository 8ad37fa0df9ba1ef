//! Shared helpers for command handlers.

use std::io::IsTerminal;

use chrono::{Local, NaiveDate, NaiveTime};

use tablero_core::{ReservationFilter, ReservationStatus, TableStatus};

use crate::cli::{ReservationFilterArgs, ReservationStatusArg, TableStatusArg};
use crate::error::CliError;

impl From<TableStatusArg> for TableStatus {
    fn from(arg: TableStatusArg) -> Self {
        match arg {
            TableStatusArg::Available => Self::Available,
            TableStatusArg::Occupied => Self::Occupied,
            TableStatusArg::Reserved => Self::Reserved,
        }
    }
}

impl From<ReservationStatusArg> for ReservationStatus {
    fn from(arg: ReservationStatusArg) -> Self {
        match arg {
            ReservationStatusArg::Pending => Self::Pending,
            ReservationStatusArg::Confirmed => Self::Confirmed,
            ReservationStatusArg::Cancelled => Self::Cancelled,
            ReservationStatusArg::Completed => Self::Completed,
        }
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// `YYYY-MM-DD`, or "today" in local time.
pub fn parse_date(value: &str, field: &str) -> Result<NaiveDate, CliError> {
    if value.eq_ignore_ascii_case("today") {
        return Ok(Local::now().date_naive());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("invalid date '{value}' (use YYYY-MM-DD)"),
    })
}

/// `HH:MM` or `HH:MM:SS`.
pub fn parse_time(value: &str, field: &str) -> Result<NaiveTime, CliError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| CliError::Validation {
            field: field.into(),
            reason: format!("invalid time '{value}' (use HH:MM)"),
        })
}

/// Today's reservations unless a date or `--all-dates` is given.
pub fn reservation_filter(args: &ReservationFilterArgs) -> Result<ReservationFilter, CliError> {
    let date = if args.all_dates {
        None
    } else {
        match args.date.as_deref() {
            Some(raw) => Some(parse_date(raw, "date")?),
            None => Some(Local::now().date_naive()),
        }
    };
    Ok(ReservationFilter::any()
        .with_status(args.status.map(Into::into))
        .with_date(date))
}

/// "-" for absent values in detail views.
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}
