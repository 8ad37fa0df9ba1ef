//! Reservation command handlers.

use std::sync::Arc;

use chrono::Local;
use tabled::Tabled;

use tablero_core::{
    AuthProvider, Dashboard, DashboardConfig, Reservation, ReservationChanges, ReservationFilter,
    ReservationId, ReservationStatus, SyncDomain, TableId,
};

use crate::cli::{GlobalOpts, ReservationsArgs, ReservationsCommand, UpdateReservationArgs};
use crate::error::CliError;
use crate::output;

use super::util::{self, or_dash};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ReservationRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Guests")]
    party_size: u32,
    #[tabled(rename = "Table")]
    table: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&Arc<Reservation>> for ReservationRow {
    fn from(r: &Arc<Reservation>) -> Self {
        Self {
            id: r.id.get(),
            date: r.date.to_string(),
            time: r.time.format("%H:%M").to_string(),
            name: r.full_name(),
            party_size: r.party_size,
            table: or_dash(r.table_id),
            status: r.status.to_string(),
        }
    }
}

fn detail(r: &Arc<Reservation>, color: bool) -> String {
    [
        format!("ID:      {}", r.id),
        format!("Name:    {}", r.full_name()),
        format!("Email:   {}", if r.email.is_empty() { "-" } else { r.email.as_str() }),
        format!("Phone:   {}", or_dash(r.phone.as_deref())),
        format!("Guests:  {}", r.party_size),
        format!("When:    {} {}", r.date, r.time.format("%H:%M")),
        format!("Table:   {}", or_dash(r.table_id)),
        format!("Status:  {}", output::reservation_status(r.status, color)),
    ]
    .join("\n")
}

fn print_list(reservations: &[Arc<Reservation>], global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_list(
        global.output,
        reservations,
        |r| ReservationRow::from(r),
        |r| r.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn print_one(reservation: &Arc<Reservation>, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        reservation,
        |r| detail(r, color),
        |r| r.status.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn changes_from_args(args: &UpdateReservationArgs) -> Result<ReservationChanges, CliError> {
    let table = if args.unassign {
        Some(None)
    } else {
        args.table.map(|id| Some(TableId(id)))
    };
    let changes = ReservationChanges {
        first_name: args.first_name.clone(),
        last_name: args.last_name.clone(),
        email: args.email.clone(),
        phone: args.phone.clone(),
        party_size: args.party_size,
        date: args
            .date
            .as_deref()
            .map(|d| util::parse_date(d, "date"))
            .transpose()?,
        time: args
            .time
            .as_deref()
            .map(|t| util::parse_time(t, "time"))
            .transpose()?,
        table,
        status: args.status.map(Into::into),
    };
    if changes.is_empty() {
        return Err(CliError::Validation {
            field: "update".into(),
            reason: "nothing to change; pass at least one field flag".into(),
        });
    }
    if changes.party_size == Some(0) {
        return Err(CliError::Validation {
            field: "party-size".into(),
            reason: "must be at least 1".into(),
        });
    }
    Ok(changes)
}

async fn apply(
    config: DashboardConfig,
    auth: Arc<dyn AuthProvider>,
    id: i64,
    changes: ReservationChanges,
    admin_override: bool,
) -> Result<Arc<Reservation>, CliError> {
    let reservation = Dashboard::oneshot(config, auth, move |dashboard| async move {
        dashboard
            .update_reservation(ReservationId(id), changes, admin_override)
            .await
    })
    .await?;
    Ok(reservation)
}

async fn set_status(
    config: DashboardConfig,
    auth: Arc<dyn AuthProvider>,
    id: i64,
    status: ReservationStatus,
    admin_override: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let reservation = apply(
        config,
        auth,
        id,
        ReservationChanges::status(status),
        admin_override,
    )
    .await?;
    if !global.quiet {
        let color = output::should_color(global.color);
        eprintln!(
            "Reservation {} is now {}",
            reservation.id,
            output::reservation_status(reservation.status, color)
        );
    }
    Ok(())
}

pub async fn handle(
    mut config: DashboardConfig,
    auth: Arc<dyn AuthProvider>,
    args: ReservationsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ReservationsCommand::List(filter) => {
            config.reservation_filter = util::reservation_filter(&filter)?;
            let mut reservations = Dashboard::oneshot(config, auth, |dashboard| async move {
                dashboard.refresh(SyncDomain::Reservations).await?;
                Ok(dashboard
                    .snapshot()
                    .reservations()
                    .cloned()
                    .collect::<Vec<_>>())
            })
            .await?;
            reservations.sort_by_key(|r| (r.date, r.time, r.id));
            print_list(&reservations, global)
        }

        ReservationsCommand::Upcoming { limit } => {
            config.reservation_filter =
                ReservationFilter::any().with_date(Some(Local::now().date_naive()));
            config.preview_len = limit;
            let upcoming = Dashboard::oneshot(config, auth, |dashboard| async move {
                dashboard.refresh(SyncDomain::Reservations).await?;
                Ok(dashboard.aggregates().upcoming)
            })
            .await?;
            print_list(&upcoming, global)
        }

        ReservationsCommand::Update(update) => {
            let changes = changes_from_args(&update)?;
            let reservation = apply(config, auth, update.id, changes, update.force).await?;
            print_one(&reservation, global)
        }

        ReservationsCommand::Confirm { id, force } => {
            set_status(config, auth, id, ReservationStatus::Confirmed, force, global).await
        }

        ReservationsCommand::Cancel { id } => {
            set_status(config, auth, id, ReservationStatus::Cancelled, false, global).await
        }

        ReservationsCommand::Complete { id } => {
            set_status(config, auth, id, ReservationStatus::Completed, false, global).await
        }

        ReservationsCommand::Delete { id } => {
            if !util::confirm(
                &format!("Delete reservation {id}? This cannot be undone."),
                "reservations delete",
                global.yes,
            )? {
                return Ok(());
            }
            Dashboard::oneshot(config, auth, move |dashboard| async move {
                dashboard.delete_reservation(ReservationId(id)).await
            })
            .await?;
            if !global.quiet {
                eprintln!("Reservation {id} deleted");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(id: i64) -> UpdateReservationArgs {
        UpdateReservationArgs {
            id,
            first_name: None,
            last_name: None,
            email: None,
            phone: None,
            party_size: None,
            date: None,
            time: None,
            table: None,
            unassign: false,
            status: None,
            force: false,
        }
    }

    #[test]
    fn update_needs_at_least_one_field() {
        assert!(matches!(
            changes_from_args(&args(1)),
            Err(CliError::Validation { .. })
        ));
    }

    #[test]
    fn unassign_clears_the_table() {
        let mut a = args(1);
        a.unassign = true;
        assert_eq!(changes_from_args(&a).unwrap().table, Some(None));

        let mut a = args(1);
        a.table = Some(7);
        a.time = Some("20:15".into());
        let changes = changes_from_args(&a).unwrap();
        assert_eq!(changes.table, Some(Some(TableId(7))));
        assert_eq!(changes.time, chrono::NaiveTime::from_hms_opt(20, 15, 0));
    }

    #[test]
    fn zero_guests_is_rejected() {
        let mut a = args(1);
        a.party_size = Some(0);
        assert!(changes_from_args(&a).is_err());
    }
}
