//! Statistics command handler.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::Serialize;

use tablero_core::{
    Aggregates, AuthProvider, Dashboard, DashboardConfig, ReservationFilter, ReservationStatus,
    ServerStats, SyncDomain,
};

use crate::cli::{GlobalOpts, StatsArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct StatsView {
    #[serde(flatten)]
    local: Aggregates,
    /// The server's own counters, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<Arc<ServerStats>>,
}

fn detail(view: &StatsView, color: bool) -> String {
    let a = &view.local;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Tables:        {} total, {} available, {} occupied, {} reserved ({:.0}% in use)",
        a.tables.total,
        a.tables.available,
        a.tables.occupied,
        a.tables.reserved,
        a.tables.occupancy_pct()
    );
    let _ = writeln!(out, "Reservations:  {} total", a.reservations.total);
    for status in [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Cancelled,
        ReservationStatus::Completed,
    ] {
        let _ = writeln!(
            out,
            "  {:<22} {:>4}  ({:.1}%)",
            output::reservation_status(status, color),
            a.reservations.of(status),
            a.reservations.share(status)
        );
    }
    let _ = writeln!(
        out,
        "Today:         {} total, {} confirmed, {} pending",
        a.today.total, a.today.confirmed, a.today.pending
    );
    if a.upcoming.is_empty() {
        let _ = write!(out, "Upcoming:      none");
    } else {
        let _ = write!(out, "Upcoming:");
        for r in &a.upcoming {
            let _ = write!(
                out,
                "\n  {}  {:<24} {} guests",
                r.time.format("%H:%M"),
                r.full_name(),
                r.party_size
            );
        }
    }

    if let Some(ref s) = view.server {
        let _ = write!(
            out,
            "\n\nServer counters:\n  \
             reservations {} total, {} today, {} pending, {} confirmed today\n  \
             tables {} total, {} available, {} occupied, {} reserved",
            s.total_reservations,
            s.reservations_today,
            s.pending_reservations,
            s.confirmed_today,
            s.total_tables,
            s.available_tables,
            s.occupied_tables,
            s.reserved_tables
        );
    }
    out
}

pub async fn handle(
    mut config: DashboardConfig,
    auth: Arc<dyn AuthProvider>,
    args: &StatsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    config.reservation_filter = ReservationFilter::any();
    let with_server = args.server;

    let view = Dashboard::oneshot(config, auth, move |dashboard| async move {
        let (tables, reservations) = tokio::join!(
            dashboard.refresh(SyncDomain::Tables),
            dashboard.refresh(SyncDomain::Reservations),
        );
        tables?;
        reservations?;
        if with_server {
            dashboard.refresh(SyncDomain::Statistics).await?;
        }
        Ok(StatsView {
            local: dashboard.aggregates(),
            server: if with_server {
                dashboard.server_stats()
            } else {
                None
            },
        })
    })
    .await?;

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &view,
        |v| detail(v, color),
        |v| v.local.tables.available.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
