//! Live view: keeps a dashboard running and prints a line whenever the
//! counters move, until Ctrl-C.

use std::sync::Arc;

use tracing::debug;

use tablero_core::{
    Aggregates, AuthProvider, ConnectionState, Dashboard, DashboardConfig, IssueMap,
    ReservationCounts, TableCounts, TodayCounts,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

type Counters = (TableCounts, ReservationCounts, TodayCounts);

fn counters(a: &Aggregates) -> Counters {
    (a.tables, a.reservations, a.today)
}

fn summary_line(a: &Aggregates) -> String {
    let next = a.upcoming.first().map_or_else(String::new, |r| {
        format!(
            " | next {} {} ({})",
            r.time.format("%H:%M"),
            r.full_name(),
            r.party_size
        )
    });
    format!(
        "{} tables {}/{} free, {} occupied, {} reserved | today {} ({} confirmed, {} pending){next}",
        a.computed_at.format("%H:%M:%S"),
        a.tables.available,
        a.tables.total,
        a.tables.occupied,
        a.tables.reserved,
        a.today.total,
        a.today.confirmed,
        a.today.pending,
    )
}

fn render(format: OutputFormat, a: &Aggregates) -> Result<String, CliError> {
    match format {
        OutputFormat::Table | OutputFormat::Plain => Ok(summary_line(a)),
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(a),
        OutputFormat::Yaml => Ok(format!("---\n{}", output::render_yaml(a)?)),
    }
}

fn report_issues(issues: &IssueMap, quiet: bool) {
    if quiet {
        return;
    }
    if issues.is_empty() {
        eprintln!("sync recovered");
        return;
    }
    for issue in issues.values() {
        eprintln!("sync issue [{}] {}: {}", issue.domain, issue.kind, issue.message);
    }
}

pub async fn handle(
    mut config: DashboardConfig,
    auth: Arc<dyn AuthProvider>,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    config.reservation_filter = util::reservation_filter(&args.filter)?;
    if args.no_stream {
        config.push_enabled = false;
    }
    let color = output::should_color(global.color);

    let dashboard = Dashboard::new(config, auth)?;
    let mut aggregates = dashboard.watch_aggregates();
    let mut connection = dashboard.connection_state();
    let mut issues = dashboard.issues();

    dashboard.start().await?;

    let first = aggregates.borrow_and_update().clone();
    let mut last = counters(&first);
    output::print_output(&render(global.output, &first)?, global.quiet);
    let initial = issues.borrow_and_update().clone();
    if !initial.is_empty() {
        report_issues(&initial, global.quiet);
    }

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted, shutting down");
                break Ok(());
            }
            changed = aggregates.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = aggregates.borrow_and_update().clone();
                let now = counters(&current);
                if now != last {
                    last = now;
                    match render(global.output, &current) {
                        Ok(line) => output::print_output(&line, global.quiet),
                        Err(e) => break Err(e),
                    }
                }
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *connection.borrow_and_update();
                if !global.quiet {
                    eprintln!("stream {}", output::connection_state(state, color));
                }
                if state == ConnectionState::Offline && dashboard.is_polling_halted() {
                    break Err(CliError::AuthFailed {
                        message: "the server rejected the token".into(),
                    });
                }
            }
            changed = issues.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = issues.borrow_and_update().clone();
                report_issues(&current, global.quiet);
                if dashboard.is_polling_halted() {
                    break Err(CliError::AuthFailed {
                        message: "the server rejected the token".into(),
                    });
                }
            }
        }
    };

    dashboard.dispose().await;
    result
}
