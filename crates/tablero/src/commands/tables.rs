//! Table command handlers.

use std::sync::Arc;

use tabled::Tabled;

use tablero_core::{
    AuthProvider, CoreError, Dashboard, DashboardConfig, SyncDomain, Table, TableId, TableStatus,
};

use crate::cli::{GlobalOpts, TablesArgs, TablesCommand};
use crate::error::CliError;
use crate::output;

use super::util::or_dash;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Number")]
    number: i64,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Seats")]
    seats: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Guests")]
    occupants: String,
}

impl From<&Arc<Table>> for TableRow {
    fn from(t: &Arc<Table>) -> Self {
        Self {
            id: t.id.get(),
            number: t.number,
            kind: t
                .table_type
                .as_ref()
                .and_then(|tt| tt.description.clone())
                .unwrap_or_default(),
            seats: or_dash(t.seats()),
            status: t.status.to_string(),
            occupants: or_dash(t.occupants),
        }
    }
}

fn detail(t: &Arc<Table>, color: bool) -> String {
    [
        format!("ID:      {}", t.id),
        format!("Number:  {}", t.number),
        format!(
            "Type:    {}",
            or_dash(t.table_type.as_ref().and_then(|tt| tt.description.clone()))
        ),
        format!("Seats:   {}", or_dash(t.seats())),
        format!("Status:  {}", output::table_status(t.status, color)),
        format!("Guests:  {}", or_dash(t.occupants)),
        format!("Rev:     {}", t.revision.get()),
    ]
    .join("\n")
}

async fn fetch_tables(
    config: DashboardConfig,
    auth: Arc<dyn AuthProvider>,
) -> Result<Vec<Arc<Table>>, CoreError> {
    Dashboard::oneshot(config, auth, |dashboard| async move {
        dashboard.refresh(SyncDomain::Tables).await?;
        Ok(dashboard.snapshot().tables().cloned().collect())
    })
    .await
}

pub async fn handle(
    config: DashboardConfig,
    auth: Arc<dyn AuthProvider>,
    args: TablesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    match args.command {
        TablesCommand::List { status } => {
            let wanted: Option<TableStatus> = status.map(Into::into);
            let tables: Vec<Arc<Table>> = fetch_tables(config, auth)
                .await?
                .into_iter()
                .filter(|t| wanted.is_none_or(|s| t.status == s))
                .collect();
            let out = output::render_list(
                global.output,
                &tables,
                |t| TableRow::from(t),
                |t| t.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        TablesCommand::Get { id } => {
            let tables = fetch_tables(config, auth).await?;
            let table = tables
                .iter()
                .find(|t| t.id == TableId(id))
                .ok_or_else(|| CliError::NotFound {
                    resource_type: "table".into(),
                    identifier: id.to_string(),
                    list_command: "tables list".into(),
                })?;
            let out = output::render_single(
                global.output,
                table,
                |t| detail(t, color),
                |t| t.status.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        TablesCommand::SetStatus { id, status } => {
            let status: TableStatus = status.into();
            let table = Dashboard::oneshot(config, auth, move |dashboard| async move {
                dashboard.set_table_status(TableId(id), status).await
            })
            .await?;
            if !global.quiet {
                eprintln!(
                    "Table {} is now {}",
                    table.number,
                    output::table_status(table.status, color)
                );
            }
            let out = output::render_single(
                global.output,
                &table,
                |t| detail(t, color),
                |t| t.status.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
