//! Clap derive structures for the `tablero` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Kept
//! free of workspace types so `build.rs` can compile it for man pages.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tablero -- live floor and reservation dashboard
#[derive(Debug, Parser)]
#[command(
    name = "tablero",
    version,
    about = "Watch and manage restaurant tables and reservations from the command line",
    long_about = "A command-line dashboard for a restaurant reservation server.\n\n\
        Lists tables and reservations, changes their status, and follows\n\
        the floor live over the server's event stream.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "TABLERO_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API root URL, e.g. http://localhost:8000/api/v1/ (overrides profile)
    #[arg(long, short = 's', env = "TABLERO_SERVER", global = true)]
    pub server: Option<String>,

    /// Bearer token
    #[arg(long, env = "TABLERO_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TABLERO_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "TABLERO_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "TABLERO_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Domain value enums ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableStatusArg {
    #[value(alias = "disponible")]
    Available,
    #[value(alias = "ocupada")]
    Occupied,
    #[value(alias = "reservada")]
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReservationStatusArg {
    #[value(alias = "pendiente")]
    Pending,
    #[value(alias = "confirmada")]
    Confirmed,
    #[value(alias = "cancelada")]
    Cancelled,
    #[value(alias = "completada")]
    Completed,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List tables and change their status
    #[command(alias = "t")]
    Tables(TablesArgs),

    /// List, edit and delete reservations
    #[command(alias = "res", alias = "r")]
    Reservations(ReservationsArgs),

    /// Occupancy and reservation counters
    Stats(StatsArgs),

    /// Follow the floor live until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Tables ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TablesArgs {
    #[command(subcommand)]
    pub command: TablesCommand,
}

#[derive(Debug, Subcommand)]
pub enum TablesCommand {
    /// List all tables
    #[command(alias = "ls")]
    List {
        /// Only tables in this status
        #[arg(long)]
        status: Option<TableStatusArg>,
    },

    /// Show one table
    Get {
        /// Table id
        id: i64,
    },

    /// Set a table's status
    SetStatus {
        /// Table id
        id: i64,

        /// New status
        status: TableStatusArg,
    },
}

// ── Reservations ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ReservationsArgs {
    #[command(subcommand)]
    pub command: ReservationsCommand,
}

/// Server-side reservation filter.
#[derive(Debug, Args)]
pub struct ReservationFilterArgs {
    /// Only reservations in this status
    #[arg(long)]
    pub status: Option<ReservationStatusArg>,

    /// Only reservations on this date (YYYY-MM-DD or "today")
    #[arg(long, short = 'd', conflicts_with = "all_dates")]
    pub date: Option<String>,

    /// Every date instead of today's
    #[arg(long = "all-dates", short = 'a')]
    pub all_dates: bool,
}

#[derive(Debug, Subcommand)]
pub enum ReservationsCommand {
    /// List reservations (today's by default)
    #[command(alias = "ls")]
    List(ReservationFilterArgs),

    /// Today's upcoming reservations, soonest first
    Upcoming {
        /// How many to show
        #[arg(long, short = 'n', default_value = "5")]
        limit: usize,
    },

    /// Edit reservation fields
    Update(UpdateReservationArgs),

    /// Mark a reservation as confirmed
    Confirm {
        /// Reservation id
        id: i64,

        /// Allow leaving a cancelled status
        #[arg(long)]
        force: bool,
    },

    /// Mark a reservation as cancelled
    Cancel {
        /// Reservation id
        id: i64,
    },

    /// Mark a reservation as completed (final)
    Complete {
        /// Reservation id
        id: i64,
    },

    /// Delete a reservation
    #[command(alias = "rm")]
    Delete {
        /// Reservation id
        id: i64,
    },
}

#[derive(Debug, Args)]
pub struct UpdateReservationArgs {
    /// Reservation id
    pub id: i64,

    #[arg(long)]
    pub first_name: Option<String>,

    #[arg(long)]
    pub last_name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    /// Number of guests
    #[arg(long)]
    pub party_size: Option<u32>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub date: Option<String>,

    /// HH:MM
    #[arg(long)]
    pub time: Option<String>,

    /// Assign a table by id
    #[arg(long, conflicts_with = "unassign")]
    pub table: Option<i64>,

    /// Remove the table assignment
    #[arg(long)]
    pub unassign: bool,

    #[arg(long)]
    pub status: Option<ReservationStatusArg>,

    /// Allow leaving a cancelled status
    #[arg(long)]
    pub force: bool,
}

// ── Stats ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Also fetch the server's own counters
    #[arg(long)]
    pub server: bool,
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub filter: ReservationFilterArgs,

    /// Poll only, without the event stream
    #[arg(long)]
    pub no_stream: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration
    Show,

    /// Set a value on the active profile
    Set {
        /// Profile key, e.g. "server" or "stats_poll_secs"
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a token in the system keyring
    SetToken {
        /// Profile to store it for (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
