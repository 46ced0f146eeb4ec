use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::columns::ColumnKind;

#[derive(Debug, Parser)]
#[command(author, version, about = "Build and maintain team picklists from scouting CSV exports", long_about = None)]
pub struct Cli {
    /// Directory holding session state, computed columns, and saved picklists
    #[arg(long = "state-dir", global = true, default_value = ".thunderpick")]
    pub state_dir: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a full team CSV and start a new picklist session
    Ingest(IngestArgs),
    /// Merge a metrics-update CSV into the current session
    Update(UpdateArgs),
    /// Manage user-defined computed columns
    #[command(subcommand)]
    Column(ColumnCommands),
    /// Sort by a column header; repeating the active column toggles direction
    Sort(SortArgs),
    /// Move a row to a new position in the current order
    Move(MoveArgs),
    /// Set a team's picklist order directly
    SetOrder(SetOrderArgs),
    /// Mark a team out of consideration
    Deactivate(TeamArgs),
    /// Return a deactivated team to consideration
    Activate(TeamArgs),
    /// Show per-column min/max statistics and the current best pick
    Stats,
    /// Render the current picklist table
    Show(ShowArgs),
    /// Save the current session as a named picklist
    Save(NameArgs),
    /// Load a saved picklist into the session
    Load(NameArgs),
    /// List saved picklists
    Picklists,
    /// Delete a saved picklist
    Delete(NameArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Input CSV file ('-' for stdin); must include a Team Number column
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Render the resulting table after ingestion
    #[arg(long)]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Metrics-update CSV file ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum ColumnCommands {
    /// Validate and add a computed column (re-using a name overwrites it)
    Add(ColumnAddArgs),
    /// Remove a computed column and its values
    Remove(NameArgs),
    /// List computed-column definitions
    List,
}

#[derive(Debug, Args)]
pub struct ColumnAddArgs {
    /// Column name shown in the table
    #[arg(short, long)]
    pub name: String,
    /// Expression over existing columns, e.g. "0.4 * Auto EPA + 0.6 * Teleop EPA"
    #[arg(short, long)]
    pub formula: String,
    /// numeric formulas produce numbers, boolean conditions produce true/false
    #[arg(short, long, value_enum, default_value_t = ColumnKindArg::Numeric)]
    pub kind: ColumnKindArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColumnKindArg {
    Numeric,
    Boolean,
}

impl From<ColumnKindArg> for ColumnKind {
    fn from(kind: ColumnKindArg) -> Self {
        match kind {
            ColumnKindArg::Numeric => ColumnKind::Numeric,
            ColumnKindArg::Boolean => ColumnKind::Boolean,
        }
    }
}

#[derive(Debug, Args)]
pub struct SortArgs {
    /// Column header to sort by
    #[arg(short, long)]
    pub column: String,
}

#[derive(Debug, Args)]
pub struct MoveArgs {
    /// Current 0-based row index
    #[arg(long)]
    pub from: usize,
    /// Destination 0-based row index
    #[arg(long)]
    pub to: usize,
}

#[derive(Debug, Args)]
pub struct SetOrderArgs {
    /// Team number to edit
    #[arg(short, long)]
    pub team: i64,
    /// New picklist order value
    #[arg(short, long)]
    pub order: i64,
}

#[derive(Debug, Args)]
pub struct TeamArgs {
    /// Team number
    #[arg(short, long)]
    pub team: i64,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Maximum number of rows to render
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct NameArgs {
    /// Picklist or column name
    #[arg(short, long)]
    pub name: String,
}
