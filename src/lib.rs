pub mod catalog;
pub mod cli;
pub mod columns;
pub mod data;
pub mod error;
pub mod formula;
pub mod ingest;
pub mod io_utils;
pub mod merge;
pub mod order;
pub mod session;
pub mod stats;
pub mod store;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::cli::{Cli, ColumnCommands, Commands};
use crate::columns::{ComputedColumn, ComputedColumns};
use crate::session::{Session, SessionState};
use crate::store::{JsonStore, SavedPicklist, StateStore};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("thunderpick", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let store = JsonStore::new(&cli.state_dir);
    match cli.command {
        Commands::Ingest(args) => handle_ingest(&store, &args),
        Commands::Update(args) => handle_update(&store, &args),
        Commands::Column(command) => handle_column(&store, &command),
        Commands::Sort(args) => handle_sort(&store, &args),
        Commands::Move(args) => handle_move(&store, &args),
        Commands::SetOrder(args) => handle_set_order(&store, &args),
        Commands::Deactivate(args) => handle_deactivate(&store, &args),
        Commands::Activate(args) => handle_activate(&store, &args),
        Commands::Stats => handle_stats(&store),
        Commands::Show(args) => handle_show(&store, &args),
        Commands::Save(args) => handle_save(&store, &args),
        Commands::Load(args) => handle_load(&store, &args),
        Commands::Picklists => handle_picklists(&store),
        Commands::Delete(args) => handle_delete(&store, &args),
    }
}

fn load_session(store: &JsonStore) -> Result<Session> {
    let columns = store.load_columns()?;
    let state = store
        .load_session()?
        .context("No active session; run `thunderpick ingest` first")?;
    Ok(Session::from_state(state, columns))
}

/// Persistence is best-effort: a failed write is reported, never fatal.
/// The in-memory result of the operation has already been shown.
fn persist_session(store: &JsonStore, session: &Session) {
    if let Err(err) = store.save_session(&session.to_state()) {
        warn!("Failed to persist session state: {err}");
    }
}

fn persist_columns(store: &JsonStore, columns: &[ComputedColumn]) {
    if let Err(err) = store.save_columns(columns) {
        warn!("Failed to persist computed columns: {err}");
    }
}

fn handle_ingest(store: &JsonStore, args: &cli::IngestArgs) -> Result<()> {
    let text = io_utils::read_input(&args.input)?;
    let columns = match store.load_columns() {
        Ok(columns) => columns,
        Err(err) => {
            warn!("Failed to load computed columns: {err}");
            Vec::new()
        }
    };
    let session = Session::ingest(&text, ComputedColumns::new(columns))?;
    if session.rows().is_empty() {
        bail!("No valid data found in CSV file");
    }
    info!(
        "Ingested {} team(s) across {} field(s)",
        session.rows().len(),
        session.catalog().fields().len()
    );
    persist_session(store, &session);
    if args.table {
        print!(
            "{}",
            table::render_picklist(session.rows(), session.catalog(), None)
        );
    }
    Ok(())
}

fn handle_update(store: &JsonStore, args: &cli::UpdateArgs) -> Result<()> {
    let text = io_utils::read_input(&args.input)?;
    let mut session = load_session(store)?;
    let matched = session.merge_update(&text)?;
    info!(
        "Updated metrics for {matched} of {} team(s)",
        session.rows().len()
    );
    persist_session(store, &session);
    Ok(())
}

fn handle_column(store: &JsonStore, command: &ColumnCommands) -> Result<()> {
    match command {
        ColumnCommands::Add(args) => {
            let mut session = load_session(store)?;
            session.add_column(ComputedColumn {
                name: args.name.clone(),
                formula: args.formula.clone(),
                kind: args.kind.into(),
            })?;
            info!("Computed column \"{}\" added successfully!", args.name.trim());
            persist_columns(store, session.columns().definitions());
            persist_session(store, &session);
            Ok(())
        }
        ColumnCommands::Remove(args) => {
            let mut session = load_session(store)?;
            session.remove_column(&args.name)?;
            info!("Removed computed column \"{}\"", args.name);
            persist_columns(store, session.columns().definitions());
            persist_session(store, &session);
            Ok(())
        }
        ColumnCommands::List => {
            let columns = store.load_columns()?;
            let headers = vec![
                "name".to_string(),
                "type".to_string(),
                "formula".to_string(),
            ];
            let rows: Vec<Vec<String>> = columns
                .iter()
                .map(|c| {
                    vec![
                        c.name.clone(),
                        format!("{:?}", c.kind).to_lowercase(),
                        c.formula.clone(),
                    ]
                })
                .collect();
            print!("{}", table::render_table(&headers, &rows));
            Ok(())
        }
    }
}

fn handle_sort(store: &JsonStore, args: &cli::SortArgs) -> Result<()> {
    let mut session = load_session(store)?;
    session.sort_requested(&args.column)?;
    info!(
        "Sorted by '{}' ({:?})",
        session.order().sort_column(),
        session.order().direction()
    );
    persist_session(store, &session);
    Ok(())
}

fn handle_move(store: &JsonStore, args: &cli::MoveArgs) -> Result<()> {
    let mut session = load_session(store)?;
    session.row_dragged(args.from, args.to)?;
    info!("Moved row {} to position {}", args.from, args.to);
    persist_session(store, &session);
    Ok(())
}

fn handle_set_order(store: &JsonStore, args: &cli::SetOrderArgs) -> Result<()> {
    let mut session = load_session(store)?;
    session.order_edited(args.team, args.order)?;
    info!("Set team {} picklist order to {}", args.team, args.order);
    persist_session(store, &session);
    Ok(())
}

fn handle_deactivate(store: &JsonStore, args: &cli::TeamArgs) -> Result<()> {
    let mut session = load_session(store)?;
    session.deactivate(args.team)?;
    info!("Deactivated team {}", args.team);
    persist_session(store, &session);
    Ok(())
}

fn handle_activate(store: &JsonStore, args: &cli::TeamArgs) -> Result<()> {
    let mut session = load_session(store)?;
    session.activate(args.team)?;
    info!("Reactivated team {}", args.team);
    persist_session(store, &session);
    Ok(())
}

fn handle_stats(store: &JsonStore) -> Result<()> {
    let session = load_session(store)?;
    let ranges = session.ranges();
    let headers = vec!["column".to_string(), "min".to_string(), "max".to_string()];
    // catalog order, not map order
    let rows: Vec<Vec<String>> = session
        .catalog()
        .fields()
        .iter()
        .filter_map(|field| {
            ranges.get(field).map(|range| {
                vec![
                    field.clone(),
                    format_metric(range.min),
                    format_metric(range.max),
                ]
            })
        })
        .collect();
    print!("{}", table::render_table(&headers, &rows));
    if let Some(best) = session.best_pick() {
        info!(
            "Best pick: team {} (picklist order {})",
            best.team_number, best.picklist_order
        );
    }
    Ok(())
}

fn format_metric(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

fn handle_show(store: &JsonStore, args: &cli::ShowArgs) -> Result<()> {
    let session = load_session(store)?;
    print!(
        "{}",
        table::render_picklist(session.rows(), session.catalog(), args.limit)
    );
    Ok(())
}

fn handle_save(store: &JsonStore, args: &cli::NameArgs) -> Result<()> {
    let session = load_session(store)?;
    let state = session.to_state();
    store.save_picklist(SavedPicklist {
        name: args.name.clone(),
        data: state.csv_data,
        fields: state.csv_fields,
        sort_order: state.sort_order,
        sort_direction: state.sort_direction,
        timestamp: store::timestamp_ms(),
        computed_columns: Some(session.columns().definitions().to_vec()),
    })?;
    info!("Picklist \"{}\" saved successfully!", args.name);
    Ok(())
}

fn handle_load(store: &JsonStore, args: &cli::NameArgs) -> Result<()> {
    let picklists = store.load_picklists()?;
    let record = picklists
        .into_iter()
        .find(|p| p.name == args.name)
        .with_context(|| format!("No saved picklist named '{}'", args.name))?;

    let columns = match record.computed_columns {
        Some(columns) => {
            persist_columns(store, &columns);
            columns
        }
        None => store.load_columns()?,
    };
    let state = SessionState {
        csv_data: record.data,
        csv_fields: record.fields,
        sort_order: record.sort_order,
        sort_direction: record.sort_direction,
        show_table: true,
    };
    let session = Session::from_state(state, columns);
    persist_session(store, &session);
    info!("Loaded picklist \"{}\"", args.name);
    Ok(())
}

fn handle_picklists(store: &JsonStore) -> Result<()> {
    let picklists = store.load_picklists()?;
    let headers = vec![
        "name".to_string(),
        "teams".to_string(),
        "saved".to_string(),
    ];
    let rows: Vec<Vec<String>> = picklists
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.data.len().to_string(),
                format_timestamp(p.timestamp),
            ]
        })
        .collect();
    print!("{}", table::render_table(&headers, &rows));
    Ok(())
}

fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%b %d %H:%M").to_string())
        .unwrap_or_default()
}

fn handle_delete(store: &JsonStore, args: &cli::NameArgs) -> Result<()> {
    if !store.delete_picklist(&args.name)? {
        bail!("No saved picklist named '{}'", args.name);
    }
    info!("Deleted picklist \"{}\"", args.name);
    Ok(())
}
