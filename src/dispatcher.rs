//! Command dispatcher that routes parsed clap Commands to their handlers.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

use crate::cli::formatters;
use crate::cli::{Cli, Commands, TablesCommands};
use crate::config::EngineConfig;
use crate::db;
use crate::error::StoreError;
use crate::tax::reference::{ReferenceData, ReferenceTables};
use crate::tax::registry::RegimeRegistry;
use crate::tax::sink::{MemoryResultSink, ResultSink};
use crate::tax::{RegimeOrchestrator, SimulationInput};

/// Route a parsed command line to its handler
pub fn dispatch(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Init => dispatch_init(cli.db.clone(), cli.json),
        Commands::Simulate {
            input,
            months,
            tables,
            dry_run,
            export,
        } => {
            let options = SimulateOptions {
                input,
                months: *months,
                tables: tables.as_deref(),
                dry_run: *dry_run,
                export: export.as_deref(),
            };
            dispatch_simulate(cli, &options)
        }
        Commands::Results { snapshot_id } => {
            dispatch_results(cli.db.clone(), *snapshot_id, cli.json)
        }
        Commands::Tables { action } => match action {
            TablesCommands::Show { annex } => {
                dispatch_tables_show(cli.db.clone(), *annex, cli.json)
            }
        },
    }
}

struct SimulateOptions<'a> {
    input: &'a Path,
    months: u32,
    tables: Option<&'a Path>,
    dry_run: bool,
    export: Option<&'a Path>,
}

fn dispatch_init(db_path: Option<PathBuf>, json_output: bool) -> Result<()> {
    db::init_database(db_path)?;
    if json_output {
        println!(r#"{{"initialized": true}}"#);
    } else {
        println!("{} Database initialized", "✓".green().bold());
    }
    Ok(())
}

/// Read a snapshot from a JSON file
pub fn read_input(path: &Path) -> Result<SimulationInput> {
    let contents = std::fs::read_to_string(path)
        .map_err(StoreError::from)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&contents)
        .map_err(|e| StoreError::ParseError(e.to_string()))
        .with_context(|| format!("Invalid snapshot JSON in {}", path.display()))
}

fn dispatch_simulate(cli: &Cli, options: &SimulateOptions<'_>) -> Result<()> {
    let config = EngineConfig::load(cli.config.as_deref())?;
    let input = read_input(options.input)?;
    info!(
        snapshot = input.id,
        company = %input.company.name,
        "Simulating regimes"
    );

    // A dry run with its own tables never needs the database
    let conn = if options.dry_run && options.tables.is_some() {
        None
    } else {
        let conn = db::open_db(cli.db.clone())?;
        db::ensure_initialized(&conn)?;
        Some(Mutex::new(conn))
    };

    let file_tables = match options.tables {
        Some(path) => Some(ReferenceTables::from_json_file(path)?),
        None => None,
    };
    let sqlite_reference = conn.as_ref().map(db::SqliteReferenceData::new);
    let reference: &dyn ReferenceData = if let Some(tables) = &file_tables {
        tables
    } else if let Some(sqlite) = &sqlite_reference {
        sqlite
    } else {
        bail!("no reference tables available");
    };

    let memory_sink = MemoryResultSink::new();
    let sqlite_sink = conn.as_ref().map(db::SqliteResultSink::new);
    let sink: &dyn ResultSink = match (&sqlite_sink, options.dry_run) {
        (Some(sqlite), false) => sqlite,
        _ => &memory_sink,
    };

    let registry = conn.as_ref().map(db::SqliteRegimeRegistry::new);
    let mut orchestrator =
        RegimeOrchestrator::new(reference, sink, config).with_months(options.months);
    if let Some(registry) = registry.as_ref() {
        orchestrator = orchestrator.with_registry(registry as &dyn RegimeRegistry);
    }

    let outcome = orchestrator.process(&input)?;
    let comparison = orchestrator.comparison(&input, &outcome)?;

    if cli.json {
        println!("{}", formatters::format_comparison_json(&outcome, &comparison));
    } else {
        print!("{}", formatters::format_comparison_table(&comparison));
        if options.dry_run {
            println!("\n{} Dry run - results not saved", "ℹ".blue().bold());
        } else {
            println!(
                "\n{} Results stored for snapshot {}",
                "✓".green().bold(),
                outcome.snapshot_id
            );
        }
    }

    if let Some(path) = options.export {
        std::fs::write(path, formatters::comparison_to_csv(&comparison))
            .map_err(StoreError::from)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.json {
            println!("{} Comparison exported to: {}", "✓".green().bold(), path.display());
        }
    }

    Ok(())
}

fn dispatch_results(db_path: Option<PathBuf>, snapshot_id: i64, json_output: bool) -> Result<()> {
    let conn = db::open_db(db_path)?;
    db::ensure_initialized(&conn)?;

    let shared = Mutex::new(conn);
    let lines = db::SqliteResultSink::new(&shared).stored_lines(snapshot_id)?;
    if json_output {
        println!("{}", formatters::format_results_json(snapshot_id, &lines));
    } else {
        print!("{}", formatters::format_results_table(snapshot_id, &lines));
    }
    Ok(())
}

fn dispatch_tables_show(
    db_path: Option<PathBuf>,
    annex: Option<u32>,
    json_output: bool,
) -> Result<()> {
    let conn = db::open_db(db_path)?;
    db::ensure_initialized(&conn)?;

    let mut tables = db::load_reference_tables(&conn)?;
    if let Some(annex) = annex {
        tables.brackets.retain(|b| b.annex == annex);
    }

    if json_output {
        println!("{}", formatters::format_tables_json(&tables));
    } else {
        print!("{}", formatters::format_tables(&tables));
    }
    Ok(())
}
