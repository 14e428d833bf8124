// 🖥️ spend-persona CLI
//
//   import   CSV files → SQLite (duplicates skipped and counted)
//   signals  both signal bundles for a user, as flat JSON
//   assign   persona assignment for both windows (may repair records)
//   history  stored persona history and transitions

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::info;

use spend_persona::config::{parse_date, AppConfig};
use spend_persona::features::window::date_to_utc;
use spend_persona::ingest::{load_accounts, load_liabilities, load_transactions};
use spend_persona::{
    build_signal_bundles, get_persona_changes, get_persona_history, import_records,
    load_snapshot, logging, PersonaAssigner, SqliteStore, WINDOW_LONG_DAYS, WINDOW_SHORT_DAYS,
};

#[derive(Debug, Parser)]
#[command(name = "spend-persona", version, about = "Behavioral signals and persona assignment over financial records")]
struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    /// TOML configuration file
    #[arg(long, env = "SPEND_PERSONA_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides config and SPEND_PERSONA_DB)
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load accounts, transactions and liabilities from CSV
    Import {
        #[arg(long)]
        accounts: PathBuf,
        #[arg(long)]
        transactions: PathBuf,
        #[arg(long)]
        liabilities: Option<PathBuf>,
    },

    /// Print the 30 and 180 day signal bundles
    Signals {
        user_id: String,
        /// Reference date, YYYY-MM-DD
        #[arg(long)]
        as_of: Option<String>,
        /// Human-readable summary instead of JSON
        #[arg(long)]
        summary: bool,
    },

    /// Assign personas for both windows
    Assign {
        user_id: String,
        /// Reference date, YYYY-MM-DD
        #[arg(long)]
        as_of: Option<String>,
        /// Do not write persona history
        #[arg(long)]
        no_history: bool,
    },

    /// Show persona history, newest first
    History {
        user_id: String,
        /// 30 or 180; both when absent
        #[arg(long)]
        window: Option<u32>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }

    logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let store = Arc::new(
        SqliteStore::open(Path::new(&config.database.path))
            .with_context(|| format!("Failed to open database {}", config.database.path))?,
    );

    match cli.command {
        Commands::Import {
            accounts,
            transactions,
            liabilities,
        } => run_import(&store, &accounts, &transactions, liabilities.as_deref()),
        Commands::Signals {
            user_id,
            as_of,
            summary,
        } => run_signals(&store, &config, &user_id, as_of.as_deref(), summary),
        Commands::Assign {
            user_id,
            as_of,
            no_history,
        } => run_assign(store, &config, &user_id, as_of.as_deref(), !no_history),
        Commands::History {
            user_id,
            window,
            limit,
        } => run_history(&store, &user_id, window, limit),
    }
}

/// --as-of, then assignment.as_of from config, then now
fn reference_time(config: &AppConfig, cli_as_of: Option<&str>) -> Result<DateTime<Utc>> {
    if let Some(value) = cli_as_of {
        return Ok(date_to_utc(parse_date(value)?));
    }
    Ok(config
        .assignment
        .as_of_date()?
        .map(date_to_utc)
        .unwrap_or_else(Utc::now))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_import(
    store: &SqliteStore,
    accounts_path: &Path,
    transactions_path: &Path,
    liabilities_path: Option<&Path>,
) -> Result<()> {
    let accounts = load_accounts(accounts_path)?;
    let transactions = load_transactions(transactions_path)?;
    let liabilities = match liabilities_path {
        Some(path) => load_liabilities(path)?,
        None => Vec::new(),
    };
    info!(
        accounts = accounts.len(),
        transactions = transactions.len(),
        liabilities = liabilities.len(),
        "CSV files loaded"
    );

    let summary = import_records(store, &accounts, &transactions, &liabilities)?;
    print_json(&serde_json::to_value(summary)?)
}

fn run_signals(
    store: &SqliteStore,
    config: &AppConfig,
    user_id: &str,
    as_of: Option<&str>,
    summary: bool,
) -> Result<()> {
    let as_of = reference_time(config, as_of)?;
    let snapshot = load_snapshot(store, user_id)?;
    let (short, long) = build_signal_bundles(&snapshot, as_of);

    if summary {
        println!("{}\n\n{}", short.summary(), long.summary());
        return Ok(());
    }

    let mut bundles = serde_json::Map::new();
    for bundle in [&short, &long] {
        bundles.insert(
            bundle.window_days.to_string(),
            Value::Object(bundle.to_flat_map().into_iter().collect()),
        );
    }

    print_json(&json!({
        "user_id": user_id,
        "as_of": as_of,
        "bundles": bundles,
    }))
}

fn run_assign(
    store: Arc<SqliteStore>,
    config: &AppConfig,
    user_id: &str,
    as_of: Option<&str>,
    save_history: bool,
) -> Result<()> {
    let as_of = reference_time(config, as_of)?;
    let save_history = save_history && config.assignment.save_history;

    let assigner = PersonaAssigner::over_store(store);
    let assignments = assigner.assign_personas(user_id, as_of, save_history)?;

    let rendered: Vec<Value> = assignments
        .iter()
        .map(|a| Value::Object(a.to_map().into_iter().collect()))
        .collect();
    print_json(&Value::Array(rendered))
}

fn run_history(
    store: &SqliteStore,
    user_id: &str,
    window_days: Option<u32>,
    limit: Option<usize>,
) -> Result<()> {
    let history = get_persona_history(store, user_id, window_days, limit)?;

    let windows = match window_days {
        Some(days) => vec![days],
        None => vec![WINDOW_SHORT_DAYS, WINDOW_LONG_DAYS],
    };
    let mut changes = serde_json::Map::new();
    for days in windows {
        let transitions = get_persona_changes(store, user_id, days)?;
        changes.insert(days.to_string(), serde_json::to_value(transitions)?);
    }

    print_json(&json!({
        "user_id": user_id,
        "history": history,
        "changes": changes,
    }))
}
