//! Quarry command-line interface
//!
//! Creates and loads tables, builds indexes, and runs queries against a
//! local data directory. Without a subcommand it starts an interactive
//! shell.
//!
//! # Usage
//!
//! ```bash
//! quarry -d ./data
//! quarry create users "id:int, name:string, age:int"
//! quarry load users users.tbl
//! quarry index users id
//! quarry --hash-joins query "SELECT name FROM users WHERE id = 7"
//! quarry query --explain-only "SELECT SUM(age) FROM users"
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod formatter;
mod repl;

use commands::Command;
use config::CliConfig;
use repl::Repl;
use quarry_sql::Engine;

/// Quarry command-line interface
#[derive(Parser, Debug)]
#[command(
    name = "quarry",
    author = "Quarry Contributors",
    version,
    about = "Single-node relational query engine",
    long_about = "Creates and loads tables, builds B+-tree indexes, and compiles and runs\n\
                  single-block SELECT queries over heap files in a local data directory."
)]
struct Args {
    /// Directory holding heap, index, and catalog files
    #[arg(short = 'd', long, global = true, env = "QUARRY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Catalog file (relative paths resolve against the data directory)
    #[arg(long, global = true, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// File query results are written to
    #[arg(short = 'o', long, global = true, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Allow hash joins for equality join predicates
    #[arg(long, global = true)]
    hash_joins: bool,

    /// Allow symmetric hash joins (implies --hash-joins)
    #[arg(long, global = true)]
    symmetric_hash_joins: bool,

    /// Print elapsed time after queries
    #[arg(long, global = true)]
    timing: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Subcommand; the interactive shell starts when none is given
    #[command(subcommand)]
    command: Option<Command>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let config = load_config(&args)?;
    info!(data_dir = %config.engine.data_dir.display(), "starting");

    let engine = Engine::open(config.engine.clone())?;
    match &args.command {
        Some(command) => {
            let output = command.execute(&engine, &config)?;
            println!("{output}");
        }
        None => {
            let mut repl = Repl::new(&engine, &config)?;
            repl.print_banner();
            repl.run()?;
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("quarry_cli=debug,quarry_sql=debug,quarry_storage=debug")
    } else {
        EnvFilter::new("quarry_cli=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn load_config(args: &Args) -> Result<CliConfig> {
    let mut config = if let Some(path) = &args.config {
        CliConfig::from_file(path)?
    } else {
        CliConfig::load_default()?
    };
    apply_overrides(&mut config, args);
    config.engine.validate()?;
    Ok(config)
}

/// Command-line flags win over file values.
fn apply_overrides(config: &mut CliConfig, args: &Args) {
    if let Some(dir) = &args.data_dir {
        config.engine.data_dir = dir.clone();
    }
    if let Some(catalog) = &args.catalog {
        config.engine.catalog_path = catalog.clone();
    }
    if let Some(output) = &args.output {
        config.engine.output_path = output.clone();
    }
    if args.hash_joins || args.symmetric_hash_joins {
        config.engine.planner.allow_hash_join = true;
    }
    if args.symmetric_hash_joins {
        config.engine.planner.allow_symmetric_hash_join = true;
    }
    if args.timing {
        config.timing = true;
    }
}
