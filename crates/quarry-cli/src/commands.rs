//! Subcommands.
//!
//! Each command runs against an open [`Engine`] and returns the text to
//! print, so the whole flow is testable without a terminal.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use quarry_sql::{Engine, ParsedQuery};

use crate::config::CliConfig;
use crate::formatter;

/// A `quarry` subcommand.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a table, e.g. `create users "id:int, name:string"`
    Create {
        /// Table name
        table: String,
        /// Comma-separated `name:type` pairs (int, float, string)
        definition: String,
    },

    /// Load a `|`-delimited text file into a table, replacing its rows
    Load {
        /// Table name
        table: String,
        /// Text file, one tuple per line
        file: PathBuf,
    },

    /// Build a B+-tree index on an integer attribute
    Index {
        /// Table name
        table: String,
        /// Attribute name
        attribute: String,
    },

    /// Compile and run a query, writing results to the output file
    Query {
        /// SQL text
        #[arg(required_unless_present = "json")]
        sql: Option<String>,

        /// Read a JSON-encoded parsed query instead of SQL
        #[arg(long, value_name = "FILE", conflicts_with = "sql")]
        json: Option<PathBuf>,

        /// Print the operator tree without executing it
        #[arg(long)]
        explain_only: bool,
    },

    /// List tables
    Tables,

    /// Show a table's attributes and statistics
    Describe {
        /// Table name
        table: String,
    },

    /// List indexes
    Indexes,
}

impl Command {
    /// Executes the command and returns its printable output.
    pub fn execute(&self, engine: &Engine, config: &CliConfig) -> Result<String> {
        match self {
            Command::Create { table, definition } => {
                let schema = engine.create_table(table, definition)?;
                Ok(format!("Created table {table} {schema}"))
            }

            Command::Load { table, file } => {
                let stats = engine
                    .load_table(table, file)
                    .with_context(|| format!("loading {} into {table}", file.display()))?;
                let entry = engine.catalog().table(table)?;
                Ok(formatter::format_load(table, &entry.schema, &stats))
            }

            Command::Index { table, attribute } => {
                let index = engine.build_index(table, attribute)?;
                Ok(format!(
                    "Built index on {table}.{attribute}: {} entries, {} pages, root {} ({})",
                    index.entry_count(),
                    index.page_count(),
                    index.root(),
                    index.path().display()
                ))
            }

            Command::Query {
                sql,
                json,
                explain_only,
            } => {
                let query = read_query(sql.as_deref(), json.as_deref())?;
                if *explain_only {
                    let plan = engine.compile_query(&query)?;
                    return Ok(plan.to_string().trim_end().to_string());
                }
                let outcome = engine.run_query(&query)?;
                let preview = read_preview(&outcome.output, config.preview_rows)?;
                let summary = formatter::format_outcome(&outcome, &preview, config.timing);
                if config.show_plan {
                    Ok(format!("{}\n{summary}", outcome.plan))
                } else {
                    Ok(summary)
                }
            }

            Command::Tables => {
                let catalog = engine.catalog();
                let entries = catalog
                    .tables()
                    .iter()
                    .map(|name| catalog.table(name))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(formatter::format_tables(&entries))
            }

            Command::Describe { table } => {
                let entry = engine.catalog().table(table)?;
                let indexed: Vec<String> = engine
                    .catalog()
                    .indexes()
                    .into_iter()
                    .filter(|i| &i.table == table)
                    .map(|i| i.attribute)
                    .collect();
                Ok(formatter::format_schema(&entry, &indexed))
            }

            Command::Indexes => Ok(formatter::format_indexes(&engine.catalog().indexes())),
        }
    }
}

fn read_query(sql: Option<&str>, json: Option<&Path>) -> Result<ParsedQuery> {
    match (sql, json) {
        (_, Some(path)) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("decoding query from {}", path.display()))
        }
        (Some(sql), None) => Ok(quarry_sql::Parser::parse_query(sql)?),
        (None, None) => anyhow::bail!("no query given"),
    }
}

/// First `limit` non-blank lines of the output file.
fn read_preview(path: &Path, limit: usize) -> Result<Vec<String>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        lines.push(line);
        if lines.len() == limit {
            break;
        }
    }
    Ok(lines)
}
