//! Interactive shell.
//!
//! Reads one statement per line at a `db> ` prompt, with history and line
//! editing. Shell words (`help`, `schema`, `index`, ...) and
//! `CREATE INDEX` map onto [`Command`]s; any other line is compiled and run
//! as a query. Errors are printed and the shell keeps going.

use std::path::PathBuf;

use anyhow::{bail, Result};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, EditMode, Editor, Helper};
use tracing::{debug, error};

use quarry_sql::Engine;

use crate::commands::Command;
use crate::config::CliConfig;

/// The prompt shown when waiting for input.
const PROMPT: &str = "db> ";

const HELP: &str = "\
Commands:
  help                           show this message
  exit | quit                    leave the shell
  tables                         list tables
  schema [table]                 show one table, or every table
  index                          list indexes
  index <table> <attribute>      build an index
  CREATE INDEX [name] ON t(a)    build an index
  create <table> <definition>    create a table, e.g. create t a:int, b:string
  load <table> <file>            load a |-delimited text file
  explain <query>                print a query's operator tree
  SELECT ...                     run a query; results go to the output file";

const KEYWORDS: &[&str] = &[
    "SELECT", "DISTINCT", "SUM", "FROM", "WHERE", "AND", "GROUP", "BY", "CREATE", "INDEX", "ON",
    "help", "exit", "quit", "tables", "schema", "index", "create", "load", "explain",
];

/// What one line of input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Print the command summary.
    Help,
    /// Leave the shell.
    Exit,
    /// Describe every table.
    SchemaAll,
    /// Run a CLI command.
    Run(Command),
}

/// Result of processing a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineResult {
    /// Print this and read the next line.
    Output(String),
    /// Nothing to print.
    Continue,
    /// Stop reading.
    Exit,
}

/// Parses one line. Blank lines yield `None`; a trailing `;` is ignored.
pub fn parse_line(line: &str) -> Result<Option<Action>> {
    let line = line.trim().trim_end_matches(';').trim_end();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = split_word(line);
    let args: Vec<&str> = rest.split_whitespace().collect();

    let action = match word.to_ascii_lowercase().as_str() {
        "exit" | "quit" if args.is_empty() => Action::Exit,
        "help" | "?" if args.is_empty() => Action::Help,
        "tables" if args.is_empty() => Action::Run(Command::Tables),
        "indexes" if args.is_empty() => Action::Run(Command::Indexes),
        "schema" => match args.as_slice() {
            [] => Action::SchemaAll,
            [table] => Action::Run(Command::Describe {
                table: (*table).to_string(),
            }),
            _ => bail!("usage: schema [table]"),
        },
        "index" => match args.as_slice() {
            [] => Action::Run(Command::Indexes),
            [table, attribute] => Action::Run(Command::Index {
                table: (*table).to_string(),
                attribute: (*attribute).to_string(),
            }),
            _ => bail!("usage: index [<table> <attribute>]"),
        },
        "load" => match args.as_slice() {
            [table, file] => Action::Run(Command::Load {
                table: (*table).to_string(),
                file: PathBuf::from(*file),
            }),
            _ => bail!("usage: load <table> <file>"),
        },
        "explain" if !rest.is_empty() => Action::Run(Command::Query {
            sql: Some(rest.to_string()),
            json: None,
            explain_only: true,
        }),
        "create" => {
            let (kind, tail) = split_word(rest);
            if kind.eq_ignore_ascii_case("index") {
                parse_create_index(tail)?
            } else {
                let (table, definition) = split_word(rest);
                if table.is_empty() || definition.is_empty() {
                    bail!("usage: create <table> <definition>");
                }
                Action::Run(Command::Create {
                    table: table.to_string(),
                    definition: definition.to_string(),
                })
            }
        }
        _ => Action::Run(Command::Query {
            sql: Some(line.to_string()),
            json: None,
            explain_only: false,
        }),
    };
    Ok(Some(action))
}

/// Parses the part of `CREATE INDEX [name] ON table(attribute)` after
/// `INDEX`. The index name is accepted and ignored.
fn parse_create_index(text: &str) -> Result<Action> {
    const USAGE: &str = "usage: CREATE INDEX [name] ON table(attribute)";

    let (first, rest) = split_word(text);
    let target = if first.eq_ignore_ascii_case("on") {
        rest
    } else {
        let (on, rest) = split_word(rest);
        if !on.eq_ignore_ascii_case("on") {
            bail!(USAGE);
        }
        rest
    };
    let Some((table, tail)) = target.split_once('(') else {
        bail!(USAGE);
    };
    let Some((attribute, after)) = tail.split_once(')') else {
        bail!(USAGE);
    };
    let (table, attribute) = (table.trim(), attribute.trim());
    if table.is_empty()
        || attribute.is_empty()
        || attribute.contains(',')
        || !after.trim().is_empty()
    {
        bail!(USAGE);
    }
    Ok(Action::Run(Command::Index {
        table: table.to_string(),
        attribute: attribute.to_string(),
    }))
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

/// Parses and runs one line against `engine`.
pub fn execute_line(engine: &Engine, config: &CliConfig, line: &str) -> Result<LineResult> {
    let Some(action) = parse_line(line)? else {
        return Ok(LineResult::Continue);
    };
    debug!(?action, "shell input");
    match action {
        Action::Help => Ok(LineResult::Output(HELP.to_string())),
        Action::Exit => Ok(LineResult::Exit),
        Action::SchemaAll => {
            let tables = engine.catalog().tables();
            if tables.is_empty() {
                return Ok(LineResult::Output("No tables".to_string()));
            }
            let described = tables
                .into_iter()
                .map(|table| Command::Describe { table }.execute(engine, config))
                .collect::<Result<Vec<_>>>()?;
            Ok(LineResult::Output(described.join("\n\n")))
        }
        Action::Run(command) => command.execute(engine, config).map(LineResult::Output),
    }
}

/// rustyline helper: keyword completion only.
struct ReplHelper;

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(|c: char| c.is_whitespace() || c == '(' || c == ',')
            .map_or(0, |i| i + 1);
        let word = &line[start..pos];
        let matches = KEYWORDS
            .iter()
            .filter(|kw| !word.is_empty() && kw.len() >= word.len())
            .filter(|kw| kw[..word.len()].eq_ignore_ascii_case(word))
            .map(|kw| Pair {
                display: (*kw).to_string(),
                replacement: (*kw).to_string(),
            })
            .collect();
        Ok((start, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;
}

impl Highlighter for ReplHelper {}

impl Validator for ReplHelper {}

impl Helper for ReplHelper {}

/// Interactive shell over an open engine.
pub struct Repl<'a> {
    engine: &'a Engine,
    config: &'a CliConfig,
    editor: Editor<ReplHelper, DefaultHistory>,
    history_file: Option<PathBuf>,
}

impl<'a> Repl<'a> {
    /// Creates a shell and loads saved history.
    pub fn new(engine: &'a Engine, config: &'a CliConfig) -> Result<Self> {
        let rl_config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(EditMode::Emacs)
            .max_history_size(1000)?
            .build();

        let mut editor = Editor::with_config(rl_config)?;
        editor.set_helper(Some(ReplHelper));

        let history_file = history_file();
        if let Some(path) = history_file.as_ref().filter(|p| p.exists()) {
            if let Err(e) = editor.load_history(path) {
                debug!("failed to load history: {e}");
            }
        }

        Ok(Self {
            engine,
            config,
            editor,
            history_file,
        })
    }

    /// Prints the welcome banner.
    pub fn print_banner(&self) {
        println!("Quarry v{}", env!("CARGO_PKG_VERSION"));
        println!("Type 'help' for available commands.\n");
    }

    /// Reads and runs lines until `exit`, `quit`, or end of input.
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let Err(e) = self.editor.add_history_entry(line) {
                        debug!("failed to record history: {e}");
                    }
                    match execute_line(self.engine, self.config, line) {
                        Ok(LineResult::Output(text)) => println!("{text}"),
                        Ok(LineResult::Continue) => {}
                        Ok(LineResult::Exit) => break,
                        Err(e) => eprintln!("Error: {e:#}"),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    error!("readline error: {e}");
                    break;
                }
            }
        }
        self.save_history();
        Ok(())
    }

    fn save_history(&mut self) {
        if let Some(path) = &self.history_file {
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    debug!("failed to create history directory: {e}");
                    return;
                }
            }
            if let Err(e) = self.editor.save_history(path) {
                debug!("failed to save history: {e}");
            }
        }
    }
}

fn history_file() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("quarry").join("history"))
}
