//! psq CLI
//!
//! Run SQL queries over JSON, JSON Lines, CSV and TSV files.

use anyhow::Context;
use clap::Parser;
use percolate_sql::config::{ColumnType, Config, NestedMode};
use percolate_sql::database::Session;
use percolate_sql::ingest::{Format, SourceInput};
use percolate_sql::storage::QueryResult;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_QUERY: &str = "SELECT * FROM {0}";

/// psq - run SQL over data files
#[derive(Parser)]
#[command(name = "psq")]
#[command(about = "Run SQL queries against JSON, JSONL, CSV and TSV files", long_about = None)]
#[command(version)]
struct Cli {
    /// Input files, then optionally the query (last argument containing whitespace)
    args: Vec<String>,

    /// Read the query from a file
    #[arg(short = 'f', long = "file")]
    query_file: Option<PathBuf>,

    /// Read a source of the given type from stdin (added as source 0)
    #[arg(short = 's', long = "stdin", value_name = "TYPE")]
    stdin: Option<String>,

    /// Create NUMERIC columns instead of TEXT
    #[arg(long)]
    numeric: bool,

    /// Store nested objects as NULL instead of flattening them
    #[arg(long)]
    drop_nested: bool,

    /// Convert numeric-looking CSV/TSV fields to numbers
    #[arg(short = 'n', long)]
    convert_numbers: bool,

    /// Load every row regardless of the WHERE clause
    #[arg(long)]
    no_pushdown: bool,

    /// Store file (defaults to an in-memory store)
    #[arg(long, env = "PSQ_DB_PATH")]
    db: Option<PathBuf>,

    /// Pretty-print results
    #[arg(short, long)]
    pretty: bool,

    /// Config file (defaults to ~/.psq/config.json)
    #[arg(long, env = "PSQ_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = build_config(&cli)?;
    let (mut files, query) = split_args(&cli.args);
    let query = match &cli.query_file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read query file {}", path.display()))?,
        None => query.unwrap_or_else(|| DEFAULT_QUERY.to_string()),
    };

    let mut stdin_file = None;
    if let Some(kind) = &cli.stdin {
        let format = Format::parse(kind)?;
        let path = read_stdin(format)?;
        files.insert(0, SourceInput::new(&path).with_format(format));
        stdin_file = Some(path);
    }

    let outcome = run(config, &query, &files, cli.pretty);

    if let Some(path) = stdin_file {
        let _ = fs::remove_file(path);
    }
    outcome
}

fn run(config: Config, query: &str, files: &[SourceInput], pretty: bool) -> anyhow::Result<()> {
    if files.is_empty() {
        anyhow::bail!("No input files given");
    }

    let mut session = Session::open(config)?;
    let result = session.run(query, files)?;
    let output = to_json(&result);

    if pretty {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", serde_json::to_string(&output)?);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Load the config file and apply flag overrides.
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(shellexpand::tilde(&path.to_string_lossy()).into_owned())?,
        None => Config::load()?,
    };

    if cli.numeric {
        config.loader.column_type = ColumnType::Numeric;
    }
    if cli.drop_nested {
        config.loader.nested = NestedMode::Drop;
    }
    if cli.convert_numbers {
        config.convert_numbers = true;
    }
    if cli.no_pushdown {
        config.pushdown = false;
    }
    if let Some(db) = &cli.db {
        config.db_path = Some(PathBuf::from(
            shellexpand::tilde(&db.to_string_lossy()).into_owned(),
        ));
    }

    config.validate()?;
    Ok(config)
}

/// Split positional arguments into input files and an optional query.
fn split_args(args: &[String]) -> (Vec<SourceInput>, Option<String>) {
    let mut files: Vec<&String> = args.iter().collect();
    let has_query = files
        .last()
        .is_some_and(|last| last.contains(char::is_whitespace));
    let query = if has_query { files.pop().cloned() } else { None };

    let inputs = files.into_iter().map(SourceInput::new).collect();
    (inputs, query)
}

fn read_stdin(format: Format) -> anyhow::Result<PathBuf> {
    let mut content = Vec::new();
    io::stdin()
        .read_to_end(&mut content)
        .context("Failed to read stdin")?;

    let path = std::env::temp_dir().join(format!(
        "psq-stdin-{}.{}",
        uuid::Uuid::new_v4(),
        format.as_str()
    ));
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn to_json(result: &QueryResult) -> Value {
    let rows = result
        .rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> = result
                .columns
                .iter()
                .cloned()
                .zip(row.iter().map(|value| serde_json::to_value(value).unwrap_or(Value::Null)))
                .collect();
            Value::Object(object)
        })
        .collect();
    Value::Array(rows)
}
