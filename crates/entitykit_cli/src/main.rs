//! `entitykit` command line.
//!
//! # Responsibility
//! - Run the generator over a JSON schema and print its output.
//! - Run free-text searches against a SQLite database built from a schema.
//!
//! # Invariants
//! - stdout carries JSON only; diagnostics and errors go to the log and stderr.
//! - `generate` exits with status 1 when any error diagnostic was produced.

use clap::{Parser, Subcommand};
use entitykit_core::{
    generate, init_logging, open_db, open_db_in_memory, CoreConfig, DispatchFacade,
    RepositoryRegistry, SchemaDeclaration, Sort, SqliteStore, SynthesisOutput,
};
use log::error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "entitykit", version, about = "Entity query synthesis and dispatch tools")]
struct Cli {
    /// Log level: trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Absolute directory for rotating log files (default: stderr)
    #[arg(long, global = true, value_name = "PATH")]
    log_dir: Option<PathBuf>,
    /// JSON configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print descriptors, query specs, bindings and diagnostics as JSON
    Generate(GenerateArgs),
    /// Free-text search over one entity
    Search(SearchArgs),
}

#[derive(Parser)]
struct GenerateArgs {
    /// Schema JSON path
    schema: PathBuf,
    /// Single-line JSON output
    #[arg(long)]
    compact: bool,
}

#[derive(Parser)]
struct SearchArgs {
    /// Schema JSON path
    schema: PathBuf,
    /// SQLite database file (default: `database` from config, else in-memory)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,
    /// Entity simple name
    #[arg(long)]
    entity: String,
    /// Search term
    #[arg(long)]
    term: String,
    /// Zero-based page index
    #[arg(long, default_value_t = 0)]
    page: u32,
    /// Page size (default: `default_page_size` from config)
    #[arg(long)]
    size: Option<u32>,
    /// Scalar field to sort by
    #[arg(long)]
    sort: Option<String>,
    /// Sort descending
    #[arg(long, requires = "sort")]
    desc: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(message) => {
            error!("event=cli_run module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    let config = load_config(&cli)?;
    let log_dir = config
        .log_dir
        .as_ref()
        .map(|dir| {
            dir.to_str()
                .map(str::to_string)
                .ok_or_else(|| format!("log dir `{}` is not valid UTF-8", dir.display()))
        })
        .transpose()?;
    init_logging(&config.log_level, log_dir.as_deref())?;

    match cli.command {
        Commands::Generate(args) => run_generate(&args),
        Commands::Search(args) => run_search(&config, args),
    }
}

fn load_config(cli: &Cli) -> Result<CoreConfig, String> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = read_file(path)?;
            serde_json::from_str::<CoreConfig>(&text)
                .map_err(|err| format!("invalid config `{}`: {err}", path.display()))?
        }
        None => CoreConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.log_dir = Some(dir.clone());
    }
    config.validate().map_err(|err| err.to_string())?;
    Ok(config)
}

fn run_generate(args: &GenerateArgs) -> Result<ExitCode, String> {
    let output = load_output(&args.schema)?;
    for diagnostic in &output.diagnostics {
        eprintln!("{diagnostic}");
    }

    let json = if args.compact {
        serde_json::to_string(&output)
    } else {
        serde_json::to_string_pretty(&output)
    }
    .map_err(|err| format!("failed to serialize output: {err}"))?;
    println!("{json}");

    if output.has_errors() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn run_search(config: &CoreConfig, args: SearchArgs) -> Result<ExitCode, String> {
    let output = load_output(&args.schema)?;
    let conn = match args.db.as_ref().or(config.database.as_ref()) {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    }
    .map_err(|err| format!("failed to open database: {err}"))?;

    let store = SqliteStore::open(conn, &output).map_err(|err| err.to_string())?;
    let registry = RepositoryRegistry::builder()
        .discover(store.repositories())
        .map_err(|err| err.to_string())?
        .build();
    let facade = DispatchFacade::with_config(registry, config.facade());

    let sort = args.sort.map(|field| {
        if args.desc {
            Sort::desc(field)
        } else {
            Sort::asc(field)
        }
    });
    let size = args.size.unwrap_or(config.default_page_size);
    let records = facade
        .fuzzy_search_paged(&args.entity, &args.term, args.page, size, sort)
        .map_err(|err| err.to_string())?;

    let json = serde_json::to_string_pretty(&records)
        .map_err(|err| format!("failed to serialize records: {err}"))?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

fn load_output(schema: &Path) -> Result<SynthesisOutput, String> {
    let text = read_file(schema)?;
    let declaration: SchemaDeclaration = serde_json::from_str(&text)
        .map_err(|err| format!("invalid schema `{}`: {err}", schema.display()))?;
    Ok(generate(&declaration.entities))
}

fn read_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|err| format!("failed to read `{}`: {err}", path.display()))
}
