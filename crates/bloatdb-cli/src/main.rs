mod commands;
mod config;
mod errors;
mod registry;
mod workspace;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::info;

use commands::{
    SeedRequest, Session, Sink, import_lines, order_lines, report_lines, schema_summary,
};
use config::Config;
use errors::CliError;
use registry::init_logging;
use workspace::CacheLayout;

#[derive(Parser, Debug)]
#[command(
    name = "bloatdb",
    version,
    about = "Fill a Postgres database with rows that respect its constraints"
)]
struct Cli {
    /// Log more (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Also append JSON log lines to this file.
    #[arg(long, value_name = "PATH", global = true)]
    log_file: Option<PathBuf>,
    /// TOML config, or a JSON connection file. Defaults to ./bloatdb.toml when present.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Connection string; overrides DATABASE_URL and the config file.
    #[arg(long, value_name = "URL", global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Introspect the database (or load today's cache) and summarize it.
    Schema(SchemaArgs),
    /// Resolve and print the insertion order.
    Order(OrderArgs),
    /// Generate rows for every table in insertion order.
    Seed(SeedArgs),
    /// Truncate every base table of the namespace.
    Truncate,
    /// Load a directory of per-table CSV exports with COPY.
    Import(ImportArgs),
    /// Delete every cached schema and plan.
    Purge,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Directory holding `<position>_<table>.csv` files.
    #[arg(value_name = "DIR")]
    dir: PathBuf,
    /// Truncate the namespace before importing.
    #[arg(long)]
    truncate: bool,
    /// Ignore cached schema and plan.
    #[arg(long)]
    rebuild: bool,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Ignore the cached description.
    #[arg(long)]
    rebuild: bool,
    /// Schema to describe instead of the configured one.
    #[arg(long, value_name = "NAME")]
    namespace: Option<String>,
}

#[derive(Args, Debug)]
struct OrderArgs {
    /// Ignore cached schema and plan.
    #[arg(long)]
    rebuild: bool,
}

#[derive(Args, Debug)]
struct SeedArgs {
    /// Rows per table, unless the config overrides a table.
    #[arg(long, value_name = "N")]
    rows: Option<u64>,
    /// Seed for reproducible values.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
    /// Maximum rows per INSERT statement.
    #[arg(long, value_name = "N")]
    page_rows: Option<usize>,
    /// Truncate the namespace before seeding.
    #[arg(long, conflicts_with_all = ["dry_run", "csv_dir"])]
    truncate: bool,
    /// Run the whole pipeline in memory without writing.
    #[arg(long, conflicts_with = "csv_dir")]
    dry_run: bool,
    /// Write one CSV per table here instead of inserting.
    #[arg(long, value_name = "DIR")]
    csv_dir: Option<PathBuf>,
    /// Ignore cached schema and plan.
    #[arg(long)]
    rebuild: bool,
}

impl SeedArgs {
    fn into_request(self) -> SeedRequest {
        let sink = match (self.dry_run, self.csv_dir) {
            (true, _) => Sink::DryRun,
            (false, Some(dir)) => Sink::Csv(dir),
            (false, None) => Sink::Database,
        };
        SeedRequest {
            rows: self.rows,
            seed: self.seed,
            page_rows: self.page_rows,
            truncate: self.truncate,
            sink,
            rebuild: self.rebuild,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("error: {}", CliError::from(err));
        return ExitCode::FAILURE;
    }

    let timer = Instant::now();
    match run(cli).await {
        Ok(()) => {
            info!(
                event = "run_finished",
                status = "success",
                duration_ms = timer.elapsed().as_millis() as u64
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            info!(
                event = "run_finished",
                status = "failed",
                error = %err,
                duration_ms = timer.elapsed().as_millis() as u64
            );
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    if let Command::Purge = cli.command {
        let removed = CacheLayout::new(config.cache.dir.clone()).purge()?;
        println!("removed {removed} cached files");
        return Ok(());
    }
    let namespace = match &cli.command {
        Command::Schema(args) => args.namespace.clone(),
        _ => None,
    }
    .unwrap_or_else(|| config.cache.namespace.clone());

    let mut session = Session::open(config, cli.database_url.as_deref(), namespace).await?;

    match cli.command {
        Command::Schema(args) => {
            let schema = session.load_schema(args.rebuild).await?;
            print_lines(&schema_summary(&schema));
        }
        Command::Order(args) => {
            let schema = session.load_schema(args.rebuild).await?;
            let plan = session.load_plan(&schema, args.rebuild)?;
            print_lines(&order_lines(&plan));
        }
        Command::Seed(args) => {
            let report = session.seed(args.into_request()).await?;
            print_lines(&report_lines(&report));
        }
        Command::Truncate => {
            let tables = session.truncate().await?;
            println!("truncated {} tables", tables.len());
        }
        Command::Import(args) => {
            let report = session.import(&args.dir, args.truncate, args.rebuild).await?;
            print_lines(&import_lines(&report));
        }
        Command::Purge => {}
    }
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}
