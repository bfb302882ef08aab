use clap::Parser;
use miette::{IntoDiagnostic, Result};
use orderclaim::application::engine::Marketplace;
use orderclaim::config::MarketConfig;
use orderclaim::domain::ports::LedgerStoreBox;
use orderclaim::infrastructure::in_memory::InMemoryLedger;
use orderclaim::interfaces::csv::account_writer::AccountWriter;
use orderclaim::interfaces::csv::attempt_writer::AttemptWriter;
use orderclaim::interfaces::csv::command_reader::CommandReader;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON file overriding capacity, cooldown, fees and completion policy
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the attempt log as CSV to this file
    #[arg(long)]
    attempts_out: Option<PathBuf>,
}

fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = orderclaim::infrastructure::rocksdb::RocksDbLedger::open(path)
                .into_diagnostic()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(path) => {
            tracing::warn!(
                path = %path.display(),
                "persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled; falling back to in-memory storage"
            );
            Ok(Box::new(InMemoryLedger::new()))
        }
        None => Ok(Box::new(InMemoryLedger::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => MarketConfig::load(path).into_diagnostic()?,
        None => MarketConfig::default(),
    };
    let market = Marketplace::new(open_store(cli.db_path)?, config);

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for (line, command) in reader.commands().enumerate() {
        // Line 1 is the header.
        let line = line + 2;
        match command {
            Ok(command) => {
                let kind = command.r#type;
                if let Err(e) = command.dispatch(&market).await {
                    tracing::warn!(line, command = ?kind, error = %e, "command rejected");
                }
            }
            Err(e) => {
                tracing::warn!(line, error = %e, "error reading command");
            }
        }
    }

    let accounts = market.accounts().await.into_diagnostic()?;
    let stdout = io::stdout();
    AccountWriter::new(stdout.lock())
        .write_accounts(accounts)
        .into_diagnostic()?;

    if let Some(path) = cli.attempts_out {
        let attempts = market.attempts().await.into_diagnostic()?;
        let file = File::create(path).into_diagnostic()?;
        AttemptWriter::new(file)
            .write_attempts(attempts)
            .into_diagnostic()?;
    }

    Ok(())
}
