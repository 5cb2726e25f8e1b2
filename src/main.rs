use clap::{Args, Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};
use paybridge::application::engine::TransferEngine;
use paybridge::application::pool::{TransferJob, WorkerPool};
use paybridge::application::report::user_report;
use paybridge::config::{EngineConfig, PoolConfig};
use paybridge::domain::account::AccountId;
use paybridge::infrastructure::Storage;
use paybridge::interfaces::csv::account_reader::AccountReader;
use paybridge::interfaces::csv::account_writer::AccountWriter;
use paybridge::interfaces::csv::report_writer::ReportWriter;
use paybridge::interfaces::csv::transfer_reader::TransferReader;
use paybridge::logging::init_logging;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Settings {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true, env = "PAYBRIDGE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Maximum number of queued transfers.
    #[arg(long, global = true, env = "PAYBRIDGE_QUEUE_SIZE", default_value_t = 100)]
    queue_size: usize,

    /// Number of concurrent transfer workers.
    #[arg(long, global = true, env = "PAYBRIDGE_WORKERS", default_value_t = 10)]
    workers: usize,

    /// Deadline for each persistence phase of a transfer, in milliseconds.
    #[arg(long, global = true, env = "PAYBRIDGE_TRANSFER_TIMEOUT_MS", default_value_t = 5000)]
    transfer_timeout_ms: u64,

    /// Deadline for a single audit append, in milliseconds.
    #[arg(long, global = true, env = "PAYBRIDGE_AUDIT_TIMEOUT_MS", default_value_t = 2000)]
    audit_timeout_ms: u64,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, env = "PAYBRIDGE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "PAYBRIDGE_LOG_JSON")]
    log_json: bool,
}

impl Settings {
    fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            transfer_timeout: Duration::from_millis(self.transfer_timeout_ms),
            audit_timeout: Duration::from_millis(self.audit_timeout_ms),
        }
    }

    fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            queue_capacity: self.queue_size,
            workers: self.workers,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run transfer requests through the worker pool and print final balances
    Process {
        /// Transfer requests CSV file (request_id, from, to, amount)
        requests: PathBuf,

        /// Opening balances CSV file (account, balance)
        #[arg(long)]
        accounts: Option<PathBuf>,
    },
    /// Write the transaction and audit report for one account
    Report {
        #[arg(long)]
        user: AccountId,

        /// Defaults to user_<ID>_report.csv
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print stored records as JSON
    Inspect {
        #[arg(value_enum)]
        model: Model,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Model {
    Accounts,
    Transactions,
    Audit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.settings.log_level, cli.settings.log_json);

    let storage = Storage::open(cli.settings.db_path.as_deref()).into_diagnostic()?;

    match cli.command {
        Command::Process { requests, accounts } => {
            process(&cli.settings, storage, requests, accounts).await
        }
        Command::Report { user, output } => report(storage, user, output).await,
        Command::Inspect { model, limit } => inspect(storage, model, limit).await,
    }
}

async fn process(
    settings: &Settings,
    storage: Storage,
    requests: PathBuf,
    accounts: Option<PathBuf>,
) -> Result<()> {
    if let Some(path) = accounts {
        let file = File::open(path).into_diagnostic()?;
        for seed in AccountReader::new(file).seeds() {
            match seed {
                Ok(seed) => {
                    storage
                        .ledger
                        .open_account(seed.account, seed.balance)
                        .await
                        .into_diagnostic()?;
                }
                Err(e) => eprintln!("Error reading account: {}", e),
            }
        }
    }

    let engine = Arc::new(TransferEngine::new(
        storage.ledger.clone(),
        storage.audit_sink.clone(),
        settings.engine_config(),
    ));
    let pool = WorkerPool::spawn(settings.pool_config(), engine).into_diagnostic()?;

    let file = File::open(requests).into_diagnostic()?;
    for request in TransferReader::new(file).transfers() {
        match request {
            Ok(request) => {
                let request_id = request.request_id.clone();
                if !pool.submit(TransferJob::new(request)) {
                    eprintln!(
                        "Rejected request {}: capacity exceeded, retry later",
                        request_id
                    );
                }
            }
            Err(e) => eprintln!("Error reading transfer: {}", e),
        }
    }

    pool.shutdown().await;

    let accounts = storage.ledger.all_accounts().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(accounts).into_diagnostic()?;

    Ok(())
}

async fn report(storage: Storage, user: AccountId, output: Option<PathBuf>) -> Result<()> {
    let report = user_report(storage.ledger.as_ref(), storage.audit_reader.as_ref(), user)
        .await
        .into_diagnostic()?;

    let path = output.unwrap_or_else(|| PathBuf::from(format!("user_{}_report.csv", user)));
    let file = File::create(&path).into_diagnostic()?;
    ReportWriter::new(file).write_report(&report).into_diagnostic()?;
    tracing::info!(account = user, path = %path.display(), "report written");

    Ok(())
}

async fn inspect(storage: Storage, model: Model, limit: usize) -> Result<()> {
    let json = match model {
        Model::Accounts => {
            let mut accounts = storage.ledger.all_accounts().await.into_diagnostic()?;
            accounts.truncate(limit);
            serde_json::to_string_pretty(&accounts)
        }
        Model::Transactions => {
            let transactions = storage
                .ledger
                .recent_transactions(limit)
                .await
                .into_diagnostic()?;
            serde_json::to_string_pretty(&transactions)
        }
        Model::Audit => {
            let entries = storage
                .audit_reader
                .recent_entries(limit)
                .await
                .into_diagnostic()?;
            serde_json::to_string_pretty(&entries)
        }
    }
    .into_diagnostic()?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json).into_diagnostic()?;
    Ok(())
}
