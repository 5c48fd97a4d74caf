//! mirror - ingestion core of a consensus-network mirror node
//!
//! Downloads the record and balance streams published by the consensus
//! nodes, verifies them against the address book, and persists them to a
//! local SQLite database.
//!
//! # Quick Start
//!
//! ```bash
//! # Write a starting configuration
//! mirror sample-config > mirror.toml
//!
//! # Create the database and start ingesting
//! mirror --config mirror.toml new-db
//! mirror --config mirror.toml run
//!
//! # Decode a single downloaded file
//! mirror read-file 2022-04-15T05_20_00.000000000Z.rcd
//! ```
//!
//! # Commands
//!
//! - **run**: Ingest until Ctrl+C or SIGTERM
//! - **new-db**: Create a new database
//! - **upgrade-db**: Apply pending schema migrations
//! - **read-file**: Decode and verify one stream file, printing JSON
//! - **reconcile**: Check balance snapshots against persisted transfers once
//! - **sample-config**: Print a configuration with every default
//!
//! Configuration comes from a TOML file (`--config <FILE>`) with `MIRROR_*`
//! environment overrides, or from the defaults when no file is given.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mirror_app::{
    logging, read_stream_file, run_node, BalanceReconciler, LogConfig, LogFormat, MirrorConfig,
};
use mirror_db::{Database, ReconciliationStatus};

/// Mirror node ingestion core
#[derive(Parser)]
#[command(name = "mirror")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format; defaults to the configured one
    #[arg(long, global = true)]
    log_format: Option<CliLogFormat>,

    #[command(subcommand)]
    command: Commands,
}

/// Log output format for CLI
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliLogFormat {
    Text,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(fmt: CliLogFormat) -> Self {
        match fmt {
            CliLogFormat::Text => LogFormat::Text,
            CliLogFormat::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion node
    Run,

    /// Create a new database
    NewDb {
        /// Database path (overrides config)
        #[arg(long, value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },

    /// Apply pending database migrations
    UpgradeDb,

    /// Decode a stream file and print a JSON summary
    ReadFile {
        /// Record, balance, signature or sidecar file
        path: PathBuf,
    },

    /// Run one balance reconciliation
    Reconcile,

    /// Print a sample configuration file
    SampleConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::SampleConfig = cli.command {
        return cmd_sample_config();
    }

    let config = load_config(&cli)?;
    init_logging(&cli, &config)?;
    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "Loaded configuration");
    }

    match cli.command {
        Commands::Run => run_node(config).await,
        Commands::NewDb { path, force } => cmd_new_db(config, path, force),
        Commands::UpgradeDb => cmd_upgrade_db(&config),
        Commands::ReadFile { path } => cmd_read_file(path),
        Commands::Reconcile => cmd_reconcile(config).await,
        Commands::SampleConfig => cmd_sample_config(),
    }
}

/// The configured logging, adjusted by the command-line flags.
fn init_logging(cli: &Cli, config: &MirrorConfig) -> anyhow::Result<()> {
    let mut log_config: LogConfig = config.logging.to_log_config()?;
    if cli.verbose {
        log_config.level = tracing::Level::DEBUG;
    }
    if let Some(format) = cli.log_format {
        log_config = log_config.with_format(format.into());
    }

    logging::init(&log_config)?;

    tracing::debug!("Logging initialized");
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<MirrorConfig> {
    let config = match &cli.config {
        Some(path) => MirrorConfig::from_file_with_env(path)?,
        None => {
            let mut config = MirrorConfig::default();
            config.apply_env_overrides()?;
            config
        }
    };
    config.validate()?;
    Ok(config)
}

fn cmd_new_db(mut config: MirrorConfig, path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    if let Some(p) = path {
        config.database.path = p;
    }

    let db_path = &config.database.path;
    if db_path.exists() {
        if force {
            tracing::warn!(path = %db_path.display(), "Removing existing database");
            std::fs::remove_file(db_path)?;
            for suffix in ["-wal", "-shm"] {
                let mut side = db_path.clone().into_os_string();
                side.push(suffix);
                let side = PathBuf::from(side);
                if side.exists() {
                    std::fs::remove_file(side)?;
                }
            }
        } else {
            anyhow::bail!(
                "Database already exists at {}. Use --force to overwrite.",
                db_path.display()
            );
        }
    }

    tracing::info!(path = %db_path.display(), "Creating new database");
    let db = Database::open_with_pool_size(db_path, config.database.pool_size)?;
    db.ensure_network(config.common.network)?;

    println!(
        "Database created at {} (schema version {}, network {})",
        db_path.display(),
        db.schema_version()?,
        config.common.network
    );
    Ok(())
}

fn cmd_upgrade_db(config: &MirrorConfig) -> anyhow::Result<()> {
    tracing::info!(path = %config.database.path.display(), "Upgrading database schema");

    let db = Database::open_with_pool_size(&config.database.path, config.database.pool_size)?;
    db.upgrade()?;

    println!("Database schema is at version {}", db.schema_version()?);
    Ok(())
}

fn cmd_read_file(path: PathBuf) -> anyhow::Result<()> {
    let summary = read_stream_file(&path)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn cmd_reconcile(config: MirrorConfig) -> anyhow::Result<()> {
    let db = Database::open_with_pool_size(&config.database.path, config.database.pool_size)?;
    db.ensure_network(config.common.network)?;
    let reconciler = BalanceReconciler::new(db, &config.reconciliation);

    let job = tokio::task::spawn_blocking(move || reconciler.reconcile()).await??;
    println!(
        "Reconciliation {}: {} snapshot pair(s) checked{}",
        job.status,
        job.count,
        job.error
            .as_deref()
            .map(|e| format!(", {}", e))
            .unwrap_or_default()
    );
    if job.status != ReconciliationStatus::Success {
        anyhow::bail!("reconciliation failed with status {}", job.status);
    }
    Ok(())
}

fn cmd_sample_config() -> anyhow::Result<()> {
    print!("{}", MirrorConfig::sample_config());
    Ok(())
}
