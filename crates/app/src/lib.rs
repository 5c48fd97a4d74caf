//! Application layer of the mirror node ingestion core.
//!
//! Wires the downloader, parser and persister into a running node:
//!
//! - **Configuration**: TOML file plus `MIRROR_*` environment overrides
//!   ([`config`])
//! - **Lifecycle**: database, roster, schedulers and shutdown ([`app`])
//! - **Scheduling**: one fixed-delay loop per stream type ([`scheduler`])
//! - **Persistence**: parse-then-persist sink behind the downloader ([`sink`])
//! - **Periodic jobs**: address book reload ([`address_book`]) and balance
//!   reconciliation ([`reconciliation`])
//! - **Tooling**: logging setup ([`logging`]) and offline file decoding
//!   ([`inspect`])
//!
//! # Usage
//!
//! ```no_run
//! use mirror_app::{run_node, MirrorConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = MirrorConfig::from_file_with_env("mirror.toml")?;
//! run_node(config).await?;
//! # Ok(())
//! # }
//! ```

pub mod address_book;
pub mod app;
pub mod config;
pub mod inspect;
pub mod logging;
pub mod reconciliation;
pub mod scheduler;
pub mod sink;

pub use address_book::AddressBookRefresher;
pub use app::{run_node, App, StreamExit};
pub use config::{
    AddressBookConfig, DatabaseConfig, LoggingConfig, MirrorConfig, ReconciliationConfig,
    StorageConfig, StorageKind, StreamConfig,
};
pub use inspect::{read_stream_file, FileSummary};
pub use logging::{LogConfig, LogFormat};
pub use reconciliation::{diff_balances, BalanceMismatch, BalanceReconciler};
pub use scheduler::{SchedulerExit, StreamScheduler, TickStatus};
pub use sink::PersistingSink;
