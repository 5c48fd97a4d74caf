//! Node assembly and lifecycle.
//!
//! [`App::new`] opens the database, loads the roster and wires one
//! [`StreamScheduler`] per stream type onto a shared [`PersistingSink`].
//! [`App::run`] drives the schedulers and the periodic jobs until the
//! shutdown channel flips to `true`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mirror_db::{BatchPersister, Database, Notifier, PostCommitHook, TimePartitionService};
use mirror_downloader::{
    AddressBook, Downloader, HttpStreamFileProvider, LocalStreamFileProvider, NodeDirectory,
    StreamFileProvider, StreamFileSink,
};
use mirror_parser::{BalanceFileParser, HandlerRegistry, RecordFileParser};
use mirror_streams::reader::{AccountBalanceFileReader, RecordFileReader, StreamFileReader};
use mirror_streams::StreamType;
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::address_book::AddressBookRefresher;
use crate::config::{MirrorConfig, StorageKind};
use crate::reconciliation::BalanceReconciler;
use crate::scheduler::{SchedulerExit, StreamScheduler};
use crate::sink::PersistingSink;

/// How one stream scheduler ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamExit {
    pub stream_type: StreamType,
    pub exit: SchedulerExit,
}

/// A fully wired ingestion node.
pub struct App {
    config: MirrorConfig,
    database: Database,
    directory: Arc<NodeDirectory>,
    provider: Arc<dyn StreamFileProvider>,
    notifier: Arc<Notifier>,
    sink: Arc<PersistingSink>,
}

impl App {
    pub fn new(config: MirrorConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let database =
            Database::open_with_pool_size(&config.database.path, config.database.pool_size)
                .with_context(|| {
                    format!("Failed to open database {}", config.database.path.display())
                })?;
        database.ensure_network(config.common.network)?;

        let book = AddressBook::load(&config.address_book.path).with_context(|| {
            format!(
                "Failed to load address book {}",
                config.address_book.path.display()
            )
        })?;
        info!(
            nodes = book.len(),
            total_stake = book.total_stake(),
            "Loaded address book"
        );
        let directory = Arc::new(NodeDirectory::new(book));

        let provider = build_provider(&config)?;

        let partitions = Arc::new(TimePartitionService::new(&config.partition));
        let notifier = Arc::new(Notifier::new(config.notify.clone()));
        let persister = BatchPersister::new(database.clone(), partitions)
            .with_hook(Arc::clone(&notifier) as Arc<dyn PostCommitHook>);
        info!(hooks = ?persister.hook_names(), "Persister ready");

        let sink = Arc::new(PersistingSink::new(
            Arc::new(persister),
            RecordFileParser::new(HandlerRegistry::new(), config.parser.clone()),
            BalanceFileParser::new(config.parser.clone()),
        ));

        Ok(Self {
            config,
            database,
            directory,
            provider,
            notifier,
            sink,
        })
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn node_directory(&self) -> &Arc<NodeDirectory> {
        &self.directory
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn sink(&self) -> &Arc<PersistingSink> {
        &self.sink
    }

    pub fn record_scheduler(&self) -> StreamScheduler<RecordFileReader, PersistingSink> {
        self.scheduler(StreamType::Record, RecordFileReader)
    }

    pub fn balance_scheduler(&self) -> StreamScheduler<AccountBalanceFileReader, PersistingSink> {
        self.scheduler(StreamType::Balance, AccountBalanceFileReader)
    }

    fn scheduler<R>(&self, stream_type: StreamType, reader: R) -> StreamScheduler<R, PersistingSink>
    where
        R: StreamFileReader,
        PersistingSink: StreamFileSink<R::File>,
    {
        let stream = self.config.stream(stream_type);
        let downloader = Downloader::new(
            self.config.downloader_config(stream_type),
            Arc::clone(&self.directory),
            Arc::clone(&self.provider),
            reader,
        );
        StreamScheduler::new(
            downloader,
            Arc::clone(&self.sink),
            stream.frequency(),
            stream.processing_timeout(),
        )
    }

    pub fn reconciler(&self) -> BalanceReconciler {
        BalanceReconciler::new(self.database.clone(), &self.config.reconciliation)
    }

    /// Runs every stream and periodic job until `shutdown_rx` reads `true`.
    ///
    /// A halted stream stays halted while the others keep running; the
    /// exits are returned once all tasks have stopped.
    pub async fn run(&self, shutdown_rx: watch::Receiver<bool>) -> anyhow::Result<Vec<StreamExit>> {
        info!(
            network = %self.config.common.network,
            database = %self.config.database.path.display(),
            "Starting mirror node"
        );

        let streams: Vec<(StreamType, JoinHandle<SchedulerExit>)> = vec![
            (
                StreamType::Record,
                tokio::spawn(self.record_scheduler().run(shutdown_rx.clone())),
            ),
            (
                StreamType::Balance,
                tokio::spawn(self.balance_scheduler().run(shutdown_rx.clone())),
            ),
        ];

        let mut jobs: Vec<JoinHandle<()>> = Vec::new();
        let refresher = AddressBookRefresher::new(
            Arc::clone(&self.directory),
            self.config.address_book.path.clone(),
            Duration::from_secs(self.config.address_book.refresh_interval_secs),
        );
        jobs.push(tokio::spawn(refresher.start(shutdown_rx.clone())));

        if self.config.reconciliation.enabled {
            let period = Duration::from_secs(self.config.reconciliation.frequency_secs);
            jobs.push(tokio::spawn(
                self.reconciler().start(period, shutdown_rx.clone()),
            ));
        } else {
            info!("Balance reconciliation disabled");
        }

        let mut exits = Vec::with_capacity(streams.len());
        for (stream_type, handle) in streams {
            let exit = handle
                .await
                .with_context(|| format!("{} scheduler task failed", stream_type))?;
            if let SchedulerExit::Halted(reason) = &exit {
                error!(stream_type = %stream_type, reason = %reason, "Stream halted");
            }
            exits.push(StreamExit { stream_type, exit });
        }
        for job in jobs {
            job.await.context("Background job failed")?;
        }

        info!("Mirror node stopped");
        Ok(exits)
    }
}

fn build_provider(config: &MirrorConfig) -> anyhow::Result<Arc<dyn StreamFileProvider>> {
    match config.storage.kind {
        StorageKind::Local => {
            info!(root = %config.storage.path.display(), "Using local stream storage");
            Ok(Arc::new(LocalStreamFileProvider::new(&config.storage.path)))
        }
        StorageKind::Http => {
            let http = config
                .storage
                .http_provider_config()
                .context("storage.base_url must be set for http storage")?;
            info!(base_url = %http.base_url, "Using http stream storage");
            Ok(Arc::new(HttpStreamFileProvider::new(http)?))
        }
    }
}

/// Runs the node until Ctrl+C or SIGTERM.
pub async fn run_node(config: MirrorConfig) -> anyhow::Result<()> {
    let app = App::new(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signals, stopping"),
        }
        let _ = shutdown_tx.send(true);
    });

    let exits = app.run(shutdown_rx).await?;
    let halted: Vec<String> = exits
        .iter()
        .filter(|e| matches!(e.exit, SchedulerExit::Halted(_)))
        .map(|e| e.stream_type.to_string())
        .collect();
    if !halted.is_empty() {
        anyhow::bail!("streams halted: {}", halted.join(", "));
    }
    Ok(())
}

async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C");
            }
            _ = terminate.recv() => {
                info!("Received SIGTERM");
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_common::{EntityId, NetworkKind};
    use mirror_crypto::NodeSigningKey;
    use mirror_downloader::ConsensusNode;

    fn write_book(path: &std::path::Path) {
        let nodes = vec![ConsensusNode {
            node_id: 0,
            node_account_id: EntityId::new(0, 0, 3).unwrap(),
            public_key: NodeSigningKey::from_seed(&[1; 32]).public_key(),
            stake: 1,
            total_stake: 0,
        }];
        std::fs::write(path, AddressBook::new(nodes).unwrap().to_json().unwrap()).unwrap();
    }

    fn config(dir: &std::path::Path) -> MirrorConfig {
        let mut config = MirrorConfig::default();
        config.database.path = dir.join("mirror.db");
        config.storage.path = dir.join("streams");
        config.address_book.path = dir.join("address-book.json");
        config
    }

    #[test]
    fn test_new_wires_hooks_and_records_network() {
        let dir = tempfile::tempdir().unwrap();
        write_book(&dir.path().join("address-book.json"));

        let app = App::new(config(dir.path())).unwrap();
        assert_eq!(app.node_directory().snapshot().len(), 1);
        assert_eq!(app.sink().persister().hook_names().len(), 2);
        assert_eq!(app.record_scheduler().stream_type(), StreamType::Record);
        assert_eq!(app.balance_scheduler().stream_type(), StreamType::Balance);
        drop(app);

        // The database now belongs to testnet.
        let mut other = config(dir.path());
        other.common.network = NetworkKind::Mainnet;
        assert!(App::new(other).is_err());
    }

    #[test]
    fn test_new_requires_address_book() {
        let dir = tempfile::tempdir().unwrap();
        let err = App::new(config(dir.path())).err().unwrap();
        assert!(format!("{:#}", err).contains("address book"));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        write_book(&dir.path().join("address-book.json"));
        let app = Arc::new(App::new(config(dir.path())).unwrap());

        let (tx, rx) = watch::channel(false);
        let running = tokio::spawn({
            let app = Arc::clone(&app);
            async move { app.run(rx).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        let exits = tokio::time::timeout(Duration::from_secs(10), running)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(exits.len(), 2);
        assert!(exits.iter().all(|e| e.exit == SchedulerExit::Shutdown));
    }

    #[tokio::test]
    async fn test_scheduler_runs_on_spawned_task() {
        let dir = tempfile::tempdir().unwrap();
        write_book(&dir.path().join("address-book.json"));
        let app = App::new(config(dir.path())).unwrap();

        let (tx, rx) = watch::channel(false);
        let record = tokio::spawn(app.record_scheduler().run(rx.clone()));
        let balance = tokio::spawn(app.balance_scheduler().run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        for handle in [record, balance] {
            let exit = tokio::time::timeout(Duration::from_secs(10), handle)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(exit, SchedulerExit::Shutdown);
        }
    }
}
