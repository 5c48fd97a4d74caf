//! Per-stream-type download scheduler.
//!
//! One [`StreamScheduler`] drives one [`Downloader`]: it ticks on a fixed
//! delay, never runs two ticks of the same stream type at once, abandons a
//! tick that outlives the processing timeout, and stops on shutdown. An
//! invariant violation stops only this scheduler; other stream types keep
//! running.

use std::sync::Arc;
use std::time::Duration;

use mirror_downloader::{Downloader, StreamFileSink, TickOutcome};
use mirror_streams::reader::StreamFileReader;
use mirror_streams::StreamType;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Result of one scheduled tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickStatus {
    Completed(TickOutcome),
    /// The tick failed and will be retried on the next one.
    Failed(String),
    /// The tick exceeded the processing timeout.
    TimedOut,
    /// An invariant was violated; the scheduler stops.
    Halted(String),
}

/// Why a scheduler loop returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerExit {
    Shutdown,
    Halted(String),
}

pub struct StreamScheduler<R, S>
where
    R: StreamFileReader,
    S: StreamFileSink<R::File> + 'static,
{
    downloader: Downloader<R>,
    sink: Arc<S>,
    frequency: Duration,
    processing_timeout: Duration,
}

impl<R, S> StreamScheduler<R, S>
where
    R: StreamFileReader,
    S: StreamFileSink<R::File> + 'static,
{
    pub fn new(
        downloader: Downloader<R>,
        sink: Arc<S>,
        frequency: Duration,
        processing_timeout: Duration,
    ) -> Self {
        Self {
            downloader,
            sink,
            frequency,
            processing_timeout,
        }
    }

    pub fn stream_type(&self) -> StreamType {
        self.downloader.stream_type()
    }

    /// Runs one tick under the processing timeout.
    pub async fn run_once(&mut self) -> TickStatus {
        let stream_type = self.downloader.stream_type();
        let tick = self.downloader.tick(self.sink.as_ref());
        match tokio::time::timeout(self.processing_timeout, tick).await {
            Ok(Ok(outcome)) => {
                if outcome.processed > 0 || outcome.gaps > 0 {
                    info!(
                        stream_type = %stream_type,
                        processed = outcome.processed,
                        skipped = outcome.skipped,
                        gaps = outcome.gaps,
                        "Tick complete"
                    );
                } else {
                    debug!(stream_type = %stream_type, ?outcome, "Tick complete");
                }
                TickStatus::Completed(outcome)
            }
            Ok(Err(e)) if e.is_invariant() => {
                error!(stream_type = %stream_type, error = %e, "Invariant violated, halting stream");
                TickStatus::Halted(e.to_string())
            }
            Ok(Err(e)) => {
                warn!(stream_type = %stream_type, error = %e, "Tick failed, retrying next tick");
                TickStatus::Failed(e.to_string())
            }
            Err(_) => {
                warn!(
                    stream_type = %stream_type,
                    timeout_secs = self.processing_timeout.as_secs(),
                    "Tick exceeded processing timeout, abandoning"
                );
                TickStatus::TimedOut
            }
        }
    }

    /// Ticks until shutdown is signalled or the stream halts.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) -> SchedulerExit {
        let stream_type = self.stream_type();
        if !self.downloader.config().enabled {
            info!(stream_type = %stream_type, "Stream downloads disabled");
        }
        info!(
            stream_type = %stream_type,
            frequency_ms = self.frequency.as_millis() as u64,
            "Starting stream scheduler"
        );

        let mut interval = tokio::time::interval(self.frequency);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.run_once().await {
                        TickStatus::Halted(reason) => return SchedulerExit::Halted(reason),
                        TickStatus::Completed(outcome) if outcome.disabled => {
                            debug!(stream_type = %stream_type, "Stream disabled");
                        }
                        _ => {}
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!(stream_type = %stream_type, "Stream scheduler shutting down");
                        return SchedulerExit::Shutdown;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mirror_downloader::{
        AddressBook, DownloaderConfig, DownloaderError, LocalStreamFileProvider, NodeDirectory,
        PersistedFile, Result, StreamGap,
    };
    use mirror_streams::reader::RecordFileReader;
    use mirror_streams::RecordFile;

    /// Fails every tick before any download.
    struct FailingSink {
        invariant: bool,
    }

    #[async_trait]
    impl StreamFileSink<RecordFile> for FailingSink {
        async fn last_persisted(&self) -> Result<Option<PersistedFile>> {
            if self.invariant {
                Err(DownloaderError::OutOfOrder {
                    file: "f".into(),
                    consensus_end: 1,
                    last_consensus_end: 2,
                })
            } else {
                Err(DownloaderError::Sink("database unavailable".into()))
            }
        }

        async fn on_stream_file(&self, _file: RecordFile) -> Result<()> {
            Ok(())
        }

        async fn on_gap(&self, _gap: StreamGap) -> Result<()> {
            Ok(())
        }
    }

    fn scheduler(
        config: DownloaderConfig,
        invariant: bool,
    ) -> StreamScheduler<RecordFileReader, FailingSink> {
        let dir = std::env::temp_dir();
        let downloader = Downloader::new(
            config,
            Arc::new(NodeDirectory::new(AddressBook::default())),
            Arc::new(LocalStreamFileProvider::new(dir)),
            RecordFileReader,
        );
        StreamScheduler::new(
            downloader,
            Arc::new(FailingSink { invariant }),
            Duration::from_millis(10),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_failure_is_retried() {
        let mut scheduler = scheduler(DownloaderConfig::default(), false);
        assert!(matches!(scheduler.run_once().await, TickStatus::Failed(_)));
        assert!(matches!(scheduler.run_once().await, TickStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_invariant_halts_loop() {
        let scheduler = scheduler(DownloaderConfig::default(), true);
        let (_tx, rx) = watch::channel(false);
        let exit = tokio::time::timeout(Duration::from_secs(5), scheduler.run(rx))
            .await
            .unwrap();
        assert!(matches!(exit, SchedulerExit::Halted(_)));
    }

    #[tokio::test]
    async fn test_disabled_stream_runs_until_shutdown() {
        let config = DownloaderConfig {
            enabled: false,
            ..DownloaderConfig::default()
        };
        let mut scheduler = scheduler(config.clone(), true);
        match scheduler.run_once().await {
            TickStatus::Completed(outcome) => assert!(outcome.disabled),
            other => panic!("unexpected {:?}", other),
        }

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(self::scheduler(config, true).run(rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, SchedulerExit::Shutdown);
    }
}
