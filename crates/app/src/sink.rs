//! The production [`StreamFileSink`]: parse, then persist.
//!
//! Parsing and persisting are blocking (CPU and SQLite), so each file is
//! handed to `spawn_blocking`. The database is the only source of the resume
//! point; a restarted node picks up after the last committed file or the
//! last recorded gap, whichever is newer.
//!
//! A file the parser rejects fails with [`DownloaderError::Parse`], which
//! counts against the interval's retries; any other failure is a
//! [`DownloaderError::Sink`] and leaves the interval pending.

use std::sync::Arc;

use async_trait::async_trait;
use mirror_common::time::current_timestamp_nanos;
use mirror_db::{
    BalanceFileRow, BatchPersister, PersistOutcome, RecordFileRow, StreamGapQueries, StreamGapRow,
};
use mirror_downloader::{DownloaderError, PersistedFile, Result, StreamFileSink, StreamGap};
use mirror_parser::{BalanceFileParser, ParserError, RecordFileParser};
use mirror_streams::{AccountBalanceFile, RecordFile, StreamType};
use tracing::{error, warn};

/// Parses verified files and commits them through the [`BatchPersister`].
#[derive(Clone)]
pub struct PersistingSink {
    persister: Arc<BatchPersister>,
    record_parser: Arc<RecordFileParser>,
    balance_parser: Arc<BalanceFileParser>,
}

impl PersistingSink {
    pub fn new(
        persister: Arc<BatchPersister>,
        record_parser: RecordFileParser,
        balance_parser: BalanceFileParser,
    ) -> Self {
        Self {
            persister,
            record_parser: Arc::new(record_parser),
            balance_parser: Arc::new(balance_parser),
        }
    }

    pub fn persister(&self) -> &Arc<BatchPersister> {
        &self.persister
    }

    /// Parses and persists a record file on the calling thread.
    pub fn persist_record_file(&self, mut file: RecordFile) -> anyhow::Result<PersistOutcome> {
        let ctx = self.record_parser.parse(&mut file).map_err(|e| {
            error!(file = %file.name, error = %e, "Failed to parse record file");
            e
        })?;
        let outcome = self.persister.persist_record_file(&file, &ctx).map_err(|e| {
            error!(file = %file.name, error = %e, "Failed to persist record file");
            e
        })?;
        Ok(outcome)
    }

    /// Parses and persists a balance file on the calling thread.
    pub fn persist_balance_file(
        &self,
        mut file: AccountBalanceFile,
    ) -> anyhow::Result<PersistOutcome> {
        let ctx = self.balance_parser.parse(&mut file).map_err(|e| {
            error!(file = %file.name, error = %e, "Failed to parse balance file");
            e
        })?;
        let outcome = self.persister.persist_balance_file(&file, &ctx).map_err(|e| {
            error!(file = %file.name, error = %e, "Failed to persist balance file");
            e
        })?;
        Ok(outcome)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(PersistingSink) -> anyhow::Result<T> + Send + 'static,
    {
        let sink = self.clone();
        tokio::task::spawn_blocking(move || f(sink))
            .await
            .map_err(|e| DownloaderError::Sink(format!("persist task failed: {}", e)))?
            .map_err(sink_error)
    }
}

fn sink_error(e: anyhow::Error) -> DownloaderError {
    if e.downcast_ref::<ParserError>().is_some() {
        DownloaderError::Parse(format!("{:#}", e))
    } else {
        DownloaderError::Sink(format!("{:#}", e))
    }
}

fn record_resume_point(row: RecordFileRow) -> PersistedFile {
    PersistedFile {
        name: row.name,
        consensus_end: row.consensus_end,
        hash: row.hash,
        index: Some(row.index),
    }
}

fn balance_resume_point(row: BalanceFileRow) -> PersistedFile {
    PersistedFile {
        name: row.name,
        consensus_end: row.consensus_timestamp,
        hash: row.file_hash,
        index: None,
    }
}

async fn record_gap(sink: &PersistingSink, gap: StreamGap) -> Result<()> {
    warn!(
        stream_type = %gap.stream_type,
        file = %gap.filename,
        retries = gap.retries,
        reason = %gap.reason,
        "Recording stream gap"
    );
    sink.blocking(move |sink| {
        let id = sink.persister.database().with_connection(|conn| {
            conn.insert_stream_gap(
                gap.stream_type.as_str(),
                &gap.filename,
                gap.timestamp,
                &gap.reason,
                gap.retries,
                current_timestamp_nanos(),
            )
        })?;
        Ok(id)
    })
    .await?;
    Ok(())
}

async fn load_last_gap(sink: &PersistingSink, stream_type: StreamType) -> Result<Option<StreamGap>> {
    sink.blocking(move |sink| {
        let row = sink
            .persister
            .database()
            .with_connection(|conn| conn.last_stream_gap(stream_type.as_str()))?;
        Ok(row.map(|row| stream_gap(stream_type, row)))
    })
    .await
}

fn stream_gap(stream_type: StreamType, row: StreamGapRow) -> StreamGap {
    StreamGap {
        stream_type,
        filename: row.filename,
        timestamp: row.consensus_timestamp,
        reason: row.reason,
        retries: row.retries,
    }
}

#[async_trait]
impl StreamFileSink<RecordFile> for PersistingSink {
    async fn last_persisted(&self) -> Result<Option<PersistedFile>> {
        self.blocking(|sink| Ok(sink.persister.database().last_record_file()?.map(record_resume_point)))
            .await
    }

    async fn on_stream_file(&self, file: RecordFile) -> Result<()> {
        self.blocking(move |sink| sink.persist_record_file(file)).await?;
        Ok(())
    }

    async fn on_gap(&self, gap: StreamGap) -> Result<()> {
        record_gap(self, gap).await
    }

    async fn last_gap(&self) -> Result<Option<StreamGap>> {
        load_last_gap(self, StreamType::Record).await
    }
}

#[async_trait]
impl StreamFileSink<AccountBalanceFile> for PersistingSink {
    async fn last_persisted(&self) -> Result<Option<PersistedFile>> {
        self.blocking(|sink| {
            Ok(sink
                .persister
                .database()
                .last_account_balance_file()?
                .map(balance_resume_point))
        })
        .await
    }

    async fn on_stream_file(&self, file: AccountBalanceFile) -> Result<()> {
        self.blocking(move |sink| sink.persist_balance_file(file)).await?;
        Ok(())
    }

    async fn on_gap(&self, gap: StreamGap) -> Result<()> {
        record_gap(self, gap).await
    }

    async fn last_gap(&self) -> Result<Option<StreamGap>> {
        load_last_gap(self, StreamType::Balance).await
    }
}
