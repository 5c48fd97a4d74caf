//! Per-stream-type download state machine.
//!
//! Each call to [`Downloader::tick`] lists the signature files newer than the
//! last persisted (or last attempted) interval and walks them in timestamp
//! order. For every interval:
//!
//! 1. **Fanout**: fetch the signature file from every node concurrently,
//!    bounded by `max_concurrency` and a per-node timeout.
//! 2. **Verify**: check each signature against the node's public key.
//! 3. **Select**: run consensus; stop waiting for stragglers once the tally
//!    is decided.
//! 4. **Fetch**: download the data file from a node of the winning group,
//!    fastest responder first, falling back on failure.
//! 5. **Decode**: read it and match its hashes against the consensus hash.
//! 6. **Hand-off**: pass it to the [`StreamFileSink`].
//!
//! A failure aborts the tick and the same interval is retried next tick. An
//! interval that keeps failing consensus, download or parsing past
//! `max_retries` is recorded as a gap and skipped. A file that does not chain
//! from the last persisted one, or does not end after it, is an invariant
//! violation and is never skipped.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use mirror_common::Hash384;
use mirror_streams::reader::{SidecarFileReader, SignatureFileReader, StreamFileData, StreamFileReader};
use mirror_streams::{StreamFile, StreamFileSignature, StreamFilename, StreamType};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::address_book::{AddressBook, ConsensusNode, NodeDirectory};
use crate::consensus::{ConsensusPolicy, ConsensusValidator, TallyState};
use crate::error::{DownloaderError, ProviderError, Result};
use crate::provider::StreamFileProvider;
use crate::verifier::SignatureVerifier;

/// Downloader settings for one stream type.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    pub enabled: bool,
    /// Maximum intervals processed per tick.
    pub batch_size: usize,
    /// Failed attempts of one interval before it is recorded as a gap.
    pub max_retries: u32,
    pub node_timeout: Duration,
    pub max_concurrency: usize,
    /// Keep raw file bytes on the handed-off file.
    pub persist_bytes: bool,
    pub sidecars_enabled: bool,
    /// Only download while nothing has been persisted for this stream type.
    pub only_if_empty: bool,
    pub consensus: ConsensusPolicy,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 100,
            max_retries: 3,
            node_timeout: Duration::from_secs(10),
            max_concurrency: 16,
            persist_bytes: false,
            sidecars_enabled: true,
            only_if_empty: false,
            consensus: ConsensusPolicy::default(),
        }
    }
}

/// Summary of the newest file persisted for a stream type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedFile {
    pub name: String,
    pub consensus_end: i64,
    pub hash: Hash384,
    pub index: Option<i64>,
}

impl PersistedFile {
    pub fn of<F: StreamFile>(file: &F) -> Self {
        Self {
            name: file.name().to_string(),
            consensus_end: file.consensus_end(),
            hash: file.hash(),
            index: file.index(),
        }
    }
}

/// An interval given up on after exhausting its retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamGap {
    pub stream_type: StreamType,
    pub filename: String,
    pub timestamp: i64,
    pub reason: String,
    pub retries: u32,
}

/// Receiver of downloaded files; the parser and persister in production.
#[async_trait]
pub trait StreamFileSink<F: StreamFile>: Send + Sync {
    /// Newest file already persisted, if any.
    async fn last_persisted(&self) -> Result<Option<PersistedFile>>;

    /// Parses and persists a verified file. Must be idempotent.
    async fn on_stream_file(&self, file: F) -> Result<()>;

    /// Records an interval that was skipped.
    async fn on_gap(&self, gap: StreamGap) -> Result<()>;

    /// Newest recorded gap, used to resume past it after a restart.
    async fn last_gap(&self) -> Result<Option<StreamGap>> {
        Ok(None)
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub processed: usize,
    pub skipped: usize,
    pub gaps: usize,
    pub disabled: bool,
}

impl TickOutcome {
    fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }
}

/// Downloader of one stream type.
pub struct Downloader<R: StreamFileReader> {
    stream_type: StreamType,
    config: DownloaderConfig,
    directory: Arc<NodeDirectory>,
    provider: Arc<dyn StreamFileProvider>,
    verifier: SignatureVerifier,
    consensus: ConsensusValidator,
    reader: R,
    last_persisted: Option<PersistedFile>,
    last_attempted: Option<StreamFilename>,
    retry: Option<(StreamFilename, u32)>,
    gap_pending: bool,
    gaps_loaded: bool,
    disabled: bool,
}

impl<R: StreamFileReader> Downloader<R> {
    pub fn new(
        config: DownloaderConfig,
        directory: Arc<NodeDirectory>,
        provider: Arc<dyn StreamFileProvider>,
        reader: R,
    ) -> Self {
        Self {
            stream_type: <R::File as StreamFile>::stream_type(),
            consensus: ConsensusValidator::new(config.consensus),
            config,
            directory,
            provider,
            verifier: SignatureVerifier,
            reader,
            last_persisted: None,
            last_attempted: None,
            retry: None,
            gap_pending: false,
            gaps_loaded: false,
            disabled: false,
        }
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    pub fn last_attempted(&self) -> Option<&StreamFilename> {
        self.last_attempted.as_ref()
    }

    /// Runs one download cycle.
    pub async fn tick<S>(&mut self, sink: &S) -> Result<TickOutcome>
    where
        S: StreamFileSink<R::File> + ?Sized,
    {
        if !self.config.enabled || self.disabled {
            return Ok(TickOutcome::disabled());
        }

        self.last_persisted = sink.last_persisted().await?;
        if self.config.only_if_empty && self.last_persisted.is_some() {
            info!(
                stream_type = %self.stream_type,
                "Stream already has a persisted file, disabling downloads"
            );
            self.disabled = true;
            return Ok(TickOutcome::disabled());
        }

        if !self.gaps_loaded {
            self.resume_after_gap(sink).await?;
        }

        let book = self.directory.snapshot();
        if book.is_empty() {
            return Err(DownloaderError::NoNodes);
        }

        let intervals = self.list_intervals(&book).await;
        if intervals.is_empty() {
            debug!(stream_type = %self.stream_type, "No new signature files");
        }

        let mut outcome = TickOutcome::default();
        for interval in intervals {
            if let Some(last) = self.persisted_filename() {
                if interval.timestamp() <= last.timestamp() {
                    debug!(file = %interval, "Skipping already persisted interval");
                    outcome.skipped += 1;
                    continue;
                }
            }

            match self.process(&book, &interval, sink).await {
                Ok(persisted) => {
                    info!(
                        stream_type = %self.stream_type,
                        file = %persisted.name,
                        consensus_end = persisted.consensus_end,
                        "Stream file processed"
                    );
                    self.last_persisted = Some(persisted);
                    self.last_attempted = Some(interval);
                    self.retry = None;
                    self.gap_pending = false;
                    outcome.processed += 1;
                }
                Err(e) if e.is_retryable_interval() => {
                    let attempts = match &self.retry {
                        Some((name, n)) if *name == interval => n + 1,
                        _ => 1,
                    };
                    if attempts <= self.config.max_retries {
                        warn!(
                            stream_type = %self.stream_type,
                            file = %interval,
                            attempt = attempts,
                            error = %e,
                            "Interval failed, will retry next tick"
                        );
                        self.retry = Some((interval, attempts));
                        return Ok(outcome);
                    }

                    warn!(
                        stream_type = %self.stream_type,
                        file = %interval,
                        retries = self.config.max_retries,
                        error = %e,
                        "Interval unavailable after retries, recording gap"
                    );
                    sink.on_gap(StreamGap {
                        stream_type: self.stream_type,
                        filename: interval.name().to_string(),
                        timestamp: interval.timestamp(),
                        reason: e.to_string(),
                        retries: self.config.max_retries,
                    })
                    .await?;
                    self.last_attempted = Some(interval);
                    self.retry = None;
                    self.gap_pending = true;
                    outcome.gaps += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcome)
    }

    /// Resumes after a gap newer than the last persisted file.
    async fn resume_after_gap<S>(&mut self, sink: &S) -> Result<()>
    where
        S: StreamFileSink<R::File> + ?Sized,
    {
        let gap = sink.last_gap().await?;
        self.gaps_loaded = true;
        let Some(gap) = gap else {
            return Ok(());
        };
        if let Some(last) = self.persisted_filename() {
            if gap.timestamp <= last.timestamp() {
                return Ok(());
            }
        }
        let name = StreamFilename::parse(&gap.filename)?;
        info!(
            stream_type = %self.stream_type,
            file = %name,
            "Resuming after recorded gap"
        );
        self.last_attempted = Some(name);
        self.gap_pending = true;
        Ok(())
    }

    fn persisted_filename(&self) -> Option<StreamFilename> {
        self.last_persisted
            .as_ref()
            .and_then(|p| StreamFilename::parse(&p.name).ok())
    }

    /// Union of every node's listing newer than the resume point.
    async fn list_intervals(&self, book: &AddressBook) -> Vec<StreamFilename> {
        let after = match (self.persisted_filename(), self.last_attempted.clone()) {
            (Some(p), Some(a)) => Some(if a.timestamp() > p.timestamp() { a } else { p }),
            (p, a) => p.or(a),
        };
        let after = after.as_ref();
        let limit = self.config.batch_size.max(1);

        let listings = futures::stream::iter(book.nodes().to_vec())
            .map(|node| async move {
                let listing = tokio::time::timeout(
                    self.config.node_timeout,
                    self.provider.list_after(&node, self.stream_type, after, limit),
                )
                .await;
                (node.node_id, listing)
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut names = BTreeSet::new();
        for (node_id, listing) in listings {
            match listing {
                Ok(Ok(found)) => names.extend(found),
                Ok(Err(e)) => warn!(node_id, error = %e, "Failed to list signature files"),
                Err(_) => warn!(node_id, "Timed out listing signature files"),
            }
        }
        names.into_iter().take(limit).collect()
    }

    /// Fetches, parses and verifies one node's signature file.
    async fn fetch_signature(
        &self,
        node: &ConsensusNode,
        name: &StreamFilename,
    ) -> Result<StreamFileSignature> {
        let bytes = self
            .provider
            .fetch(node, self.stream_type, name.name())
            .await?;
        let data = StreamFileData::from_bytes(name.clone(), bytes)?;
        let mut signature = SignatureFileReader.read(&data)?;
        self.verifier.verify(node, &mut signature)?;
        Ok(signature)
    }

    /// Collects verified signatures until the tally is decided or every node
    /// has answered.
    async fn collect_signatures(
        &self,
        book: &AddressBook,
        name: &StreamFilename,
    ) -> Vec<StreamFileSignature> {
        let mut pending = futures::stream::iter(book.nodes().to_vec())
            .map(|node| async move {
                let result =
                    tokio::time::timeout(self.config.node_timeout, self.fetch_signature(&node, name))
                        .await;
                (node.node_id, result)
            })
            .buffer_unordered(self.config.max_concurrency.max(1));

        let mut reported = HashSet::new();
        let mut signatures = Vec::new();
        while let Some((node_id, result)) = pending.next().await {
            reported.insert(node_id);
            match result {
                Ok(Ok(signature)) => signatures.push(signature),
                Ok(Err(DownloaderError::Provider(ProviderError::NotFound(_)))) => {
                    debug!(node_id, file = %name, "Signature file not found");
                }
                Ok(Err(DownloaderError::Stream(e))) => {
                    warn!(node_id, file = %name, error = %e, "Rejected malformed signature file");
                }
                Ok(Err(e @ DownloaderError::Verification { .. })) => {
                    warn!(node_id, file = %name, error = %e, "Rejected signature that failed verification");
                }
                Ok(Err(e)) => {
                    warn!(node_id, file = %name, error = %e, "Failed to download signature file");
                }
                Err(_) => warn!(node_id, file = %name, "Timed out downloading signature file"),
            }

            match self.consensus.tally(book, &signatures, &reported) {
                TallyState::Pending => {}
                state => {
                    debug!(file = %name, ?state, responded = reported.len(), "Tally settled");
                    break;
                }
            }
        }
        signatures
    }

    async fn process<S>(
        &self,
        book: &AddressBook,
        name: &StreamFilename,
        sink: &S,
    ) -> Result<PersistedFile>
    where
        S: StreamFileSink<R::File> + ?Sized,
    {
        let signatures = self.collect_signatures(book, name).await;
        let consensus = self
            .consensus
            .validate(book, &signatures)
            .map_err(|source| {
                warn!(file = %name, error = %source, "Consensus not reached");
                DownloaderError::Consensus {
                    file: name.name().to_string(),
                    source,
                }
            })?;
        debug!(
            file = %name,
            hash = %consensus.file_hash,
            weight = consensus.weight as u64,
            total = consensus.total as u64,
            "Consensus reached"
        );

        let mut file = None;
        for signature in &consensus.signatures {
            let Some(node) = signature.node_id.and_then(|id| book.node(id)) else {
                continue;
            };
            match self.download_copy(node, name, signature).await {
                Ok(copy) => {
                    file = Some(copy);
                    break;
                }
                Err(e) => warn!(
                    node_id = node.node_id,
                    file = %name,
                    error = %e,
                    "Rejected data file copy"
                ),
            }
        }
        let mut file = file.ok_or_else(|| DownloaderError::NoValidCopy(name.name().to_string()))?;

        if let Some(last) = &self.last_persisted {
            if file.consensus_end() <= last.consensus_end {
                return Err(DownloaderError::OutOfOrder {
                    file: file.name().to_string(),
                    consensus_end: file.consensus_end(),
                    last_consensus_end: last.consensus_end,
                });
            }
            if self.stream_type.is_chained() && !self.gap_pending {
                if let Some(previous) = file.previous_hash() {
                    if previous != last.hash {
                        warn!(
                            file = %file.name(),
                            expected = %last.hash,
                            actual = %previous,
                            "Rejected file that does not chain"
                        );
                        return Err(DownloaderError::ChainMismatch {
                            file: file.name().to_string(),
                            expected: last.hash,
                            actual: previous,
                        });
                    }
                }
            }
        }

        if file.index().is_none() {
            let next = self
                .last_persisted
                .as_ref()
                .and_then(|p| p.index)
                .map(|i| i + 1)
                .unwrap_or(0);
            file.set_index(next);
        }
        if !self.config.persist_bytes {
            file.clear_bytes();
        }

        let persisted = PersistedFile::of(&file);
        sink.on_stream_file(file).await?;
        Ok(persisted)
    }

    /// Downloads and checks one node's copy of the data file.
    async fn download_copy(
        &self,
        node: &ConsensusNode,
        signature_name: &StreamFilename,
        signature: &StreamFileSignature,
    ) -> Result<R::File> {
        let mut fetched = None;
        for candidate in signature_name.data_name_candidates() {
            match self.fetch_with_timeout(node, &candidate, false).await {
                Ok(bytes) => {
                    fetched = Some((candidate, bytes));
                    break;
                }
                Err(DownloaderError::Provider(ProviderError::NotFound(_))) => continue,
                Err(e) => return Err(e),
            }
        }
        let (data_name, bytes) = fetched.ok_or_else(|| {
            ProviderError::NotFound(format!("data file for {}", signature_name))
        })?;

        let data_name = StreamFilename::parse(&data_name)?;
        let data = StreamFileData::from_bytes(data_name.clone(), bytes)?;
        let mut file = self.reader.read(&data)?;

        let mismatch = |what: &str, expected: &Hash384, actual: Option<Hash384>| {
            DownloaderError::Verification {
                node_id: node.node_id,
                reason: format!(
                    "{} hash mismatch: signed {}, downloaded {}",
                    what,
                    expected,
                    actual.map(|h| h.to_string()).unwrap_or_else(|| "none".into())
                ),
            }
        };
        if file.file_hash() != signature.file_hash {
            return Err(mismatch("file", &signature.file_hash, Some(file.file_hash())));
        }
        if let Some(expected) = &signature.metadata_hash {
            if file.metadata_hash().as_ref() != Some(expected) {
                return Err(mismatch("metadata", expected, file.metadata_hash()));
            }
        }

        if self.config.sidecars_enabled && !file.sidecar_metadata().is_empty() {
            let mut sidecars = Vec::with_capacity(file.sidecar_metadata().len());
            for meta in file.sidecar_metadata() {
                let sidecar_name = data_name.sidecar_name(meta.id);
                let bytes = self.fetch_with_timeout(node, &sidecar_name, true).await?;
                let data = StreamFileData::from_bytes(StreamFilename::parse(&sidecar_name)?, bytes)?;
                let sidecar = SidecarFileReader.read(&data)?;
                if sidecar.hash != meta.hash {
                    return Err(mismatch("sidecar", &meta.hash, Some(sidecar.hash)));
                }
                sidecars.push(sidecar);
            }
            file.attach_sidecars(sidecars);
        }

        file.set_node_id(node.node_id);
        Ok(file)
    }

    async fn fetch_with_timeout(
        &self,
        node: &ConsensusNode,
        name: &str,
        sidecar: bool,
    ) -> Result<bytes::Bytes> {
        let fetch = async {
            if sidecar {
                self.provider
                    .fetch_sidecar(node, self.stream_type, name)
                    .await
            } else {
                self.provider.fetch(node, self.stream_type, name).await
            }
        };
        match tokio::time::timeout(self.config.node_timeout, fetch).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProviderError::Transient(format!("timed out fetching {}", name)).into()),
        }
    }
}
