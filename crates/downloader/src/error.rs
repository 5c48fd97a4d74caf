//! Error types for downloading and validating stream files.

use mirror_common::Hash384;
use mirror_streams::StreamError;
use thiserror::Error;

/// Errors from a stream file provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Timeouts, throttling, server errors. Worth retrying.
    #[error("transient error: {0}")]
    Transient(String),

    /// Any other failure that retrying will not fix.
    #[error("permanent error: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

/// Reasons a set of signatures failed to reach consensus.
#[derive(Debug, Clone, Error)]
pub enum ConsensusError {
    /// No verified signature was collected.
    #[error("no verified signatures")]
    NoSignatures,

    /// The address book carries no weight.
    #[error("total stake is zero")]
    ZeroStake,

    /// No hash group crossed the threshold.
    #[error("insufficient stake: best group has {stake} of {total}, threshold {numerator}/{denominator}")]
    InsufficientStake {
        stake: u128,
        total: u128,
        numerator: u64,
        denominator: u64,
    },

    /// More than one hash group crossed the threshold.
    #[error("conflicting consensus: {groups} hash groups crossed the threshold")]
    Conflicting { groups: usize },
}

/// Errors that can occur while downloading stream files.
#[derive(Debug, Error)]
pub enum DownloaderError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("stream file error: {0}")]
    Stream(#[from] StreamError),

    #[error("consensus not reached for {file}: {source}")]
    Consensus {
        file: String,
        #[source]
        source: ConsensusError,
    },

    /// A node's signature did not verify against its public key.
    #[error("signature verification failed for node {node_id}: {reason}")]
    Verification { node_id: i64, reason: String },

    /// Every node in the consensus group served an unusable copy.
    #[error("no valid copy of {0} could be downloaded")]
    NoValidCopy(String),

    /// The file does not chain from the last persisted file.
    #[error("{file} does not chain: expected previous hash {expected}, found {actual}")]
    ChainMismatch {
        file: String,
        expected: Hash384,
        actual: Hash384,
    },

    /// A file at or before the last persisted one reached hand-off.
    #[error("{file} ends at {consensus_end}, not after last persisted {last_consensus_end}")]
    OutOfOrder {
        file: String,
        consensus_end: i64,
        last_consensus_end: i64,
    },

    /// The address book is empty.
    #[error("address book has no nodes")]
    NoNodes,

    #[error("address book error: {0}")]
    AddressBook(String),

    /// The sink could not parse a verified file.
    #[error("parse error: {0}")]
    Parse(String),

    /// The downstream sink (parser and persister) failed.
    #[error("sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloaderError {
    /// Invariant violations halt the scheduler of that stream type.
    pub fn is_invariant(&self) -> bool {
        matches!(
            self,
            DownloaderError::OutOfOrder { .. } | DownloaderError::ChainMismatch { .. }
        )
    }

    /// Errors that count against an interval's retry budget.
    pub fn is_retryable_interval(&self) -> bool {
        matches!(
            self,
            DownloaderError::Consensus { .. }
                | DownloaderError::NoValidCopy(_)
                | DownloaderError::Parse(_)
        )
    }
}

/// Result type for downloader operations.
pub type Result<T> = std::result::Result<T, DownloaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let chain = DownloaderError::ChainMismatch {
            file: "a.rcd".into(),
            expected: Hash384::ZERO,
            actual: Hash384::hash(b"fork"),
        };
        assert!(chain.is_invariant());
        assert!(!chain.is_retryable_interval());

        let parse = DownloaderError::Parse("invalid varint".into());
        assert!(parse.is_retryable_interval());
        assert!(!parse.is_invariant());

        let sink = DownloaderError::Sink("database unavailable".into());
        assert!(!sink.is_retryable_interval());
        assert!(!sink.is_invariant());
    }
}
