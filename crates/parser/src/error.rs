//! Error types for stream file parsing.

use mirror_streams::StreamError;
use thiserror::Error;

/// Errors that can occur while turning stream items into entities.
#[derive(Debug, Error)]
pub enum ParserError {
    /// An item could not be decoded.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("invalid value: {0}")]
    Common(#[from] mirror_common::Error),

    /// Items must be strictly increasing in consensus timestamp.
    #[error("item at {current} does not follow item at {previous}")]
    OutOfOrder { previous: i64, current: i64 },

    /// The number of parsed items differs from the file summary.
    #[error("{file}: expected {expected} items, parsed {actual}")]
    CountMismatch {
        file: String,
        expected: u64,
        actual: u64,
    },

    /// An unsigned field does not fit its signed column.
    #[error("transaction at {consensus_timestamp}: {field} {value} out of range")]
    OutOfRange {
        consensus_timestamp: i64,
        field: &'static str,
        value: u64,
    },

    /// A successful transaction lacks a field its handler requires.
    #[error("transaction at {consensus_timestamp} is missing {field}")]
    MissingField {
        consensus_timestamp: i64,
        field: &'static str,
    },
}

/// Result type for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;
