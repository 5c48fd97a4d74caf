//! Error types for stream file decoding.

use mirror_common::Hash384;
use thiserror::Error;

/// Errors produced while naming, reading or decoding stream files.
///
/// Every variant except [`StreamError::Io`] describes malformed content: the
/// downloader treats those as a bad copy from one node and tries another.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A marker, class id or fixed constant did not have the expected value.
    #[error("{context}: bad marker, expected {expected:#x}, found {found:#x}")]
    BadMarker {
        context: &'static str,
        expected: i64,
        found: i64,
    },

    /// The input ended before a complete value could be read.
    #[error("{context}: truncated, needed {needed} bytes but {remaining} remain")]
    Truncated {
        context: &'static str,
        needed: usize,
        remaining: usize,
    },

    /// Bytes remained after the last expected value.
    #[error("{context}: {count} trailing bytes")]
    TrailingBytes { context: &'static str, count: usize },

    /// A declared length was negative or exceeded its bound.
    #[error("{context}: invalid length {length}")]
    InvalidLength { context: &'static str, length: i64 },

    /// An embedded or computed hash did not match.
    #[error("{context}: hash mismatch, expected {expected}, computed {actual}")]
    HashMismatch {
        context: &'static str,
        expected: Hash384,
        actual: Hash384,
    },

    /// The leading version is not one this build can read.
    #[error("unsupported {kind} version {version}")]
    UnsupportedVersion { kind: &'static str, version: i32 },

    /// A file name did not follow the stream naming convention.
    #[error("invalid stream filename: {0}")]
    InvalidFilename(String),

    /// A balance CSV line could not be parsed.
    #[error("balance csv line {line}: {reason}")]
    Csv { line: usize, reason: String },

    /// Protobuf payload failed to decode.
    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    /// Structurally valid content with inconsistent values.
    #[error("invalid stream data: {0}")]
    InvalidData(String),

    /// I/O error (reading a file or decompressing).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<mirror_common::Error> for StreamError {
    fn from(err: mirror_common::Error) -> Self {
        StreamError::InvalidData(err.to_string())
    }
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
