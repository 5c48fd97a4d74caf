//! Version-dispatching stream file readers.
//!
//! Each reader inspects the leading bytes of a file (never its extension) and
//! picks a decoder from a static table. Decoders verify every embedded hash
//! and fail with a [`StreamError`] describing the first problem found.
//!
//! | File | Version source | Decoders |
//! |------|----------------|----------|
//! | record | leading `i32` | 1, 2, 5, 6 |
//! | signature | leading byte | 4 (v2), 5, 6 |
//! | balance | leading text | CSV v1, CSV v2, protobuf |
//! | sidecar | none | protobuf |

mod balance;
pub(crate) mod object_stream;
mod record_legacy;
mod record_v5;
mod record_v6;
mod sidecar;
mod signature;

use std::io::Read;
use std::path::Path;

use bytes::Bytes;
use flate2::read::GzDecoder;
use tracing::trace;

use crate::error::{Result, StreamError};
use crate::filename::StreamFilename;
use crate::model::{
    AccountBalanceFile, BalanceFormat, RecordFile, SidecarFile, StreamFile, StreamFileSignature,
};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Returns `true` if the bytes start with the gzip magic number.
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Decompresses a gzip payload.
pub fn decompress_gzip(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

/// A named file's content, decompressed if it arrived gzipped.
#[derive(Debug, Clone)]
pub struct StreamFileData {
    pub filename: StreamFilename,
    pub bytes: Bytes,
}

impl StreamFileData {
    pub fn from_bytes(filename: StreamFilename, raw: Bytes) -> Result<Self> {
        let bytes = if is_gzip(&raw) {
            Bytes::from(decompress_gzip(&raw)?)
        } else {
            raw
        };
        Ok(Self { filename, bytes })
    }

    /// Reads a stream file from disk; the file name must follow the stream
    /// naming convention.
    pub fn from_file(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StreamError::InvalidFilename(path.display().to_string()))?;
        let filename = StreamFilename::parse(name)?;
        let raw = std::fs::read(path)?;
        Self::from_bytes(filename, Bytes::from(raw))
    }
}

/// Decodes a data file of one stream type.
pub trait StreamFileReader: Send + Sync + 'static {
    type File: StreamFile;

    fn read(&self, data: &StreamFileData) -> Result<Self::File>;
}

type RecordDecoder = fn(&StreamFileData) -> Result<RecordFile>;

const RECORD_DECODERS: &[(i32, RecordDecoder)] = &[
    (1, record_legacy::read_v1),
    (2, record_legacy::read_v2),
    (record_v5::VERSION, record_v5::read),
    (record_v6::VERSION, record_v6::read),
];

/// Reader for record stream files of every supported version.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFileReader;

impl RecordFileReader {
    /// Leading version of a record file.
    pub fn version(bytes: &[u8]) -> Result<i32> {
        let head: [u8; 4] = bytes
            .get(..4)
            .and_then(|h| h.try_into().ok())
            .ok_or(StreamError::Truncated {
                context: "record file version",
                needed: 4,
                remaining: bytes.len(),
            })?;
        Ok(i32::from_be_bytes(head))
    }
}

impl StreamFileReader for RecordFileReader {
    type File = RecordFile;

    fn read(&self, data: &StreamFileData) -> Result<RecordFile> {
        let version = Self::version(&data.bytes)?;
        let decoder = RECORD_DECODERS
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, decoder)| *decoder)
            .ok_or(StreamError::UnsupportedVersion {
                kind: "record file",
                version,
            })?;
        trace!(file = %data.filename, version, "Reading record file");
        decoder(data)
    }
}

/// Reader for account balance files (CSV or protobuf).
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountBalanceFileReader;

impl StreamFileReader for AccountBalanceFileReader {
    type File = AccountBalanceFile;

    fn read(&self, data: &StreamFileData) -> Result<AccountBalanceFile> {
        let format = balance::detect(&data.bytes);
        trace!(file = %data.filename, format = format.as_str(), "Reading balance file");
        match format {
            BalanceFormat::CsvV1 | BalanceFormat::CsvV2 => balance::read_csv(data, format),
            BalanceFormat::Protobuf => balance::read_protobuf(data),
        }
    }
}

type SignatureDecoder = fn(&StreamFileData) -> Result<StreamFileSignature>;

const SIGNATURE_DECODERS: &[(u8, SignatureDecoder)] = &[
    (signature::V2_FILE_HASH_MARKER, signature::read_v2),
    (5, signature::read_v5),
    (6, signature::read_v6),
];

/// Reader for node signature files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureFileReader;

impl SignatureFileReader {
    pub fn read(&self, data: &StreamFileData) -> Result<StreamFileSignature> {
        let marker = *data.bytes.first().ok_or(StreamError::Truncated {
            context: "signature file version",
            needed: 1,
            remaining: 0,
        })?;
        let decoder = SIGNATURE_DECODERS
            .iter()
            .find(|(m, _)| *m == marker)
            .map(|(_, decoder)| *decoder)
            .ok_or(StreamError::UnsupportedVersion {
                kind: "signature file",
                version: i32::from(marker),
            })?;
        decoder(data)
    }
}

/// Reader for record sidecar files.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarFileReader;

impl SidecarFileReader {
    pub fn read(&self, data: &StreamFileData) -> Result<SidecarFile> {
        sidecar::read(data)
    }
}
