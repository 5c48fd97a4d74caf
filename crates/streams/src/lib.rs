//! Stream files published by consensus nodes.
//!
//! Consensus nodes write the ledger's history as a sequence of files per
//! stream type, each accompanied by a per-node signature file. This crate
//! knows how those files are named, how every historical version is laid out,
//! and how to decode them into a [`StreamFile`] whose hashes have been
//! checked.
//!
//! # Overview
//!
//! - [`StreamFilename`] / [`StreamType`]: naming and storage layout
//! - [`reader`]: version-dispatching readers for record, balance, signature
//!   and sidecar files
//! - [`model`]: the decoded file types; record items are decoded lazily and
//!   can be consumed once
//! - [`proto`]: protobuf wire types
//! - [`writer`]: producers of valid files of every version
//!
//! # Example
//!
//! ```
//! use mirror_streams::reader::{SignatureFileReader, StreamFileData};
//! use mirror_streams::writer::write_signature;
//! use mirror_streams::StreamFilename;
//! use mirror_common::Hash384;
//! use mirror_crypto::NodeSigningKey;
//!
//! let key = NodeSigningKey::from_seed(&[3u8; 32]);
//! let hash = Hash384::hash(b"file");
//! let bytes = write_signature(2, &hash, None, &key);
//!
//! let name = StreamFilename::parse("2022-01-01T00_00_00.000000000Z.rcd_sig").unwrap();
//! let data = StreamFileData::from_bytes(name, bytes.into()).unwrap();
//! let signature = SignatureFileReader.read(&data).unwrap();
//! assert_eq!(signature.file_hash, hash);
//! ```

mod byte_reader;
mod error;
mod filename;
pub mod model;
pub mod proto;
pub mod reader;
mod stream_type;
pub mod writer;

pub use byte_reader::ByteReader;
pub use error::{Result, StreamError};
pub use filename::{FileType, StreamFilename};
pub use model::{
    AccountBalance, AccountBalanceFile, RecordFile, RecordItem, SidecarFile, StreamFile,
    StreamFileSignature, TransactionType,
};
pub use stream_type::StreamType;
