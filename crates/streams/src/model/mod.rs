//! Stream file model.
//!
//! [`StreamFile`] is the common view the downloader needs of every decoded
//! data file: identity, hashes for consensus and chaining, and the hooks for
//! attaching data fetched after the file itself.

mod balance;
mod record;
mod sidecar;
mod signature;
mod transaction_type;

pub use balance::{AccountBalance, AccountBalanceFile, BalanceFormat, TokenBalance};
pub(crate) use record::{record_timestamp, RawRecordItem};
pub use record::{
    decode_transaction_body, HapiVersion, ParentContext, RecordFile, RecordItem, RecordItems,
    SidecarMetadata,
};
pub use sidecar::{SidecarFile, SidecarKind, SidecarRecord};
pub use signature::{SignatureType, StreamFileSignature};
pub use transaction_type::TransactionType;

use mirror_common::Hash384;

use crate::stream_type::StreamType;

/// A decoded, hash-verified data file of some stream type.
///
/// Identity is `consensus_end`; it strictly increases within a stream type.
pub trait StreamFile: Send + 'static {
    fn stream_type() -> StreamType
    where
        Self: Sized;

    fn name(&self) -> &str;

    fn consensus_start(&self) -> i64;

    fn consensus_end(&self) -> i64;

    /// Number of items.
    fn count(&self) -> u64;

    /// SHA-384 of the file bytes.
    fn file_hash(&self) -> Hash384;

    /// Hash of the file metadata, for formats that sign one.
    fn metadata_hash(&self) -> Option<Hash384> {
        None
    }

    /// Hash the next file in the stream must chain from.
    fn hash(&self) -> Hash384 {
        self.file_hash()
    }

    /// Hash this file chains from, for chained streams.
    fn previous_hash(&self) -> Option<Hash384> {
        None
    }

    fn index(&self) -> Option<i64> {
        None
    }

    fn set_index(&mut self, _index: i64) {}

    fn node_id(&self) -> Option<i64>;

    fn set_node_id(&mut self, node_id: i64);

    /// Drops the raw file bytes once they are no longer needed.
    fn clear_bytes(&mut self);

    fn sidecar_metadata(&self) -> &[SidecarMetadata] {
        &[]
    }

    fn attach_sidecars(&mut self, _sidecars: Vec<SidecarFile>) {}
}
