//! Record files and their lazily decoded items.

use std::fmt;

use bytes::Bytes;
use mirror_common::Hash384;
use prost::Message;

use super::sidecar::{SidecarFile, SidecarKind};
use super::transaction_type::TransactionType;
use super::StreamFile;
use crate::error::{Result, StreamError};
use crate::proto::{SignedTransaction, Transaction, TransactionBody, TransactionRecord};
use crate::stream_type::StreamType;

/// API version of the node that produced a record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct HapiVersion {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

impl HapiVersion {
    pub fn new(major: i32, minor: i32, patch: i32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for HapiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Sidecar announced by a record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarMetadata {
    pub id: u32,
    pub hash: Hash384,
    pub types: Vec<SidecarKind>,
}

/// Undecoded transaction and record bytes of one item.
#[derive(Clone)]
pub(crate) struct RawRecordItem {
    pub transaction: Bytes,
    pub record: Bytes,
}

/// A decoded record stream file.
///
/// The summary fields are populated eagerly while the file is read and its
/// hashes are verified. Items stay as undecoded byte slices until
/// [`RecordFile::take_items`] is called.
pub struct RecordFile {
    pub name: String,
    pub version: i32,
    pub hapi_version: HapiVersion,
    pub consensus_start: i64,
    pub consensus_end: i64,
    pub count: u64,
    /// Chain hash: whole-file hash for legacy files, end running hash otherwise.
    pub hash: Hash384,
    pub previous_hash: Hash384,
    /// SHA-384 of the file bytes; what nodes sign.
    pub file_hash: Hash384,
    pub metadata_hash: Option<Hash384>,
    /// Block number; embedded in v6 files, assigned on ingest otherwise.
    pub index: Option<i64>,
    pub node_id: Option<i64>,
    pub size: usize,
    pub bytes: Option<Bytes>,
    pub sidecar_metadata: Vec<SidecarMetadata>,
    pub sidecars: Vec<SidecarFile>,
    items: Option<Vec<RawRecordItem>>,
}

impl RecordFile {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        version: i32,
        hapi_version: HapiVersion,
        hash: Hash384,
        previous_hash: Hash384,
        file_hash: Hash384,
        bytes: Bytes,
        items: Vec<RawRecordItem>,
    ) -> Result<Self> {
        let (first, last) = match (items.first(), items.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(StreamError::InvalidData(format!(
                    "record file {} contains no items",
                    name
                )))
            }
        };
        let consensus_start = record_timestamp(&first.record)?;
        let consensus_end = record_timestamp(&last.record)?;

        Ok(Self {
            name,
            version,
            hapi_version,
            consensus_start,
            consensus_end,
            count: items.len() as u64,
            hash,
            previous_hash,
            file_hash,
            metadata_hash: None,
            index: None,
            node_id: None,
            size: bytes.len(),
            bytes: Some(bytes),
            sidecar_metadata: Vec::new(),
            sidecars: Vec::new(),
            items: Some(items),
        })
    }

    /// Moves the item stream out of the file.
    ///
    /// Items can be consumed once; later calls return an empty stream.
    pub fn take_items(&mut self) -> RecordItems {
        RecordItems {
            inner: self.items.take().unwrap_or_default().into_iter(),
            hapi_version: self.hapi_version,
            index: 0,
            parent: None,
        }
    }

    /// Whether the item stream has not been taken yet.
    pub fn has_items(&self) -> bool {
        self.items.is_some()
    }
}

impl fmt::Debug for RecordFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordFile")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("consensus_start", &self.consensus_start)
            .field("consensus_end", &self.consensus_end)
            .field("count", &self.count)
            .field("hash", &self.hash)
            .field("previous_hash", &self.previous_hash)
            .field("index", &self.index)
            .field("items_taken", &self.items.is_none())
            .finish()
    }
}

impl StreamFile for RecordFile {
    fn stream_type() -> StreamType {
        StreamType::Record
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn consensus_start(&self) -> i64 {
        self.consensus_start
    }

    fn consensus_end(&self) -> i64 {
        self.consensus_end
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn file_hash(&self) -> Hash384 {
        self.file_hash
    }

    fn metadata_hash(&self) -> Option<Hash384> {
        self.metadata_hash
    }

    fn hash(&self) -> Hash384 {
        self.hash
    }

    fn previous_hash(&self) -> Option<Hash384> {
        Some(self.previous_hash)
    }

    fn index(&self) -> Option<i64> {
        self.index
    }

    fn set_index(&mut self, index: i64) {
        self.index = Some(index);
    }

    fn node_id(&self) -> Option<i64> {
        self.node_id
    }

    fn set_node_id(&mut self, node_id: i64) {
        self.node_id = Some(node_id);
    }

    fn clear_bytes(&mut self) {
        self.bytes = None;
    }

    fn sidecar_metadata(&self) -> &[SidecarMetadata] {
        &self.sidecar_metadata
    }

    fn attach_sidecars(&mut self, sidecars: Vec<SidecarFile>) {
        self.sidecars = sidecars;
    }
}

/// Consensus timestamp and outcome of the parent of a child transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentContext {
    pub consensus_timestamp: i64,
    pub successful: bool,
}

/// One decoded transaction with its record.
#[derive(Debug, Clone)]
pub struct RecordItem {
    /// Position within the file, starting at zero.
    pub index: usize,
    pub consensus_timestamp: i64,
    pub transaction_type: TransactionType,
    pub body: TransactionBody,
    pub record: TransactionRecord,
    pub transaction_bytes: Bytes,
    pub record_bytes: Bytes,
    pub hapi_version: HapiVersion,
    pub parent: Option<ParentContext>,
}

impl RecordItem {
    /// Response code from the receipt.
    pub fn status(&self) -> i32 {
        self.record.receipt.as_ref().map(|r| r.status).unwrap_or_default()
    }

    /// Successful when its own receipt and its parent (if any) succeeded.
    pub fn is_successful(&self) -> bool {
        let own = self
            .record
            .receipt
            .as_ref()
            .map(|r| r.is_success())
            .unwrap_or(false);
        own && self.parent.map(|p| p.successful).unwrap_or(true)
    }

    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    pub fn parent_consensus_timestamp(&self) -> Option<i64> {
        self.parent.map(|p| p.consensus_timestamp)
    }
}

/// Single-pass iterator decoding record items in file order.
///
/// Child items (records carrying a parent consensus timestamp) are linked to
/// the most recent top-level item with that timestamp.
pub struct RecordItems {
    inner: std::vec::IntoIter<RawRecordItem>,
    hapi_version: HapiVersion,
    index: usize,
    parent: Option<ParentContext>,
}

impl RecordItems {
    /// Number of items not yet yielded.
    pub fn remaining(&self) -> usize {
        self.inner.len()
    }

    fn decode(&mut self, raw: RawRecordItem) -> Result<RecordItem> {
        let record = TransactionRecord::decode(raw.record.clone())?;
        let body = decode_transaction_body(&raw.transaction)?;
        let consensus_timestamp = record
            .consensus_timestamp
            .as_ref()
            .ok_or_else(|| StreamError::InvalidData("record without consensus timestamp".into()))?
            .to_nanos()?;

        let parent = match &record.parent_consensus_timestamp {
            Some(ts) => {
                let parent_ts = ts.to_nanos()?;
                match self.parent {
                    Some(p) if p.consensus_timestamp == parent_ts => Some(p),
                    _ => {
                        return Err(StreamError::InvalidData(format!(
                            "child at {} references unknown parent {}",
                            consensus_timestamp, parent_ts
                        )))
                    }
                }
            }
            None => None,
        };

        let item = RecordItem {
            index: self.index,
            consensus_timestamp,
            transaction_type: TransactionType::of(&body),
            body,
            record,
            transaction_bytes: raw.transaction,
            record_bytes: raw.record,
            hapi_version: self.hapi_version,
            parent,
        };
        if parent.is_none() {
            self.parent = Some(ParentContext {
                consensus_timestamp,
                successful: item.is_successful(),
            });
        }
        self.index += 1;
        Ok(item)
    }
}

impl Iterator for RecordItems {
    type Item = Result<RecordItem>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = self.inner.next()?;
        Some(self.decode(raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Decodes `Transaction -> SignedTransaction -> TransactionBody`.
pub fn decode_transaction_body(transaction: &[u8]) -> Result<TransactionBody> {
    let envelope = Transaction::decode(transaction)?;
    let signed = SignedTransaction::decode(envelope.signed_transaction_bytes.as_slice())?;
    Ok(TransactionBody::decode(signed.body_bytes.as_slice())?)
}

/// Reads only the consensus timestamp of an encoded record.
pub(crate) fn record_timestamp(record: &[u8]) -> Result<i64> {
    let record = TransactionRecord::decode(record)?;
    let ts = record
        .consensus_timestamp
        .ok_or_else(|| StreamError::InvalidData("record without consensus timestamp".into()))?;
    Ok(ts.to_nanos()?)
}
