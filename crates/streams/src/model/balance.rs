//! Account balance snapshot files.

use std::fmt;

use bytes::Bytes;
use mirror_common::{EntityId, Hash384};

use super::StreamFile;
use crate::stream_type::StreamType;

/// Layout of a balance file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BalanceFormat {
    CsvV1,
    CsvV2,
    Protobuf,
}

impl BalanceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceFormat::CsvV1 => "csv_v1",
            BalanceFormat::CsvV2 => "csv_v2",
            BalanceFormat::Protobuf => "protobuf",
        }
    }
}

/// Balance of one token held by an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalance {
    pub token_id: EntityId,
    pub balance: i64,
}

/// One account row of a balance snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountBalance {
    pub consensus_timestamp: i64,
    pub account_id: EntityId,
    pub balance: i64,
    pub token_balances: Vec<TokenBalance>,
}

/// A decoded account balance file.
pub struct AccountBalanceFile {
    pub name: String,
    pub format: BalanceFormat,
    pub consensus_timestamp: i64,
    pub count: u64,
    pub file_hash: Hash384,
    pub node_id: Option<i64>,
    pub size: usize,
    pub bytes: Option<Bytes>,
    items: Option<Vec<AccountBalance>>,
}

impl AccountBalanceFile {
    pub(crate) fn new(
        name: String,
        format: BalanceFormat,
        consensus_timestamp: i64,
        file_hash: Hash384,
        bytes: Bytes,
        items: Vec<AccountBalance>,
    ) -> Self {
        Self {
            name,
            format,
            consensus_timestamp,
            count: items.len() as u64,
            file_hash,
            node_id: None,
            size: bytes.len(),
            bytes: Some(bytes),
            items: Some(items),
        }
    }

    /// Moves the balance rows out of the file; later calls yield nothing.
    pub fn take_items(&mut self) -> std::vec::IntoIter<AccountBalance> {
        self.items.take().unwrap_or_default().into_iter()
    }
}

impl fmt::Debug for AccountBalanceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountBalanceFile")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("consensus_timestamp", &self.consensus_timestamp)
            .field("count", &self.count)
            .field("file_hash", &self.file_hash)
            .finish()
    }
}

impl StreamFile for AccountBalanceFile {
    fn stream_type() -> StreamType {
        StreamType::Balance
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn consensus_start(&self) -> i64 {
        self.consensus_timestamp
    }

    fn consensus_end(&self) -> i64 {
        self.consensus_timestamp
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn file_hash(&self) -> Hash384 {
        self.file_hash
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
}
