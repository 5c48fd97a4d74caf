//! Consensus node roster.
//!
//! An [`AddressBook`] is an immutable snapshot of the nodes allowed to sign
//! stream files, with their public keys and stake. The [`NodeDirectory`]
//! holds the current snapshot and swaps it atomically on refresh; each
//! downloader tick works against one snapshot from start to end.
//!
//! Address books are loaded from JSON:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "node_id": 0, "node_account_id": "0.0.3", "public_key": "<hex>", "stake": 25 }
//!   ]
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use mirror_common::EntityId;
use mirror_crypto::NodePublicKey;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DownloaderError, Result};

/// One consensus node as listed in the address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusNode {
    pub node_id: i64,
    pub node_account_id: EntityId,
    pub public_key: NodePublicKey,
    #[serde(default)]
    pub stake: i64,
    /// Sum of all nodes' stake; filled in when the book is built.
    #[serde(default, skip_serializing)]
    pub total_stake: i64,
}

#[derive(Debug, Deserialize, Serialize)]
struct AddressBookFile {
    nodes: Vec<ConsensusNode>,
}

/// Immutable roster snapshot, ordered by node id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBook {
    nodes: Vec<ConsensusNode>,
    total_stake: i64,
}

impl AddressBook {
    /// Builds a book; node ids must be unique and stakes non-negative.
    pub fn new(mut nodes: Vec<ConsensusNode>) -> Result<Self> {
        nodes.sort_by_key(|n| n.node_id);
        if let Some(pair) = nodes.windows(2).find(|w| w[0].node_id == w[1].node_id) {
            return Err(DownloaderError::AddressBook(format!(
                "duplicate node id {}",
                pair[0].node_id
            )));
        }
        if let Some(node) = nodes.iter().find(|n| n.stake < 0) {
            return Err(DownloaderError::AddressBook(format!(
                "node {} has negative stake",
                node.node_id
            )));
        }
        let total_stake = nodes
            .iter()
            .try_fold(0i64, |total, n| total.checked_add(n.stake))
            .ok_or_else(|| DownloaderError::AddressBook("total stake overflows".into()))?;
        for node in &mut nodes {
            node.total_stake = total_stake;
        }
        Ok(Self { nodes, total_stake })
    }

    /// Parses a JSON address book.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: AddressBookFile = serde_json::from_str(json)
            .map_err(|e| DownloaderError::AddressBook(e.to_string()))?;
        Self::new(file.nodes)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        let file = AddressBookFile {
            nodes: self.nodes.clone(),
        };
        serde_json::to_string_pretty(&file).map_err(|e| DownloaderError::AddressBook(e.to_string()))
    }

    pub fn nodes(&self) -> &[ConsensusNode] {
        &self.nodes
    }

    pub fn node(&self, node_id: i64) -> Option<&ConsensusNode> {
        self.nodes
            .binary_search_by_key(&node_id, |n| n.node_id)
            .ok()
            .map(|i| &self.nodes[i])
    }

    pub fn total_stake(&self) -> i64 {
        self.total_stake
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Holder of the current address book snapshot.
#[derive(Debug, Default)]
pub struct NodeDirectory {
    current: RwLock<Arc<AddressBook>>,
}

impl NodeDirectory {
    pub fn new(book: AddressBook) -> Self {
        Self {
            current: RwLock::new(Arc::new(book)),
        }
    }

    /// Current snapshot. Callers keep it for the duration of a tick.
    pub fn snapshot(&self) -> Arc<AddressBook> {
        Arc::clone(&self.current.read())
    }

    /// Replaces the snapshot; returns `true` if the roster changed.
    pub fn update(&self, book: AddressBook) -> bool {
        let mut current = self.current.write();
        if **current == book {
            return false;
        }
        info!(
            nodes = book.len(),
            total_stake = book.total_stake(),
            "Address book updated"
        );
        *current = Arc::new(book);
        true
    }

    /// Reloads the snapshot from a JSON file.
    pub fn refresh_from_file(&self, path: &Path) -> Result<bool> {
        let book = AddressBook::load(path)?;
        Ok(self.update(book))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_crypto::NodeSigningKey;

    fn node(node_id: i64, stake: i64) -> ConsensusNode {
        ConsensusNode {
            node_id,
            node_account_id: EntityId::new(0, 0, node_id + 3).unwrap(),
            public_key: NodeSigningKey::from_seed(&[node_id as u8; 32]).public_key(),
            stake,
            total_stake: 0,
        }
    }

    #[test]
    fn test_book_sorted_with_total_stake() {
        let book = AddressBook::new(vec![node(2, 10), node(0, 5), node(1, 5)]).unwrap();
        let ids: Vec<_> = book.nodes().iter().map(|n| n.node_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(book.total_stake(), 20);
        assert!(book.nodes().iter().all(|n| n.total_stake == 20));
        assert_eq!(book.node(2).unwrap().stake, 10);
        assert!(book.node(9).is_none());
    }

    #[test]
    fn test_duplicate_and_negative_rejected() {
        assert!(AddressBook::new(vec![node(0, 1), node(0, 2)]).is_err());
        assert!(AddressBook::new(vec![node(0, -1)]).is_err());
    }

    #[test]
    fn test_total_stake_overflow_rejected() {
        let err = AddressBook::new(vec![node(0, i64::MAX), node(1, 1)]).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }

    #[test]
    fn test_json_roundtrip() {
        let book = AddressBook::new(vec![node(0, 5), node(1, 7)]).unwrap();
        let json = book.to_json().unwrap();
        assert_eq!(AddressBook::from_json(&json).unwrap(), book);
    }

    #[test]
    fn test_directory_snapshot_is_stable() {
        let directory = NodeDirectory::new(AddressBook::new(vec![node(0, 1)]).unwrap());
        let before = directory.snapshot();
        assert!(directory.update(AddressBook::new(vec![node(0, 1), node(1, 1)]).unwrap()));
        assert_eq!(before.len(), 1);
        assert_eq!(directory.snapshot().len(), 2);
        assert!(!directory.update(AddressBook::new(vec![node(0, 1), node(1, 1)]).unwrap()));
    }
}
