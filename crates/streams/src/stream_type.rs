//! Stream types and their storage layout.

use std::fmt;

use mirror_common::EntityId;
use serde::{Deserialize, Serialize};

/// Kind of stream published by consensus nodes.
///
/// Each type has its own bucket directory, node directory prefix and file
/// extensions. Types are ingested by independent schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    /// Transaction record stream.
    Record,
    /// Periodic account balance snapshots.
    Balance,
}

impl StreamType {
    pub const ALL: [StreamType; 2] = [StreamType::Record, StreamType::Balance];

    /// Top-level directory in the bucket.
    pub fn path(&self) -> &'static str {
        match self {
            StreamType::Record => "recordstreams",
            StreamType::Balance => "accountBalances",
        }
    }

    /// Prefix of each node's directory, followed by the node account id.
    pub fn node_prefix(&self) -> &'static str {
        match self {
            StreamType::Record => "record",
            StreamType::Balance => "balance",
        }
    }

    /// Suffix between the timestamp and the extension, if any.
    pub fn suffix(&self) -> &'static str {
        match self {
            StreamType::Record => "",
            StreamType::Balance => "_Balances",
        }
    }

    /// Data file extensions, newest format first.
    pub fn data_extensions(&self) -> &'static [&'static str] {
        match self {
            StreamType::Record => &["rcd"],
            StreamType::Balance => &["pb", "csv"],
        }
    }

    /// Whether each file commits to the hash of its predecessor.
    pub fn is_chained(&self) -> bool {
        matches!(self, StreamType::Record)
    }

    /// Upper-case name used in storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Record => "RECORD",
            StreamType::Balance => "BALANCE",
        }
    }

    /// Directory holding one node's files, e.g. `recordstreams/record0.0.3`.
    pub fn node_directory(&self, node_account: &EntityId) -> String {
        format!("{}/{}{}", self.path(), self.node_prefix(), node_account)
    }

    /// Directory holding one node's sidecar files.
    pub fn sidecar_directory(&self, node_account: &EntityId) -> String {
        format!("{}/sidecar", self.node_directory(node_account))
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StreamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "record" => Ok(StreamType::Record),
            "balance" => Ok(StreamType::Balance),
            other => Err(format!("unknown stream type: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_directory() {
        let node = EntityId::new(0, 0, 3).unwrap();
        assert_eq!(
            StreamType::Record.node_directory(&node),
            "recordstreams/record0.0.3"
        );
        assert_eq!(
            StreamType::Balance.node_directory(&node),
            "accountBalances/balance0.0.3"
        );
        assert_eq!(
            StreamType::Record.sidecar_directory(&node),
            "recordstreams/record0.0.3/sidecar"
        );
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("RECORD".parse::<StreamType>().unwrap(), StreamType::Record);
        assert_eq!(StreamType::Balance.to_string(), "BALANCE");
        assert!("blocks".parse::<StreamType>().is_err());
    }
}
