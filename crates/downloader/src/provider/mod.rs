//! Storage backends that serve the files published by each node.
//!
//! Providers are stateless: they map `(node, path)` to bytes and classify
//! failures as [`ProviderError::NotFound`], [`ProviderError::Transient`] or
//! [`ProviderError::Permanent`].

mod http;
mod local;

pub use http::{HttpProviderConfig, HttpStreamFileProvider};
pub use local::LocalStreamFileProvider;

use async_trait::async_trait;
use bytes::Bytes;
use mirror_streams::{FileType, StreamFilename, StreamType};

use crate::address_book::ConsensusNode;
use crate::error::ProviderError;

/// Read access to the stream files of every node.
#[async_trait]
pub trait StreamFileProvider: Send + Sync {
    /// Fetches a file by its bucket-relative path.
    async fn get(&self, node: &ConsensusNode, path: &str) -> Result<Bytes, ProviderError>;

    /// Lists up to `limit` signature files of `stream_type` strictly newer
    /// than `after`, sorted by timestamp.
    async fn list_after(
        &self,
        node: &ConsensusNode,
        stream_type: StreamType,
        after: Option<&StreamFilename>,
        limit: usize,
    ) -> Result<Vec<StreamFilename>, ProviderError>;

    /// Fetches a file from a node's directory of the given stream type.
    async fn fetch(
        &self,
        node: &ConsensusNode,
        stream_type: StreamType,
        name: &str,
    ) -> Result<Bytes, ProviderError> {
        let path = format!("{}/{}", stream_type.node_directory(&node.node_account_id), name);
        self.get(node, &path).await
    }

    /// Fetches a sidecar from a node's sidecar directory.
    async fn fetch_sidecar(
        &self,
        node: &ConsensusNode,
        stream_type: StreamType,
        name: &str,
    ) -> Result<Bytes, ProviderError> {
        let path = format!(
            "{}/{}",
            stream_type.sidecar_directory(&node.node_account_id),
            name
        );
        self.get(node, &path).await
    }
}

/// Keeps the signature files of `stream_type` newer than `after`, sorted,
/// truncated to `limit`.
pub(crate) fn select_signatures<'a>(
    names: impl IntoIterator<Item = &'a str>,
    stream_type: StreamType,
    after: Option<&StreamFilename>,
    limit: usize,
) -> Vec<StreamFilename> {
    let after_ts = after.map(|a| a.timestamp());
    let mut selected: Vec<StreamFilename> = names
        .into_iter()
        .filter_map(|name| StreamFilename::parse(name).ok())
        .filter(|f| f.file_type() == FileType::Signature && f.stream_type() == stream_type)
        .filter(|f| after_ts.map(|ts| f.timestamp() > ts).unwrap_or(true))
        .collect();
    selected.sort();
    selected.dedup();
    selected.truncate(limit);
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_signatures_filters_and_sorts() {
        let names = [
            "2022-01-01T00_00_04.000000000Z.rcd_sig",
            "2022-01-01T00_00_02.000000000Z.rcd",
            "2022-01-01T00_00_02.000000000Z.rcd_sig",
            "2022-01-01T00_00_00.000000000Z.rcd_sig",
            "2022-01-01T00_00_06.000000000Z_Balances.csv_sig",
            "garbage",
        ];
        let after = StreamFilename::parse("2022-01-01T00_00_00.000000000Z.rcd_sig").unwrap();
        let selected = select_signatures(names, StreamType::Record, Some(&after), 10);
        let selected: Vec<_> = selected.iter().map(|f| f.name().to_string()).collect();
        assert_eq!(
            selected,
            vec![
                "2022-01-01T00_00_02.000000000Z.rcd_sig",
                "2022-01-01T00_00_04.000000000Z.rcd_sig"
            ]
        );
    }

    #[test]
    fn test_select_signatures_limit() {
        let names = [
            "2022-01-01T00_00_04.000000000Z.rcd_sig",
            "2022-01-01T00_00_02.000000000Z.rcd_sig",
        ];
        let selected = select_signatures(names, StreamType::Record, None, 1);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name(), "2022-01-01T00_00_02.000000000Z.rcd_sig");
    }
}
