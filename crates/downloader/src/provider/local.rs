//! Provider reading a mirrored bucket from the local filesystem.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use mirror_streams::{StreamFilename, StreamType};

use super::{select_signatures, StreamFileProvider};
use crate::address_book::ConsensusNode;
use crate::error::ProviderError;

/// Serves files from `<root>/<path>`.
#[derive(Debug, Clone)]
pub struct LocalStreamFileProvider {
    root: PathBuf,
}

impl LocalStreamFileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

fn classify(path: &str, err: std::io::Error) -> ProviderError {
    match err.kind() {
        ErrorKind::NotFound => ProviderError::NotFound(path.to_string()),
        ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock => {
            ProviderError::Transient(format!("{}: {}", path, err))
        }
        _ => ProviderError::Permanent(format!("{}: {}", path, err)),
    }
}

#[async_trait]
impl StreamFileProvider for LocalStreamFileProvider {
    async fn get(&self, _node: &ConsensusNode, path: &str) -> Result<Bytes, ProviderError> {
        let full = self.root.join(path);
        let data = tokio::fs::read(&full).await.map_err(|e| classify(path, e))?;
        Ok(Bytes::from(data))
    }

    async fn list_after(
        &self,
        node: &ConsensusNode,
        stream_type: StreamType,
        after: Option<&StreamFilename>,
        limit: usize,
    ) -> Result<Vec<StreamFilename>, ProviderError> {
        let dir = stream_type.node_directory(&node.node_account_id);
        let mut entries = match tokio::fs::read_dir(self.root.join(&dir)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(classify(&dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| classify(&dir, e))? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(select_signatures(
            names.iter().map(String::as_str),
            stream_type,
            after,
            limit,
        ))
    }
}
