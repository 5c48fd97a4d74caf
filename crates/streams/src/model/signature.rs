//! Signature files published next to each stream file.

use mirror_common::Hash384;

use crate::filename::StreamFilename;

/// Algorithm of a node signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureType {
    Ed25519,
}

impl SignatureType {
    /// Numeric code stored in v5 and v6 signature objects.
    pub const fn code(&self) -> i32 {
        match self {
            SignatureType::Ed25519 => 1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(SignatureType::Ed25519),
            _ => None,
        }
    }
}

/// Parsed content of one node's signature file.
///
/// Version 2 files only sign the file hash; version 5 and 6 files also sign
/// a metadata hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFileSignature {
    pub filename: StreamFilename,
    pub version: u8,
    pub signature_type: SignatureType,
    pub file_hash: Hash384,
    pub file_hash_signature: Vec<u8>,
    pub metadata_hash: Option<Hash384>,
    pub metadata_hash_signature: Option<Vec<u8>>,
    /// Node that published the file; set by the downloader.
    pub node_id: Option<i64>,
}

impl StreamFileSignature {
    /// Hash the consensus vote is taken on.
    pub fn consensus_hash(&self) -> Hash384 {
        self.file_hash
    }
}
