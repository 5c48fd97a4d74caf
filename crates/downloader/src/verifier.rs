//! Verification of one node's signature file against its public key.

use mirror_streams::model::SignatureType;
use mirror_streams::StreamFileSignature;

use crate::address_book::ConsensusNode;
use crate::error::{DownloaderError, Result};

/// Checks node signatures. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier;

impl SignatureVerifier {
    /// Verifies the file hash signature and, when present, the metadata hash
    /// signature. On success the signature is stamped with the node id.
    pub fn verify(&self, node: &ConsensusNode, signature: &mut StreamFileSignature) -> Result<()> {
        let fail = |reason: String| DownloaderError::Verification {
            node_id: node.node_id,
            reason,
        };

        if signature.signature_type != SignatureType::Ed25519 {
            return Err(fail(format!(
                "unsupported signature type {:?}",
                signature.signature_type
            )));
        }

        node.public_key
            .verify(
                signature.file_hash.as_bytes(),
                &signature.file_hash_signature,
            )
            .map_err(|e| fail(format!("file hash: {}", e)))?;

        match (&signature.metadata_hash, &signature.metadata_hash_signature) {
            (Some(hash), Some(sig)) => node
                .public_key
                .verify(hash.as_bytes(), sig)
                .map_err(|e| fail(format!("metadata hash: {}", e)))?,
            (None, None) => {}
            _ => return Err(fail("metadata hash without signature".to_string())),
        }

        signature.node_id = Some(node.node_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mirror_common::{EntityId, Hash384};
    use mirror_crypto::NodeSigningKey;
    use mirror_streams::reader::{SignatureFileReader, StreamFileData};
    use mirror_streams::writer::write_signature;
    use mirror_streams::StreamFilename;

    fn node(key: &NodeSigningKey) -> ConsensusNode {
        ConsensusNode {
            node_id: 0,
            node_account_id: EntityId::new(0, 0, 3).unwrap(),
            public_key: key.public_key(),
            stake: 1,
            total_stake: 1,
        }
    }

    fn signature(version: u8, key: &NodeSigningKey) -> StreamFileSignature {
        let bytes = write_signature(
            version,
            &Hash384::hash(b"file"),
            Some(&Hash384::hash(b"meta")),
            key,
        );
        let name = StreamFilename::parse("2022-01-01T00_00_00.000000000Z.rcd_sig").unwrap();
        let data = StreamFileData::from_bytes(name, Bytes::from(bytes)).unwrap();
        SignatureFileReader.read(&data).unwrap()
    }

    #[test]
    fn test_valid_signatures_verify() {
        let key = NodeSigningKey::from_seed(&[1u8; 32]);
        for version in [2u8, 5, 6] {
            let mut sig = signature(version, &key);
            SignatureVerifier.verify(&node(&key), &mut sig).unwrap();
            assert_eq!(sig.node_id, Some(0));
        }
    }

    #[test]
    fn test_wrong_key_rejected() {
        let key = NodeSigningKey::from_seed(&[1u8; 32]);
        let other = NodeSigningKey::from_seed(&[2u8; 32]);
        let mut sig = signature(5, &key);
        let err = SignatureVerifier.verify(&node(&other), &mut sig).unwrap_err();
        assert!(matches!(err, DownloaderError::Verification { node_id: 0, .. }));
        assert_eq!(sig.node_id, None);
    }

    #[test]
    fn test_tampered_metadata_rejected() {
        let key = NodeSigningKey::from_seed(&[1u8; 32]);
        let mut sig = signature(6, &key);
        sig.metadata_hash = Some(Hash384::hash(b"other"));
        assert!(SignatureVerifier.verify(&node(&key), &mut sig).is_err());
    }
}
