//! Node key types.
//!
//! Each consensus node signs the stream files it publishes with its Ed25519
//! key. The address book carries the public half of every node's key:
//!
//! - [`NodePublicKey`]: a 32-byte Ed25519 verifying key, hex-encoded in
//!   configuration and address book files
//! - [`NodeSigningKey`]: a signing key, used by local single-node networks and
//!   by tests that need to produce valid signature files

use std::fmt;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// An Ed25519 public key belonging to a consensus node.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePublicKey(VerifyingKey);

impl NodePublicKey {
    /// Creates a public key from raw 32-byte Ed25519 key material.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPublicKey`] if the bytes are not a valid
    /// curve point.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let key = VerifyingKey::from_bytes(bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(key))
    }

    /// Parses a hex-encoded public key.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s.trim()).map_err(|_| CryptoError::InvalidHex)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidLength {
                expected: 32,
                got: bytes.len(),
            })?;
        Self::from_bytes(&arr)
    }

    /// Returns the raw 32-byte key material.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Hex rendering of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Verifies a signature over a message.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidLength`] if the signature is not 64 bytes
    /// and [`CryptoError::InvalidSignature`] if verification fails.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let bytes: [u8; SIGNATURE_LEN] =
            signature
                .try_into()
                .map_err(|_| CryptoError::InvalidLength {
                    expected: SIGNATURE_LEN,
                    got: signature.len(),
                })?;
        let sig = ed25519_dalek::Signature::from_bytes(&bytes);
        self.0
            .verify(message, &sig)
            .map_err(|_| CryptoError::InvalidSignature)
    }
}

impl fmt::Debug for NodePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodePublicKey({})", self.to_hex())
    }
}

impl fmt::Display for NodePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for NodePublicKey {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<NodePublicKey> for String {
    fn from(key: NodePublicKey) -> Self {
        key.to_hex()
    }
}

/// An Ed25519 signing key for a (local or test) consensus node.
pub struct NodeSigningKey {
    inner: SigningKey,
}

impl NodeSigningKey {
    /// Creates a signing key from a 32-byte seed. Deterministic.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            inner: SigningKey::from_bytes(seed),
        }
    }

    /// Signs a message, producing a 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.inner.sign(message).to_bytes().to_vec()
    }

    /// Derives the public key.
    pub fn public_key(&self) -> NodePublicKey {
        NodePublicKey(self.inner.verifying_key())
    }
}

impl fmt::Debug for NodeSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeSigningKey({})", self.public_key().to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = NodeSigningKey::from_seed(&[1u8; 32]);
        let sig = key.sign(b"hash");
        assert_eq!(sig.len(), SIGNATURE_LEN);
        assert!(key.public_key().verify(b"hash", &sig).is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let key = NodeSigningKey::from_seed(&[1u8; 32]);
        let sig = key.sign(b"hash");
        assert!(matches!(
            key.public_key().verify(b"other", &sig),
            Err(CryptoError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let a = NodeSigningKey::from_seed(&[1u8; 32]);
        let b = NodeSigningKey::from_seed(&[2u8; 32]);
        let sig = a.sign(b"hash");
        assert!(b.public_key().verify(b"hash", &sig).is_err());
    }

    #[test]
    fn test_short_signature_rejected() {
        let key = NodeSigningKey::from_seed(&[1u8; 32]);
        assert!(matches!(
            key.public_key().verify(b"hash", &[0u8; 10]),
            Err(CryptoError::InvalidLength { expected: 64, got: 10 })
        ));
    }

    #[test]
    fn test_hex_roundtrip_and_serde() {
        let public = NodeSigningKey::from_seed(&[9u8; 32]).public_key();
        let parsed = NodePublicKey::from_hex(&public.to_hex()).unwrap();
        assert_eq!(parsed, public);

        let json = serde_json::to_string(&public).unwrap();
        let back: NodePublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, public);
    }

    #[test]
    fn test_bad_hex_rejected() {
        assert!(matches!(
            NodePublicKey::from_hex("zz"),
            Err(CryptoError::InvalidHex)
        ));
        assert!(matches!(
            NodePublicKey::from_hex("abcd"),
            Err(CryptoError::InvalidLength { .. })
        ));
    }
}
