//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Invalid public key.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Invalid signature.
    #[error("invalid signature")]
    InvalidSignature,

    /// Invalid hex encoding.
    #[error("invalid hex encoding")]
    InvalidHex,

    /// Invalid length.
    #[error("invalid length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
}
