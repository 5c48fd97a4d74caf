//! Cryptographic primitives for the mirror node.
//!
//! Consensus nodes publish a signature file next to every stream file. The
//! signature covers the SHA-384 hash of the stream file (and, for newer
//! formats, a hash of its metadata). This crate provides:
//!
//! - **SHA-384 hashing**: single-shot ([`sha384`], [`sha384_multi`]) and
//!   streaming ([`Sha384Hasher`])
//! - **Node keys**: [`NodePublicKey`] for verifying node signatures and
//!   [`NodeSigningKey`] for producing them in tests and local networks
//!
//! # Example
//!
//! ```
//! use mirror_crypto::{sha384, NodeSigningKey};
//!
//! let key = NodeSigningKey::from_seed(&[7u8; 32]);
//! let hash = sha384(b"stream file bytes");
//! let signature = key.sign(hash.as_bytes());
//!
//! assert!(key.public_key().verify(hash.as_bytes(), &signature).is_ok());
//! ```

mod error;
mod hash;
mod keys;

pub use error::CryptoError;
pub use hash::{sha384, sha384_multi, Sha384Hasher};
pub use keys::{NodePublicKey, NodeSigningKey, SIGNATURE_LEN};
