//! SHA-384 hashing utilities.
//!
//! All stream file, running hash and metadata hash computations use SHA-384.
//! Functions return [`Hash384`], a 48-byte hash value.
//!
//! ```
//! use mirror_crypto::{sha384, sha384_multi};
//!
//! assert_eq!(sha384(b"helloworld"), sha384_multi(&[b"hello", b"world"]));
//! ```

use mirror_common::{Hash384, HASH384_LEN};
use sha2::{Digest, Sha384};

/// Computes the SHA-384 hash of the given data.
pub fn sha384(data: &[u8]) -> Hash384 {
    Hash384::hash(data)
}

/// Computes the SHA-384 hash of several chunks as if they were concatenated.
pub fn sha384_multi(chunks: &[&[u8]]) -> Hash384 {
    let mut hasher = Sha384Hasher::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    hasher.finalize()
}

/// Streaming SHA-384 hasher for data that arrives in pieces.
///
/// Running hashes are built by feeding the previous running hash followed by
/// the next object's hash, so the hasher is used far more often than the
/// one-shot helpers.
pub struct Sha384Hasher {
    inner: Sha384,
}

impl Sha384Hasher {
    /// Creates a new hasher.
    pub fn new() -> Self {
        Self {
            inner: Sha384::new(),
        }
    }

    /// Feeds data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Feeds a big-endian `i32`.
    pub fn update_i32(&mut self, value: i32) {
        self.inner.update(value.to_be_bytes());
    }

    /// Feeds a big-endian `i64`.
    pub fn update_i64(&mut self, value: i64) {
        self.inner.update(value.to_be_bytes());
    }

    /// Consumes the hasher and returns the digest.
    pub fn finalize(self) -> Hash384 {
        let result = self.inner.finalize();
        let mut bytes = [0u8; HASH384_LEN];
        bytes.copy_from_slice(&result);
        Hash384(bytes)
    }
}

impl Default for Sha384Hasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_matches_single_shot() {
        let mut hasher = Sha384Hasher::new();
        hasher.update(b"record");
        hasher.update(b"stream");
        assert_eq!(hasher.finalize(), sha384(b"recordstream"));
    }

    #[test]
    fn test_integer_updates_are_big_endian() {
        let mut hasher = Sha384Hasher::new();
        hasher.update_i32(5);
        hasher.update_i64(-1);
        let mut expected = Vec::new();
        expected.extend_from_slice(&5i32.to_be_bytes());
        expected.extend_from_slice(&(-1i64).to_be_bytes());
        assert_eq!(hasher.finalize(), sha384(&expected));
    }
}
