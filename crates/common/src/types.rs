//! Fundamental value types shared by every mirror node crate.
//!
//! - [`Hash384`]: a 48-byte SHA-384 digest. Stream files, running hashes and
//!   signed payloads are all identified by SHA-384.
//! - [`EntityId`]: a ledger entity identifier written `shard.realm.num` and
//!   stored as a single encoded `i64`.

use sha2::{Digest, Sha384};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Length in bytes of a SHA-384 digest.
pub const HASH384_LEN: usize = 48;

/// A 48-byte SHA-384 hash.
///
/// # Examples
///
/// ```rust
/// use mirror_common::Hash384;
///
/// let hash = Hash384::hash(b"hello world");
/// assert!(!hash.is_zero());
///
/// let parsed = Hash384::from_hex(&hash.to_hex()).unwrap();
/// assert_eq!(hash, parsed);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash384(pub [u8; HASH384_LEN]);

impl Hash384 {
    /// The zero hash. Used as the previous hash of the first file in a stream.
    pub const ZERO: Self = Self([0u8; HASH384_LEN]);

    /// Compute the SHA-384 hash of arbitrary data.
    pub fn hash(data: &[u8]) -> Self {
        let mut hasher = Sha384::new();
        hasher.update(data);
        Self::from_digest(&hasher.finalize())
    }

    pub(crate) fn from_digest(digest: &[u8]) -> Self {
        let mut bytes = [0u8; HASH384_LEN];
        bytes.copy_from_slice(digest);
        Self(bytes)
    }

    /// Returns a reference to the underlying 48-byte array.
    pub fn as_bytes(&self) -> &[u8; HASH384_LEN] {
        &self.0
    }

    /// Creates a `Hash384` from a 48-byte array.
    pub fn from_bytes(bytes: [u8; HASH384_LEN]) -> Self {
        Self(bytes)
    }

    /// Creates a `Hash384` from a slice, failing unless it is exactly 48 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != HASH384_LEN {
            return Err(Error::InvalidData(format!(
                "hash must be {} bytes, got {}",
                HASH384_LEN,
                bytes.len()
            )));
        }
        Ok(Self::from_digest(bytes))
    }

    /// Creates a `Hash384` from a 96 character hexadecimal string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != HASH384_LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        Ok(Self::from_digest(&bytes))
    }

    /// Converts the hash to a lowercase hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Returns `true` if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH384_LEN]
    }
}

impl Default for Hash384 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for Hash384 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash384({})", self.to_hex())
    }
}

impl fmt::Display for Hash384 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Hash384 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<String> for Hash384 {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Hash384> for String {
    fn from(hash: Hash384) -> Self {
        hash.to_hex()
    }
}

const SHARD_BITS: u32 = 10;
const REALM_BITS: u32 = 16;
const NUM_BITS: u32 = 38;
const SHARD_MASK: i64 = (1 << SHARD_BITS) - 1;
const REALM_MASK: i64 = (1 << REALM_BITS) - 1;
const NUM_MASK: i64 = (1 << NUM_BITS) - 1;

/// A ledger entity identifier (`shard.realm.num`).
///
/// Accounts, topics, tokens and nodes all share this identifier space. The
/// encoded form packs the three parts into one `i64` (10 bits shard, 16 bits
/// realm, 38 bits number) so that ids sort and index as plain integers.
///
/// ```rust
/// use mirror_common::EntityId;
///
/// let id: EntityId = "0.0.1001".parse().unwrap();
/// assert_eq!(id.num, 1001);
/// assert_eq!(EntityId::decode(id.encode()), id);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    /// Shard number.
    pub shard: i64,
    /// Realm number.
    pub realm: i64,
    /// Entity number within the realm.
    pub num: i64,
}

impl EntityId {
    /// Creates an entity id, validating each part fits its encoded width.
    pub fn new(shard: i64, realm: i64, num: i64) -> Result<Self, Error> {
        if !(0..=SHARD_MASK).contains(&shard)
            || !(0..=REALM_MASK).contains(&realm)
            || !(0..=NUM_MASK).contains(&num)
        {
            return Err(Error::InvalidEntityId(format!(
                "{}.{}.{} out of range",
                shard, realm, num
            )));
        }
        Ok(Self { shard, realm, num })
    }

    /// Packs the id into its `i64` storage form.
    pub fn encode(&self) -> i64 {
        (self.shard << (REALM_BITS + NUM_BITS)) | (self.realm << NUM_BITS) | self.num
    }

    /// Unpacks an id previously produced by [`EntityId::encode`].
    pub fn decode(encoded: i64) -> Self {
        Self {
            shard: (encoded >> (REALM_BITS + NUM_BITS)) & SHARD_MASK,
            realm: (encoded >> NUM_BITS) & REALM_MASK,
            num: encoded & NUM_MASK,
        }
    }

    /// Returns `true` for the all-zero id, which the ledger uses as "unset".
    pub fn is_empty(&self) -> bool {
        self.shard == 0 && self.realm == 0 && self.num == 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self)
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidEntityId(s.to_string()));
        }
        let parse = |p: &str| {
            p.parse::<i64>()
                .map_err(|_| Error::InvalidEntityId(s.to_string()))
        };
        Self::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?)
    }
}

impl TryFrom<String> for EntityId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.to_string()
    }
}
