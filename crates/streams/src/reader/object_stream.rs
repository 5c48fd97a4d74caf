//! Serialized object layout shared by v5 record files, v5 signature files
//! and the running hash of v6 record files.
//!
//! ```text
//! HashObject         = i64 class | i32 1 | i32 digest | i32 48 | [48] hash
//! RecordStreamObject = i64 class | i32 1 | i32 len | record | i32 len | transaction
//! SignatureObject    = i64 class | i32 1 | i32 type | i32 len | i32 101-len | signature
//! ```

use bytes::Bytes;
use mirror_common::{Hash384, HASH384_LEN};
use mirror_crypto::Sha384Hasher;

use crate::byte_reader::ByteReader;
use crate::error::{Result, StreamError};

pub(crate) const HASH_CLASS_ID: i64 = 0xf422_da83_a251_741e_u64 as i64;
pub(crate) const RECORD_CLASS_ID: i64 = 0xe370_929b_a542_9d8b_u64 as i64;
pub(crate) const SIGNATURE_CLASS_ID: i64 = 0x13dc_4b39_9b24_5c69;
pub(crate) const CLASS_VERSION: i32 = 1;
pub(crate) const SHA384_DIGEST_TYPE: i32 = 0x58ff_811b;
pub(crate) const OBJECT_STREAM_VERSION: i32 = 1;
pub(crate) const SIGNATURE_CHECKSUM_BASE: i32 = 101;

pub(crate) const HASH_OBJECT_LEN: usize = 8 + 4 + 4 + 4 + HASH384_LEN;

pub(crate) const MAX_ITEM_LENGTH: usize = 1024 * 1024;
pub(crate) const MAX_SIGNATURE_LENGTH: usize = 6144;

pub(crate) fn read_hash_object(reader: &mut ByteReader) -> Result<Hash384> {
    reader.expect_i64(HASH_CLASS_ID)?;
    reader.expect_i32(CLASS_VERSION)?;
    reader.expect_i32(SHA384_DIGEST_TYPE)?;
    reader.expect_i32(HASH384_LEN as i32)?;
    reader.read_hash()
}

pub(crate) fn write_hash_object(out: &mut Vec<u8>, hash: &Hash384) {
    out.extend_from_slice(&HASH_CLASS_ID.to_be_bytes());
    out.extend_from_slice(&CLASS_VERSION.to_be_bytes());
    out.extend_from_slice(&SHA384_DIGEST_TYPE.to_be_bytes());
    out.extend_from_slice(&(HASH384_LEN as i32).to_be_bytes());
    out.extend_from_slice(hash.as_bytes());
}

/// Reads one record object, returning `(transaction, record, object bytes)`.
pub(crate) fn read_record_object(reader: &mut ByteReader) -> Result<(Bytes, Bytes, Bytes)> {
    let start = reader.position();
    reader.expect_i64(RECORD_CLASS_ID)?;
    reader.expect_i32(CLASS_VERSION)?;
    let record = reader.read_length_prefixed(MAX_ITEM_LENGTH)?;
    let transaction = reader.read_length_prefixed(MAX_ITEM_LENGTH)?;
    Ok((transaction, record, reader.slice_from(start)))
}

pub(crate) fn write_record_object(out: &mut Vec<u8>, transaction: &[u8], record: &[u8]) {
    out.extend_from_slice(&RECORD_CLASS_ID.to_be_bytes());
    out.extend_from_slice(&CLASS_VERSION.to_be_bytes());
    out.extend_from_slice(&(record.len() as i32).to_be_bytes());
    out.extend_from_slice(record);
    out.extend_from_slice(&(transaction.len() as i32).to_be_bytes());
    out.extend_from_slice(transaction);
}

/// Reads a signature object, returning `(type, signature)`.
pub(crate) fn read_signature_object(reader: &mut ByteReader) -> Result<(i32, Vec<u8>)> {
    reader.expect_i64(SIGNATURE_CLASS_ID)?;
    reader.expect_i32(CLASS_VERSION)?;
    let signature_type = reader.read_i32()?;
    let length = reader.read_i32()?;
    if length <= 0 || length as usize > MAX_SIGNATURE_LENGTH {
        return Err(StreamError::InvalidLength {
            context: "signature object",
            length: i64::from(length),
        });
    }
    reader.expect_i32(SIGNATURE_CHECKSUM_BASE - length)?;
    let signature = reader.read_bytes(length as usize)?;
    Ok((signature_type, signature.to_vec()))
}

pub(crate) fn write_signature_object(out: &mut Vec<u8>, signature_type: i32, signature: &[u8]) {
    let length = signature.len() as i32;
    out.extend_from_slice(&SIGNATURE_CLASS_ID.to_be_bytes());
    out.extend_from_slice(&CLASS_VERSION.to_be_bytes());
    out.extend_from_slice(&signature_type.to_be_bytes());
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(&(SIGNATURE_CHECKSUM_BASE - length).to_be_bytes());
    out.extend_from_slice(signature);
}

/// Folds one object into a running hash.
pub(crate) fn next_running_hash(running: &Hash384, object: &[u8]) -> Hash384 {
    let object_hash = Hash384::hash(object);
    let mut hasher = Sha384Hasher::new();
    hasher.update(running.as_bytes());
    hasher.update(object_hash.as_bytes());
    hasher.finalize()
}

/// v5 metadata hash: the file header and both serialized hash objects,
/// i.e. everything except the record objects.
pub(crate) fn metadata_hash_v5(hapi: (i32, i32, i32), start: &Hash384, end: &Hash384) -> Hash384 {
    let mut hasher = Sha384Hasher::new();
    hasher.update_i32(5);
    hasher.update_i32(hapi.0);
    hasher.update_i32(hapi.1);
    hasher.update_i32(hapi.2);
    hasher.update_i32(OBJECT_STREAM_VERSION);
    let mut objects = Vec::with_capacity(2 * HASH_OBJECT_LEN);
    write_hash_object(&mut objects, start);
    write_hash_object(&mut objects, end);
    hasher.update(&objects);
    hasher.finalize()
}

/// v6 metadata hash: header fields and raw running hashes, then the block
/// number.
pub(crate) fn metadata_hash_v6(
    hapi: (i32, i32, i32),
    start: &Hash384,
    end: &Hash384,
    block_number: i64,
) -> Hash384 {
    let mut hasher = Sha384Hasher::new();
    hasher.update_i32(6);
    hasher.update_i32(hapi.0);
    hasher.update_i32(hapi.1);
    hasher.update_i32(hapi.2);
    hasher.update(start.as_bytes());
    hasher.update(end.as_bytes());
    hasher.update_i64(block_number);
    hasher.finalize()
}
