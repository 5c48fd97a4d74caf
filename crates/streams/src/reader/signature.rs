//! Signature file readers.
//!
//! ```text
//! v2: u8 4 | [48] file_hash | u8 3 | i32 len | signature
//! v5: u8 5 | i32 1 | HashObject | SignatureObject | HashObject | SignatureObject
//! v6: u8 6 | protobuf SignatureFile
//! ```

use mirror_common::Hash384;
use prost::Message;

use super::object_stream::{
    read_hash_object, read_signature_object, MAX_SIGNATURE_LENGTH, OBJECT_STREAM_VERSION,
};
use super::StreamFileData;
use crate::byte_reader::ByteReader;
use crate::error::{Result, StreamError};
use crate::model::{SignatureType, StreamFileSignature};
use crate::proto::{SignatureFile, SignatureObject};

pub(crate) const V2_FILE_HASH_MARKER: u8 = 4;
pub(crate) const V2_SIGNATURE_MARKER: u8 = 3;

fn signature_type(code: i32) -> Result<SignatureType> {
    SignatureType::from_code(code)
        .ok_or_else(|| StreamError::InvalidData(format!("unknown signature type {}", code)))
}

fn signature(data: &StreamFileData, version: u8) -> StreamFileSignature {
    StreamFileSignature {
        filename: data.filename.clone(),
        version,
        signature_type: SignatureType::Ed25519,
        file_hash: Hash384::ZERO,
        file_hash_signature: Vec::new(),
        metadata_hash: None,
        metadata_hash_signature: None,
        node_id: None,
    }
}

pub(crate) fn read_v2(data: &StreamFileData) -> Result<StreamFileSignature> {
    let mut reader = ByteReader::new(data.bytes.clone(), "signature file v2");
    reader.expect_u8(V2_FILE_HASH_MARKER)?;
    let file_hash = reader.read_hash()?;
    reader.expect_u8(V2_SIGNATURE_MARKER)?;
    let sig = reader.read_length_prefixed(MAX_SIGNATURE_LENGTH)?;
    reader.finish()?;

    let mut result = signature(data, 2);
    result.file_hash = file_hash;
    result.file_hash_signature = sig.to_vec();
    Ok(result)
}

pub(crate) fn read_v5(data: &StreamFileData) -> Result<StreamFileSignature> {
    let mut reader = ByteReader::new(data.bytes.clone(), "signature file v5");
    reader.expect_u8(5)?;
    reader.expect_i32(OBJECT_STREAM_VERSION)?;
    let file_hash = read_hash_object(&mut reader)?;
    let (file_type, file_sig) = read_signature_object(&mut reader)?;
    let metadata_hash = read_hash_object(&mut reader)?;
    let (metadata_type, metadata_sig) = read_signature_object(&mut reader)?;
    reader.finish()?;

    if file_type != metadata_type {
        return Err(StreamError::InvalidData(
            "file and metadata signature types differ".into(),
        ));
    }

    let mut result = signature(data, 5);
    result.signature_type = signature_type(file_type)?;
    result.file_hash = file_hash;
    result.file_hash_signature = file_sig;
    result.metadata_hash = Some(metadata_hash);
    result.metadata_hash_signature = Some(metadata_sig);
    Ok(result)
}

fn signature_object(object: Option<SignatureObject>, what: &str) -> Result<(Hash384, SignatureObject)> {
    let object =
        object.ok_or_else(|| StreamError::InvalidData(format!("missing {} signature", what)))?;
    let hash = object
        .hash_object
        .as_ref()
        .ok_or_else(|| StreamError::InvalidData(format!("missing {} hash", what)))?;
    let hash = Hash384::from_slice(&hash.hash)?;
    if object.signature.is_empty() || object.length as usize != object.signature.len() {
        return Err(StreamError::InvalidLength {
            context: "signature file v6",
            length: i64::from(object.length),
        });
    }
    if object.checksum != 101 - object.length {
        return Err(StreamError::BadMarker {
            context: "signature file v6 checksum",
            expected: i64::from(101 - object.length),
            found: i64::from(object.checksum),
        });
    }
    Ok((hash, object))
}

pub(crate) fn read_v6(data: &StreamFileData) -> Result<StreamFileSignature> {
    let mut reader = ByteReader::new(data.bytes.clone(), "signature file v6");
    reader.expect_u8(6)?;
    let proto = SignatureFile::decode(reader.read_rest())?;

    let (file_hash, file_sig) = signature_object(proto.file_signature, "file")?;
    let (metadata_hash, metadata_sig) = signature_object(proto.metadata_signature, "metadata")?;

    let mut result = signature(data, 6);
    result.signature_type = signature_type(file_sig.signature_type)?;
    result.file_hash = file_hash;
    result.file_hash_signature = file_sig.signature;
    result.metadata_hash = Some(metadata_hash);
    result.metadata_hash_signature = Some(metadata_sig.signature);
    Ok(result)
}
