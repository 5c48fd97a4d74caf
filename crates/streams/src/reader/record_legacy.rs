//! Version 1 and 2 record files.
//!
//! ```text
//! i32 version | i32 hapi_major | u8 0x01 | [48] previous_hash
//! repeat { u8 0x02 | i32 len | transaction | i32 len | record }
//! ```
//!
//! Version 1 chains on the hash of the whole file. Version 2 chains on
//! `SHA384(header || SHA384(body))` so the body can be hashed separately.

use mirror_crypto::{sha384, Sha384Hasher};

use super::object_stream::MAX_ITEM_LENGTH;
use super::StreamFileData;
use crate::byte_reader::ByteReader;
use crate::error::Result;
use crate::model::{HapiVersion, RawRecordItem, RecordFile};

pub(crate) const PREVIOUS_HASH_MARKER: u8 = 0x01;
pub(crate) const RECORD_MARKER: u8 = 0x02;

pub(crate) fn read_v1(data: &StreamFileData) -> Result<RecordFile> {
    read(data, 1)
}

pub(crate) fn read_v2(data: &StreamFileData) -> Result<RecordFile> {
    read(data, 2)
}

fn read(data: &StreamFileData, version: i32) -> Result<RecordFile> {
    let mut reader = ByteReader::new(data.bytes.clone(), "legacy record file");
    reader.expect_i32(version)?;
    let hapi_major = reader.read_i32()?;
    reader.expect_u8(PREVIOUS_HASH_MARKER)?;
    let previous_hash = reader.read_hash()?;
    let header_end = reader.position();

    let mut items = Vec::new();
    while !reader.is_empty() {
        reader.expect_u8(RECORD_MARKER)?;
        let transaction = reader.read_length_prefixed(MAX_ITEM_LENGTH)?;
        let record = reader.read_length_prefixed(MAX_ITEM_LENGTH)?;
        items.push(RawRecordItem {
            transaction,
            record,
        });
    }

    let file_hash = sha384(&data.bytes);
    let hash = if version == 1 {
        file_hash
    } else {
        let body_hash = sha384(&data.bytes[header_end..]);
        let mut hasher = Sha384Hasher::new();
        hasher.update(&data.bytes[..header_end]);
        hasher.update(body_hash.as_bytes());
        hasher.finalize()
    };

    RecordFile::new(
        data.filename.name().to_string(),
        version,
        HapiVersion::new(hapi_major, 0, 0),
        hash,
        previous_hash,
        file_hash,
        data.bytes.clone(),
        items,
    )
}
