//! Version 5 record files (serialized object stream).

use mirror_crypto::sha384;

use super::object_stream::{
    metadata_hash_v5, next_running_hash, read_hash_object, read_record_object, HASH_CLASS_ID,
    OBJECT_STREAM_VERSION,
};
use super::StreamFileData;
use crate::byte_reader::ByteReader;
use crate::error::{Result, StreamError};
use crate::model::{HapiVersion, RawRecordItem, RecordFile};

pub(crate) const VERSION: i32 = 5;

pub(crate) fn read(data: &StreamFileData) -> Result<RecordFile> {
    let mut reader = ByteReader::new(data.bytes.clone(), "record file v5");
    reader.expect_i32(VERSION)?;
    let hapi = HapiVersion::new(reader.read_i32()?, reader.read_i32()?, reader.read_i32()?);
    reader.expect_i32(OBJECT_STREAM_VERSION)?;

    let start_hash = read_hash_object(&mut reader)?;
    let mut running = start_hash;
    let mut items = Vec::new();

    // Record objects continue until the closing hash object.
    loop {
        let mut peek = reader.clone();
        if peek.read_i64()? == HASH_CLASS_ID {
            break;
        }
        let (transaction, record, object) = read_record_object(&mut reader)?;
        running = next_running_hash(&running, &object);
        items.push(RawRecordItem {
            transaction,
            record,
        });
    }

    let end_hash = read_hash_object(&mut reader)?;
    reader.finish()?;

    if running != end_hash {
        return Err(StreamError::HashMismatch {
            context: "record file v5 end running hash",
            expected: end_hash,
            actual: running,
        });
    }

    let mut file = RecordFile::new(
        data.filename.name().to_string(),
        VERSION,
        hapi,
        end_hash,
        start_hash,
        sha384(&data.bytes),
        data.bytes.clone(),
        items,
    )?;
    file.metadata_hash = Some(metadata_hash_v5(
        (hapi.major, hapi.minor, hapi.patch),
        &start_hash,
        &end_hash,
    ));
    Ok(file)
}
