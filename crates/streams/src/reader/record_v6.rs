//! Version 6 record files (protobuf `RecordStreamFile`).
//!
//! The running hash is computed as if each item were a v5 record object, so
//! the chain continues unbroken across the v5 to v6 upgrade.

use mirror_common::Hash384;
use mirror_crypto::sha384;
use prost::Message;

use super::object_stream::{metadata_hash_v6, next_running_hash, write_record_object};
use super::StreamFileData;
use crate::byte_reader::ByteReader;
use crate::error::{Result, StreamError};
use crate::model::{HapiVersion, RawRecordItem, RecordFile, SidecarKind, SidecarMetadata};
use crate::proto::{HashObject, RecordStreamFile};

pub(crate) const VERSION: i32 = 6;

fn hash_of(object: Option<&HashObject>, what: &str) -> Result<Hash384> {
    let object =
        object.ok_or_else(|| StreamError::InvalidData(format!("missing {} hash", what)))?;
    Ok(Hash384::from_slice(&object.hash)?)
}

pub(crate) fn read(data: &StreamFileData) -> Result<RecordFile> {
    let mut reader = ByteReader::new(data.bytes.clone(), "record file v6");
    reader.expect_i32(VERSION)?;
    let proto = RecordStreamFile::decode(reader.read_rest())?;

    let version = proto.hapi_proto_version.clone().unwrap_or_default();
    let hapi = HapiVersion::new(version.major, version.minor, version.patch);
    let start_hash = hash_of(proto.start_object_running_hash.as_ref(), "start running")?;
    let end_hash = hash_of(proto.end_object_running_hash.as_ref(), "end running")?;

    let mut running = start_hash;
    let mut object = Vec::new();
    let mut items = Vec::with_capacity(proto.record_stream_items.len());
    for item in proto.record_stream_items {
        object.clear();
        write_record_object(&mut object, &item.transaction, &item.record);
        running = next_running_hash(&running, &object);
        items.push(RawRecordItem {
            transaction: item.transaction,
            record: item.record,
        });
    }

    if running != end_hash {
        return Err(StreamError::HashMismatch {
            context: "record file v6 end running hash",
            expected: end_hash,
            actual: running,
        });
    }

    let sidecar_metadata = proto
        .sidecars
        .iter()
        .map(|sidecar| {
            Ok(SidecarMetadata {
                id: u32::try_from(sidecar.id).map_err(|_| {
                    StreamError::InvalidData(format!("invalid sidecar id {}", sidecar.id))
                })?,
                hash: hash_of(sidecar.hash.as_ref(), "sidecar")?,
                types: sidecar
                    .types
                    .iter()
                    .filter_map(|t| SidecarKind::from_proto(*t))
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

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
    file.index = Some(proto.block_number);
    file.metadata_hash = Some(metadata_hash_v6(
        (hapi.major, hapi.minor, hapi.patch),
        &start_hash,
        &end_hash,
        proto.block_number,
    ));
    file.sidecar_metadata = sidecar_metadata;
    Ok(file)
}
