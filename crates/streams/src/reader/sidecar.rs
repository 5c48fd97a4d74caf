//! Sidecar file reader.

use mirror_crypto::sha384;
use prost::Message;

use super::StreamFileData;
use crate::error::{Result, StreamError};
use crate::model::{SidecarFile, SidecarKind, SidecarRecord};
use crate::proto::transaction_sidecar_record::SidecarRecords;
use crate::proto::SidecarFile as SidecarFileProto;

pub(crate) fn read(data: &StreamFileData) -> Result<SidecarFile> {
    let id = data.filename.sidecar_id().ok_or_else(|| {
        StreamError::InvalidFilename(format!("{} is not a sidecar file", data.filename))
    })?;
    let proto = SidecarFileProto::decode(data.bytes.clone())?;

    let records = proto
        .sidecar_records
        .into_iter()
        .map(|record| {
            let consensus_timestamp = record
                .consensus_timestamp
                .as_ref()
                .ok_or_else(|| StreamError::InvalidData("sidecar record without timestamp".into()))?
                .to_nanos()?;
            let (kind, payload) = match record.sidecar_records {
                Some(SidecarRecords::StateChanges(bytes)) => (SidecarKind::StateChanges, bytes),
                Some(SidecarRecords::Actions(bytes)) => (SidecarKind::Actions, bytes),
                Some(SidecarRecords::Bytecode(bytes)) => (SidecarKind::Bytecode, bytes),
                None => {
                    return Err(StreamError::InvalidData(
                        "sidecar record without payload".into(),
                    ))
                }
            };
            Ok(SidecarRecord {
                consensus_timestamp,
                migration: record.migration,
                kind,
                data: payload.into(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SidecarFile {
        name: data.filename.name().to_string(),
        id,
        hash: sha384(&data.bytes),
        size: data.bytes.len(),
        records,
    })
}
