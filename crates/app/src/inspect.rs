//! Offline decoding of a single stream file, for the `read-file` command.

use std::collections::BTreeMap;
use std::path::Path;

use mirror_streams::reader::{
    AccountBalanceFileReader, RecordFileReader, SidecarFileReader, SignatureFileReader,
    StreamFileData, StreamFileReader,
};
use mirror_streams::{FileType, StreamType};
use serde::Serialize;

/// What a stream file decoded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileSummary {
    Record {
        name: String,
        version: i32,
        hapi_version: String,
        consensus_start: i64,
        consensus_end: i64,
        count: u64,
        hash: String,
        previous_hash: String,
        file_hash: String,
        metadata_hash: Option<String>,
        block_number: Option<i64>,
        sidecars: Vec<u32>,
        /// Items per transaction type.
        transactions: BTreeMap<String, u64>,
    },
    Balance {
        name: String,
        format: String,
        consensus_timestamp: i64,
        accounts: u64,
        total_hbars: i128,
        file_hash: String,
    },
    Signature {
        name: String,
        version: u8,
        signature_type: String,
        file_hash: String,
        metadata_hash: Option<String>,
    },
    Sidecar {
        name: String,
        id: u32,
        hash: String,
        records: usize,
    },
}

/// Decodes the file at `path`, verifying its embedded hashes. The file
/// name must follow the stream naming convention.
pub fn read_stream_file(path: &Path) -> anyhow::Result<FileSummary> {
    let data = StreamFileData::from_file(path)?;
    let filename = data.filename.clone();

    let summary = match (filename.stream_type(), filename.file_type()) {
        (_, FileType::Signature) => {
            let signature = SignatureFileReader.read(&data)?;
            FileSummary::Signature {
                name: filename.name().to_string(),
                version: signature.version,
                signature_type: format!("{:?}", signature.signature_type),
                file_hash: signature.file_hash.to_hex(),
                metadata_hash: signature.metadata_hash.map(|h| h.to_hex()),
            }
        }
        (_, FileType::Sidecar) => {
            let sidecar = SidecarFileReader.read(&data)?;
            FileSummary::Sidecar {
                name: sidecar.name,
                id: sidecar.id,
                hash: sidecar.hash.to_hex(),
                records: sidecar.records.len(),
            }
        }
        (StreamType::Record, FileType::Data) => {
            let mut file = RecordFileReader.read(&data)?;
            let mut transactions = BTreeMap::new();
            for item in file.take_items() {
                let item = item?;
                *transactions
                    .entry(item.transaction_type.to_string())
                    .or_insert(0u64) += 1;
            }
            FileSummary::Record {
                name: file.name.clone(),
                version: file.version,
                hapi_version: file.hapi_version.to_string(),
                consensus_start: file.consensus_start,
                consensus_end: file.consensus_end,
                count: file.count,
                hash: file.hash.to_hex(),
                previous_hash: file.previous_hash.to_hex(),
                file_hash: file.file_hash.to_hex(),
                metadata_hash: file.metadata_hash.map(|h| h.to_hex()),
                block_number: file.index,
                sidecars: file.sidecar_metadata.iter().map(|m| m.id).collect(),
                transactions,
            }
        }
        (StreamType::Balance, FileType::Data) => {
            let mut file = AccountBalanceFileReader.read(&data)?;
            let total_hbars: i128 = file
                .take_items()
                .map(|balance| i128::from(balance.balance))
                .sum();
            FileSummary::Balance {
                name: file.name.clone(),
                format: file.format.as_str().to_string(),
                consensus_timestamp: file.consensus_timestamp,
                accounts: file.count,
                total_hbars,
                file_hash: file.file_hash.to_hex(),
            }
        }
    };
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_common::EntityId;
    use mirror_crypto::NodeSigningKey;
    use mirror_streams::proto::{TransactionBody, SUCCESS};
    use mirror_streams::writer::{
        transaction_record, write_balance_csv, write_signature, RecordFileWriter,
    };

    const RECORD: &str = "2022-04-15T05_20_00.000000000Z.rcd";

    #[test]
    fn test_read_record_and_signature() {
        let dir = tempfile::tempdir().unwrap();
        let ts = 1_650_000_000_000_000_000;
        let written = RecordFileWriter::new(5)
            .item(&TransactionBody::default(), &transaction_record(ts, SUCCESS))
            .item(&TransactionBody::default(), &transaction_record(ts + 1, SUCCESS))
            .write();
        std::fs::write(dir.path().join(RECORD), &written.bytes).unwrap();

        match read_stream_file(&dir.path().join(RECORD)).unwrap() {
            FileSummary::Record {
                version,
                count,
                hash,
                transactions,
                ..
            } => {
                assert_eq!(version, 5);
                assert_eq!(count, 2);
                assert_eq!(hash, written.hash.to_hex());
                assert_eq!(transactions.values().sum::<u64>(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }

        let key = NodeSigningKey::from_seed(&[1; 32]);
        let signature = write_signature(5, &written.file_hash, written.metadata_hash.as_ref(), &key);
        let sig_name = format!("{}_sig", RECORD);
        std::fs::write(dir.path().join(&sig_name), signature).unwrap();
        match read_stream_file(&dir.path().join(&sig_name)).unwrap() {
            FileSummary::Signature { version, file_hash, .. } => {
                assert_eq!(version, 5);
                assert_eq!(file_hash, written.file_hash.to_hex());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_read_balance_file() {
        let dir = tempfile::tempdir().unwrap();
        let name = "2022-04-15T05_30_00.000000000Z_Balances.csv";
        let ts = mirror_common::time::parse_instant("2022-04-15T05_30_00.000000000Z").unwrap();
        let balances = [
            (EntityId::new(0, 0, 2).unwrap(), 700),
            (EntityId::new(0, 0, 3).unwrap(), 300),
        ];
        std::fs::write(dir.path().join(name), write_balance_csv(2, ts, &balances).unwrap()).unwrap();

        let summary = read_stream_file(&dir.path().join(name)).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["kind"], "balance");
        assert_eq!(json["accounts"], 2);
        assert_eq!(json["total_hbars"], 1000);
        assert_eq!(json["consensus_timestamp"], ts);
    }

    #[test]
    fn test_bad_name_and_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        assert!(read_stream_file(&dir.path().join("notes.txt")).is_err());

        std::fs::write(dir.path().join(RECORD), [0u8, 0, 0, 9]).unwrap();
        assert!(read_stream_file(&dir.path().join(RECORD)).is_err());
    }
}
