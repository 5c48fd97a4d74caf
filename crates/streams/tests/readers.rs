//! Decoding tests for every supported stream file version.

use bytes::Bytes;
use mirror_common::{EntityId, Hash384};
use mirror_crypto::NodeSigningKey;
use mirror_streams::model::{AccountBalance, SidecarKind, SidecarMetadata, SidecarRecord, TokenBalance};
use mirror_streams::proto::{
    transaction_body::Data, CryptoTransferTransactionBody, Timestamp, TransactionBody, SUCCESS,
};
use mirror_streams::reader::{
    AccountBalanceFileReader, RecordFileReader, SidecarFileReader, SignatureFileReader,
    StreamFileData, StreamFileReader,
};
use mirror_streams::writer::{
    gzip, transaction_record, write_balance_csv, write_balance_protobuf, write_sidecar,
    write_signature, RecordFileWriter,
};
use mirror_streams::{StreamError, StreamFile, StreamFilename, TransactionType};

const T0: i64 = 1_650_000_000_000_000_000;

fn transfer_body() -> TransactionBody {
    TransactionBody {
        memo: "transfer".to_string(),
        data: Some(Data::CryptoTransfer(CryptoTransferTransactionBody::default())),
        ..Default::default()
    }
}

fn writer(version: i32, count: i64) -> RecordFileWriter {
    let mut writer = RecordFileWriter::new(version);
    for i in 0..count {
        writer = writer.item(&transfer_body(), &transaction_record(T0 + i, SUCCESS));
    }
    writer
}

fn data(name: &str, bytes: Vec<u8>) -> StreamFileData {
    StreamFileData::from_bytes(StreamFilename::parse(name).unwrap(), Bytes::from(bytes)).unwrap()
}

fn record_name() -> &'static str {
    "2022-04-15T05_20_00.000000000Z.rcd"
}

#[test]
fn test_every_record_version_reproduces_count_and_hashes() {
    for version in [1, 2, 5, 6] {
        let previous = Hash384::hash(b"previous");
        let written = writer(version, 3).previous_hash(previous).write();
        let file = RecordFileReader
            .read(&data(record_name(), written.bytes.clone()))
            .unwrap_or_else(|e| panic!("v{} failed: {}", version, e));

        assert_eq!(file.version, version);
        assert_eq!(file.count, 3);
        assert_eq!(file.hash, written.hash, "v{} chain hash", version);
        assert_eq!(file.file_hash, written.file_hash, "v{} file hash", version);
        assert_eq!(file.previous_hash, previous);
        assert_eq!(file.metadata_hash, written.metadata_hash);
        assert_eq!(file.consensus_start, T0);
        assert_eq!(file.consensus_end, T0 + 2);
        assert_eq!(file.size, written.bytes.len());
    }
}

#[test]
fn test_v5_metadata_hash_is_file_without_record_objects() {
    let written = writer(5, 2).previous_hash(Hash384::hash(b"previous")).write();
    let file = RecordFileReader
        .read(&data(record_name(), written.bytes.clone()))
        .unwrap();

    // 20-byte header and start hash object, then the end hash object.
    let hash_object = 8 + 4 + 4 + 4 + 48;
    let bytes = &written.bytes;
    let mut signed = bytes[..20 + hash_object].to_vec();
    signed.extend_from_slice(&bytes[bytes.len() - hash_object..]);
    assert_eq!(file.metadata_hash, Some(Hash384::hash(&signed)));
}

#[test]
fn test_v1_and_v2_chain_hashes_differ() {
    let v1 = writer(1, 1).write();
    let v2 = writer(2, 1).write();
    assert_eq!(v1.hash, v1.file_hash);
    assert_ne!(v2.hash, v2.file_hash);
}

#[test]
fn test_v5_and_v6_share_running_hash() {
    let v5 = writer(5, 4).write();
    let v6 = writer(6, 4).write();
    assert_eq!(v5.hash, v6.hash);
    assert_ne!(v5.file_hash, v6.file_hash);
}

#[test]
fn test_v6_block_number_and_sidecars() {
    let sidecar_hash = Hash384::hash(b"sidecar");
    let written = writer(6, 1)
        .block_number(42)
        .sidecar(SidecarMetadata {
            id: 1,
            hash: sidecar_hash,
            types: vec![SidecarKind::Bytecode],
        })
        .write();
    let gz = gzip(&written.bytes).unwrap();
    let file = RecordFileReader
        .read(&data("2022-04-15T05_20_00.000000000Z.rcd.gz", gz))
        .unwrap();

    assert_eq!(file.index(), Some(42));
    assert_eq!(file.sidecar_metadata().len(), 1);
    assert_eq!(file.sidecar_metadata()[0].hash, sidecar_hash);
    assert_eq!(file.sidecar_metadata()[0].types, vec![SidecarKind::Bytecode]);
}

#[test]
fn test_v6_metadata_hash_covers_block_number() {
    let a = writer(6, 1).block_number(1).write();
    let b = writer(6, 1).block_number(2).write();
    assert_eq!(a.hash, b.hash);
    assert_ne!(a.metadata_hash, b.metadata_hash);
}

#[test]
fn test_v5_end_hash_mismatch() {
    let mut bytes = writer(5, 2).write().bytes;
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    let err = RecordFileReader.read(&data(record_name(), bytes)).unwrap_err();
    assert!(matches!(err, StreamError::HashMismatch { .. }), "{}", err);
}

#[test]
fn test_legacy_bad_marker() {
    let mut bytes = writer(2, 1).write().bytes;
    // first item marker sits right after the 57-byte header
    bytes[57] = 0x07;
    let err = RecordFileReader.read(&data(record_name(), bytes)).unwrap_err();
    assert!(matches!(err, StreamError::BadMarker { found: 7, .. }), "{}", err);
}

#[test]
fn test_legacy_truncated() {
    let mut bytes = writer(1, 2).write().bytes;
    bytes.truncate(bytes.len() - 3);
    let err = RecordFileReader.read(&data(record_name(), bytes)).unwrap_err();
    assert!(matches!(err, StreamError::Truncated { .. }), "{}", err);
}

#[test]
fn test_unsupported_record_version() {
    let bytes = writer(3, 1).write().bytes;
    let err = RecordFileReader.read(&data(record_name(), bytes)).unwrap_err();
    assert!(matches!(
        err,
        StreamError::UnsupportedVersion { version: 3, .. }
    ));
}

#[test]
fn test_empty_record_file_rejected() {
    let bytes = RecordFileWriter::new(6).write().bytes;
    assert!(matches!(
        RecordFileReader.read(&data(record_name(), bytes)),
        Err(StreamError::InvalidData(_))
    ));
}

#[test]
fn test_items_are_single_pass() {
    let written = writer(5, 3).write();
    let mut file = RecordFileReader
        .read(&data(record_name(), written.bytes))
        .unwrap();

    let items: Vec<_> = file.take_items().collect::<Result<_, _>>().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].transaction_type, TransactionType::CryptoTransfer);
    assert_eq!(items[0].body.memo, "transfer");
    assert_eq!(items[2].index, 2);
    assert!(items.iter().all(|i| i.is_successful()));

    assert_eq!(file.take_items().count(), 0);
    assert!(!file.has_items());
}

#[test]
fn test_child_inherits_parent_failure() {
    let mut child = transaction_record(T0 + 1, SUCCESS);
    child.parent_consensus_timestamp = Some(Timestamp::from_nanos(T0));
    let written = RecordFileWriter::new(6)
        .item(&transfer_body(), &transaction_record(T0, 11))
        .item(&transfer_body(), &child)
        .write();
    let mut file = RecordFileReader
        .read(&data(record_name(), written.bytes))
        .unwrap();

    let items: Vec<_> = file.take_items().collect::<Result<_, _>>().unwrap();
    assert!(!items[0].is_successful());
    assert_eq!(items[1].parent_consensus_timestamp(), Some(T0));
    assert!(!items[1].is_successful());
}

#[test]
fn test_signature_versions() {
    let key = NodeSigningKey::from_seed(&[5u8; 32]);
    let file_hash = Hash384::hash(b"file");
    let metadata_hash = Hash384::hash(b"metadata");

    for version in [2u8, 5, 6] {
        let bytes = write_signature(version, &file_hash, Some(&metadata_hash), &key);
        let sig = SignatureFileReader
            .read(&data("2022-04-15T05_20_00.000000000Z.rcd_sig", bytes))
            .unwrap();
        assert_eq!(sig.version, version);
        assert_eq!(sig.file_hash, file_hash);
        assert!(key
            .public_key()
            .verify(file_hash.as_bytes(), &sig.file_hash_signature)
            .is_ok());
        if version == 2 {
            assert_eq!(sig.metadata_hash, None);
        } else {
            assert_eq!(sig.metadata_hash, Some(metadata_hash));
        }
    }
}

#[test]
fn test_truncated_v2_signature_is_parse_error() {
    let key = NodeSigningKey::from_seed(&[5u8; 32]);
    let mut bytes = write_signature(2, &Hash384::hash(b"file"), None, &key);
    bytes.truncate(bytes.len() - 10);
    let err = SignatureFileReader
        .read(&data("2022-04-15T05_20_00.000000000Z.rcd_sig", bytes))
        .unwrap_err();
    assert!(matches!(err, StreamError::Truncated { .. }), "{}", err);
}

#[test]
fn test_v2_signature_trailing_bytes() {
    let key = NodeSigningKey::from_seed(&[5u8; 32]);
    let mut bytes = write_signature(2, &Hash384::hash(b"file"), None, &key);
    bytes.push(0);
    let err = SignatureFileReader
        .read(&data("2022-04-15T05_20_00.000000000Z.rcd_sig", bytes))
        .unwrap_err();
    assert!(matches!(err, StreamError::TrailingBytes { count: 1, .. }));
}

#[test]
fn test_unknown_signature_marker() {
    let err = SignatureFileReader
        .read(&data("2022-04-15T05_20_00.000000000Z.rcd_sig", vec![9, 1, 2]))
        .unwrap_err();
    assert!(matches!(
        err,
        StreamError::UnsupportedVersion { version: 9, .. }
    ));
}

fn balances() -> Vec<(EntityId, i64)> {
    vec![
        (EntityId::new(0, 0, 2).unwrap(), 1_000),
        (EntityId::new(0, 0, 98).unwrap(), 25),
    ]
}

#[test]
fn test_balance_csv_versions() {
    let name = "2022-04-15T05_20_00.000000000Z_Balances.csv";
    let ts = StreamFilename::parse(name).unwrap().timestamp();
    for version in [1u8, 2] {
        let bytes = write_balance_csv(version, ts, &balances()).unwrap();
        let mut file = AccountBalanceFileReader.read(&data(name, bytes)).unwrap();
        assert_eq!(file.consensus_timestamp, ts);
        assert_eq!(file.count, 2);
        let rows: Vec<_> = file.take_items().collect();
        assert_eq!(rows[1].account_id.num, 98);
        assert_eq!(rows[1].balance, 25);
    }
}

#[test]
fn test_balance_csv_timestamp_must_match_name() {
    let name = "2022-04-15T05_20_00.000000000Z_Balances.csv";
    let bytes = write_balance_csv(1, 5, &balances()).unwrap();
    assert!(AccountBalanceFileReader.read(&data(name, bytes)).is_err());
}

#[test]
fn test_balance_csv_bad_row() {
    let name = "2022-04-15T05_20_00.000000000Z_Balances.csv";
    let ts = StreamFilename::parse(name).unwrap().timestamp();
    let mut bytes = write_balance_csv(2, ts, &balances()).unwrap();
    bytes.extend_from_slice(b"0,0,x,1\n");
    let err = AccountBalanceFileReader.read(&data(name, bytes)).unwrap_err();
    assert!(matches!(err, StreamError::Csv { line: 6, .. }), "{}", err);
}

#[test]
fn test_balance_protobuf_gzipped() {
    let ts = T0;
    let rows = vec![AccountBalance {
        consensus_timestamp: ts,
        account_id: EntityId::new(0, 0, 1001).unwrap(),
        balance: 500,
        token_balances: vec![TokenBalance {
            token_id: EntityId::new(0, 0, 2001).unwrap(),
            balance: 7,
        }],
    }];
    let bytes = gzip(&write_balance_protobuf(ts, &rows)).unwrap();
    let mut file = AccountBalanceFileReader
        .read(&data("2022-04-15T05_20_00.000000000Z_Balances.pb.gz", bytes))
        .unwrap();
    assert_eq!(file.consensus_timestamp, ts);
    assert_eq!(file.take_items().collect::<Vec<_>>(), rows);
}

#[test]
fn test_sidecar_file() {
    let records = vec![SidecarRecord {
        consensus_timestamp: T0,
        migration: false,
        kind: SidecarKind::Actions,
        data: Bytes::from_static(b"actions"),
    }];
    let plain = write_sidecar(&records);
    let expected_hash = Hash384::hash(&plain);
    let sidecar = SidecarFileReader
        .read(&data(
            "2022-04-15T05_20_00.000000000Z_01.rcd.gz",
            gzip(&plain).unwrap(),
        ))
        .unwrap();
    assert_eq!(sidecar.id, 1);
    assert_eq!(sidecar.hash, expected_hash);
    assert_eq!(sidecar.records, records);
}

#[test]
fn test_from_file_reads_and_decompresses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("2022-04-15T05_20_00.000000000Z.rcd.gz");
    std::fs::write(&path, gzip(&writer(6, 1).write().bytes).unwrap()).unwrap();

    let data = StreamFileData::from_file(&path).unwrap();
    assert_eq!(RecordFileReader.read(&data).unwrap().count, 1);
}
