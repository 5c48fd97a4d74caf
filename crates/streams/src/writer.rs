//! Writers producing valid stream files of every supported version.
//!
//! Consensus nodes are the only real producers of stream files; these
//! writers exist for local single-node networks and for building fixtures.
//!
//! ```
//! use mirror_streams::writer::{transaction_record, RecordFileWriter};
//! use mirror_streams::proto::TransactionBody;
//! use mirror_streams::reader::{RecordFileReader, StreamFileData, StreamFileReader};
//! use mirror_streams::StreamFilename;
//!
//! let written = RecordFileWriter::new(6)
//!     .item(&TransactionBody::default(), &transaction_record(1_000, 22))
//!     .write();
//! let name = StreamFilename::parse("1970-01-01T00_00_00.000001000Z.rcd").unwrap();
//! let data = StreamFileData::from_bytes(name, written.bytes.into()).unwrap();
//! let file = RecordFileReader.read(&data).unwrap();
//! assert_eq!(file.hash, written.hash);
//! ```

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use mirror_common::time::format_instant;
use mirror_common::{EntityId, Hash384};
use mirror_crypto::{sha384, NodeSigningKey, Sha384Hasher};
use prost::Message;

use crate::error::Result;
use crate::model::{AccountBalance, HapiVersion, SidecarKind, SidecarMetadata, SidecarRecord, SignatureType};
use crate::proto;
use crate::reader::object_stream::{
    metadata_hash_v5, metadata_hash_v6, next_running_hash, write_hash_object, write_record_object,
    write_signature_object, OBJECT_STREAM_VERSION,
};

/// Wraps a body into the `Transaction -> SignedTransaction` envelope.
pub fn encode_transaction(body: &proto::TransactionBody) -> Vec<u8> {
    let signed = proto::SignedTransaction {
        body_bytes: body.encode_to_vec(),
        sig_map: Vec::new(),
    };
    proto::Transaction {
        signed_transaction_bytes: signed.encode_to_vec(),
    }
    .encode_to_vec()
}

/// A record with the given consensus timestamp and response code.
pub fn transaction_record(consensus_timestamp: i64, status: i32) -> proto::TransactionRecord {
    proto::TransactionRecord {
        receipt: Some(proto::TransactionReceipt {
            status,
            ..Default::default()
        }),
        consensus_timestamp: Some(proto::Timestamp::from_nanos(consensus_timestamp)),
        ..Default::default()
    }
}

/// Output of [`RecordFileWriter::write`].
#[derive(Debug, Clone)]
pub struct WrittenFile {
    pub bytes: Vec<u8>,
    /// Chain hash the next file must reference.
    pub hash: Hash384,
    pub file_hash: Hash384,
    pub metadata_hash: Option<Hash384>,
}

/// Builder for record files.
#[derive(Debug, Clone)]
pub struct RecordFileWriter {
    version: i32,
    hapi: HapiVersion,
    previous_hash: Hash384,
    block_number: i64,
    items: Vec<(Vec<u8>, Vec<u8>)>,
    sidecars: Vec<SidecarMetadata>,
}

impl RecordFileWriter {
    pub fn new(version: i32) -> Self {
        Self {
            version,
            hapi: HapiVersion::new(0, 28, 0),
            previous_hash: Hash384::ZERO,
            block_number: 0,
            items: Vec::new(),
            sidecars: Vec::new(),
        }
    }

    pub fn hapi_version(mut self, hapi: HapiVersion) -> Self {
        self.hapi = hapi;
        self
    }

    pub fn previous_hash(mut self, hash: Hash384) -> Self {
        self.previous_hash = hash;
        self
    }

    pub fn block_number(mut self, block_number: i64) -> Self {
        self.block_number = block_number;
        self
    }

    pub fn sidecar(mut self, metadata: SidecarMetadata) -> Self {
        self.sidecars.push(metadata);
        self
    }

    pub fn item(self, body: &proto::TransactionBody, record: &proto::TransactionRecord) -> Self {
        self.raw_item(encode_transaction(body), record.encode_to_vec())
    }

    pub fn raw_item(mut self, transaction: Vec<u8>, record: Vec<u8>) -> Self {
        self.items.push((transaction, record));
        self
    }

    /// Serializes the file. Unknown versions produce a file with only the
    /// version header, which readers reject.
    pub fn write(&self) -> WrittenFile {
        match self.version {
            1 | 2 => self.write_legacy(),
            5 => self.write_v5(),
            6 => self.write_v6(),
            other => {
                let bytes = other.to_be_bytes().to_vec();
                let hash = sha384(&bytes);
                WrittenFile {
                    bytes,
                    hash,
                    file_hash: hash,
                    metadata_hash: None,
                }
            }
        }
    }

    fn write_legacy(&self) -> WrittenFile {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.hapi.major.to_be_bytes());
        out.push(0x01);
        out.extend_from_slice(self.previous_hash.as_bytes());
        let header_end = out.len();
        for (transaction, record) in &self.items {
            out.push(0x02);
            out.extend_from_slice(&(transaction.len() as i32).to_be_bytes());
            out.extend_from_slice(transaction);
            out.extend_from_slice(&(record.len() as i32).to_be_bytes());
            out.extend_from_slice(record);
        }

        let file_hash = sha384(&out);
        let hash = if self.version == 1 {
            file_hash
        } else {
            let mut hasher = Sha384Hasher::new();
            hasher.update(&out[..header_end]);
            hasher.update(sha384(&out[header_end..]).as_bytes());
            hasher.finalize()
        };
        WrittenFile {
            bytes: out,
            hash,
            file_hash,
            metadata_hash: None,
        }
    }

    fn running_hash(&self) -> Hash384 {
        let mut running = self.previous_hash;
        let mut object = Vec::new();
        for (transaction, record) in &self.items {
            object.clear();
            write_record_object(&mut object, transaction, record);
            running = next_running_hash(&running, &object);
        }
        running
    }

    fn hapi_tuple(&self) -> (i32, i32, i32) {
        (self.hapi.major, self.hapi.minor, self.hapi.patch)
    }

    fn write_v5(&self) -> WrittenFile {
        let mut out = Vec::new();
        out.extend_from_slice(&5i32.to_be_bytes());
        out.extend_from_slice(&self.hapi.major.to_be_bytes());
        out.extend_from_slice(&self.hapi.minor.to_be_bytes());
        out.extend_from_slice(&self.hapi.patch.to_be_bytes());
        out.extend_from_slice(&OBJECT_STREAM_VERSION.to_be_bytes());
        write_hash_object(&mut out, &self.previous_hash);
        for (transaction, record) in &self.items {
            write_record_object(&mut out, transaction, record);
        }
        let end = self.running_hash();
        write_hash_object(&mut out, &end);

        WrittenFile {
            file_hash: sha384(&out),
            bytes: out,
            hash: end,
            metadata_hash: Some(metadata_hash_v5(self.hapi_tuple(), &self.previous_hash, &end)),
        }
    }

    fn write_v6(&self) -> WrittenFile {
        let end = self.running_hash();
        let file = proto::RecordStreamFile {
            hapi_proto_version: Some(proto::SemanticVersion {
                major: self.hapi.major,
                minor: self.hapi.minor,
                patch: self.hapi.patch,
            }),
            start_object_running_hash: Some(proto::HashObject::sha384(&self.previous_hash)),
            record_stream_items: self
                .items
                .iter()
                .map(|(transaction, record)| proto::RecordStreamItem {
                    transaction: transaction.clone().into(),
                    record: record.clone().into(),
                })
                .collect(),
            end_object_running_hash: Some(proto::HashObject::sha384(&end)),
            block_number: self.block_number,
            sidecars: self
                .sidecars
                .iter()
                .map(|s| proto::SidecarMetadata {
                    hash: Some(proto::HashObject::sha384(&s.hash)),
                    id: s.id as i32,
                    types: s.types.iter().map(|t| t.to_proto() as i32).collect(),
                })
                .collect(),
        };

        let mut out = 6i32.to_be_bytes().to_vec();
        out.extend_from_slice(&file.encode_to_vec());
        WrittenFile {
            file_hash: sha384(&out),
            bytes: out,
            hash: end,
            metadata_hash: Some(metadata_hash_v6(
                self.hapi_tuple(),
                &self.previous_hash,
                &end,
                self.block_number,
            )),
        }
    }
}

/// Writes a signature file of the given version (2, 5 or 6).
///
/// Versions 5 and 6 also sign `metadata_hash`, falling back to the file hash
/// when none is given.
pub fn write_signature(
    version: u8,
    file_hash: &Hash384,
    metadata_hash: Option<&Hash384>,
    key: &NodeSigningKey,
) -> Vec<u8> {
    let file_sig = key.sign(file_hash.as_bytes());
    let metadata_hash = metadata_hash.unwrap_or(file_hash);
    let metadata_sig = key.sign(metadata_hash.as_bytes());
    let sig_type = SignatureType::Ed25519.code();

    match version {
        2 => {
            let mut out = vec![4u8];
            out.extend_from_slice(file_hash.as_bytes());
            out.push(3);
            out.extend_from_slice(&(file_sig.len() as i32).to_be_bytes());
            out.extend_from_slice(&file_sig);
            out
        }
        5 => {
            let mut out = vec![5u8];
            out.extend_from_slice(&OBJECT_STREAM_VERSION.to_be_bytes());
            write_hash_object(&mut out, file_hash);
            write_signature_object(&mut out, sig_type, &file_sig);
            write_hash_object(&mut out, metadata_hash);
            write_signature_object(&mut out, sig_type, &metadata_sig);
            out
        }
        _ => {
            let object = |hash: &Hash384, signature: Vec<u8>| proto::SignatureObject {
                signature_type: sig_type,
                length: signature.len() as i32,
                checksum: 101 - signature.len() as i32,
                signature,
                hash_object: Some(proto::HashObject::sha384(hash)),
            };
            let file = proto::SignatureFile {
                file_signature: Some(object(file_hash, file_sig)),
                metadata_signature: Some(object(metadata_hash, metadata_sig)),
            };
            let mut out = vec![6u8];
            out.extend_from_slice(&file.encode_to_vec());
            out
        }
    }
}

/// Writes a CSV balance file (version 1 or 2).
pub fn write_balance_csv(version: u8, timestamp: i64, balances: &[(EntityId, i64)]) -> Result<Vec<u8>> {
    let instant = format_instant(timestamp)?;
    let mut out = String::new();
    if version >= 2 {
        out.push_str("# version:2\n");
        out.push_str(&format!("# TimeStamp:{}\n", instant));
    } else {
        out.push_str(&format!("TimeStamp:{}\n", instant));
    }
    out.push_str("shard,realm,number,balance\n");
    for (account, balance) in balances {
        out.push_str(&format!(
            "{},{},{},{}\n",
            account.shard, account.realm, account.num, balance
        ));
    }
    Ok(out.into_bytes())
}

/// Writes an uncompressed protobuf balance file.
pub fn write_balance_protobuf(timestamp: i64, balances: &[AccountBalance]) -> Vec<u8> {
    proto::AllAccountBalances {
        consensus_timestamp: Some(proto::Timestamp::from_nanos(timestamp)),
        all_accounts: balances
            .iter()
            .map(|b| proto::SingleAccountBalances {
                account_id: Some(proto::AccountId::from_entity_id(b.account_id)),
                hbar_balance: b.balance.max(0) as u64,
                token_unit_balances: b
                    .token_balances
                    .iter()
                    .map(|t| proto::TokenUnitBalance {
                        token_id: Some(proto::TokenId::from_entity_id(t.token_id)),
                        balance: t.balance.max(0) as u64,
                    })
                    .collect(),
            })
            .collect(),
    }
    .encode_to_vec()
}

/// Writes an uncompressed sidecar file.
pub fn write_sidecar(records: &[SidecarRecord]) -> Vec<u8> {
    use proto::transaction_sidecar_record::SidecarRecords;

    proto::SidecarFile {
        sidecar_records: records
            .iter()
            .map(|r| proto::TransactionSidecarRecord {
                consensus_timestamp: Some(proto::Timestamp::from_nanos(r.consensus_timestamp)),
                migration: r.migration,
                sidecar_records: Some(match r.kind {
                    SidecarKind::StateChanges => SidecarRecords::StateChanges(r.data.to_vec()),
                    SidecarKind::Actions => SidecarRecords::Actions(r.data.to_vec()),
                    SidecarKind::Bytecode => SidecarRecords::Bytecode(r.data.to_vec()),
                }),
            })
            .collect(),
    }
    .encode_to_vec()
}

/// Gzips a payload.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
