//! Protobuf wire types for stream files and the transactions they carry.
//!
//! The messages are declared directly with `prost` derives; field numbers are
//! part of the published file formats and must not change.

/// Response code of a successful transaction.
pub const SUCCESS: i32 = 22;

#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Duration {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct AccountId {
    #[prost(int64, tag = "1")]
    pub shard_num: i64,
    #[prost(int64, tag = "2")]
    pub realm_num: i64,
    #[prost(int64, tag = "3")]
    pub account_num: i64,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct TopicId {
    #[prost(int64, tag = "1")]
    pub shard_num: i64,
    #[prost(int64, tag = "2")]
    pub realm_num: i64,
    #[prost(int64, tag = "3")]
    pub topic_num: i64,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct TokenId {
    #[prost(int64, tag = "1")]
    pub shard_num: i64,
    #[prost(int64, tag = "2")]
    pub realm_num: i64,
    #[prost(int64, tag = "3")]
    pub token_num: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SemanticVersion {
    #[prost(int32, tag = "1")]
    pub major: i32,
    #[prost(int32, tag = "2")]
    pub minor: i32,
    #[prost(int32, tag = "3")]
    pub patch: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionId {
    #[prost(message, optional, tag = "1")]
    pub transaction_valid_start: ::core::option::Option<Timestamp>,
    #[prost(message, optional, tag = "2")]
    pub account_id: ::core::option::Option<AccountId>,
    #[prost(bool, tag = "3")]
    pub scheduled: bool,
    #[prost(int32, tag = "4")]
    pub nonce: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AccountAmount {
    #[prost(message, optional, tag = "1")]
    pub account_id: ::core::option::Option<AccountId>,
    #[prost(sint64, tag = "2")]
    pub amount: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransferList {
    #[prost(message, repeated, tag = "1")]
    pub account_amounts: ::prost::alloc::vec::Vec<AccountAmount>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TokenTransferList {
    #[prost(message, optional, tag = "1")]
    pub token: ::core::option::Option<TokenId>,
    #[prost(message, repeated, tag = "2")]
    pub transfers: ::prost::alloc::vec::Vec<AccountAmount>,
}

// Transactions

/// Outer transaction envelope as it appears in a record stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Transaction {
    #[prost(bytes = "vec", tag = "5")]
    pub signed_transaction_bytes: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignedTransaction {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub sig_map: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionBody {
    #[prost(message, optional, tag = "1")]
    pub transaction_id: ::core::option::Option<TransactionId>,
    #[prost(message, optional, tag = "2")]
    pub node_account_id: ::core::option::Option<AccountId>,
    #[prost(uint64, tag = "3")]
    pub transaction_fee: u64,
    #[prost(message, optional, tag = "4")]
    pub transaction_valid_duration: ::core::option::Option<Duration>,
    #[prost(string, tag = "6")]
    pub memo: ::prost::alloc::string::String,
    #[prost(
        oneof = "transaction_body::Data",
        tags = "11, 12, 14, 15, 23, 24, 25, 26, 27, 29, 37, 38"
    )]
    pub data: ::core::option::Option<transaction_body::Data>,
}

pub mod transaction_body {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Data {
        #[prost(message, tag = "11")]
        CryptoCreateAccount(super::CryptoCreateTransactionBody),
        #[prost(message, tag = "12")]
        CryptoDelete(super::CryptoDeleteTransactionBody),
        #[prost(message, tag = "14")]
        CryptoTransfer(super::CryptoTransferTransactionBody),
        #[prost(message, tag = "15")]
        CryptoUpdateAccount(super::CryptoUpdateTransactionBody),
        #[prost(message, tag = "23")]
        Freeze(super::FreezeTransactionBody),
        #[prost(message, tag = "24")]
        ConsensusCreateTopic(super::ConsensusCreateTopicTransactionBody),
        #[prost(message, tag = "25")]
        ConsensusUpdateTopic(super::ConsensusUpdateTopicTransactionBody),
        #[prost(message, tag = "26")]
        ConsensusDeleteTopic(super::ConsensusDeleteTopicTransactionBody),
        #[prost(message, tag = "27")]
        ConsensusSubmitMessage(super::ConsensusSubmitMessageTransactionBody),
        #[prost(message, tag = "29")]
        TokenCreation(super::TokenCreateTransactionBody),
        #[prost(message, tag = "37")]
        TokenMint(super::TokenMintTransactionBody),
        #[prost(message, tag = "38")]
        TokenBurn(super::TokenBurnTransactionBody),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CryptoCreateTransactionBody {
    #[prost(bytes = "vec", tag = "1")]
    pub key: ::prost::alloc::vec::Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub initial_balance: u64,
    #[prost(message, optional, tag = "8")]
    pub auto_renew_period: ::core::option::Option<Duration>,
    #[prost(string, tag = "13")]
    pub memo: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CryptoUpdateTransactionBody {
    #[prost(message, optional, tag = "2")]
    pub account_id_to_update: ::core::option::Option<AccountId>,
    #[prost(bytes = "vec", optional, tag = "3")]
    pub key: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(message, optional, tag = "8")]
    pub auto_renew_period: ::core::option::Option<Duration>,
    #[prost(message, optional, tag = "9")]
    pub expiration_time: ::core::option::Option<Timestamp>,
    #[prost(string, optional, tag = "14")]
    pub memo: ::core::option::Option<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CryptoDeleteTransactionBody {
    #[prost(message, optional, tag = "1")]
    pub transfer_account_id: ::core::option::Option<AccountId>,
    #[prost(message, optional, tag = "2")]
    pub delete_account_id: ::core::option::Option<AccountId>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CryptoTransferTransactionBody {
    #[prost(message, optional, tag = "1")]
    pub transfers: ::core::option::Option<TransferList>,
    #[prost(message, repeated, tag = "2")]
    pub token_transfers: ::prost::alloc::vec::Vec<TokenTransferList>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FreezeTransactionBody {
    #[prost(message, optional, tag = "6")]
    pub start_time: ::core::option::Option<Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConsensusCreateTopicTransactionBody {
    #[prost(string, tag = "1")]
    pub memo: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub admin_key: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub submit_key: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "6")]
    pub auto_renew_period: ::core::option::Option<Duration>,
    #[prost(message, optional, tag = "7")]
    pub auto_renew_account: ::core::option::Option<AccountId>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConsensusUpdateTopicTransactionBody {
    #[prost(message, optional, tag = "1")]
    pub topic_id: ::core::option::Option<TopicId>,
    #[prost(string, optional, tag = "2")]
    pub memo: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(message, optional, tag = "4")]
    pub expiration_time: ::core::option::Option<Timestamp>,
    #[prost(bytes = "vec", optional, tag = "6")]
    pub admin_key: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "7")]
    pub submit_key: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,
    #[prost(message, optional, tag = "8")]
    pub auto_renew_period: ::core::option::Option<Duration>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConsensusDeleteTopicTransactionBody {
    #[prost(message, optional, tag = "1")]
    pub topic_id: ::core::option::Option<TopicId>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConsensusMessageChunkInfo {
    #[prost(message, optional, tag = "1")]
    pub initial_transaction_id: ::core::option::Option<TransactionId>,
    #[prost(int32, tag = "2")]
    pub total: i32,
    #[prost(int32, tag = "3")]
    pub number: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConsensusSubmitMessageTransactionBody {
    #[prost(message, optional, tag = "1")]
    pub topic_id: ::core::option::Option<TopicId>,
    #[prost(bytes = "vec", tag = "2")]
    pub message: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub chunk_info: ::core::option::Option<ConsensusMessageChunkInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TokenCreateTransactionBody {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub symbol: ::prost::alloc::string::String,
    #[prost(uint32, tag = "3")]
    pub decimals: u32,
    #[prost(uint64, tag = "4")]
    pub initial_supply: u64,
    #[prost(message, optional, tag = "5")]
    pub treasury: ::core::option::Option<AccountId>,
    #[prost(bytes = "vec", tag = "6")]
    pub admin_key: ::prost::alloc::vec::Vec<u8>,
    #[prost(string, tag = "20")]
    pub memo: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TokenMintTransactionBody {
    #[prost(message, optional, tag = "1")]
    pub token: ::core::option::Option<TokenId>,
    #[prost(uint64, tag = "2")]
    pub amount: u64,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub metadata: ::prost::alloc::vec::Vec<::prost::alloc::vec::Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TokenBurnTransactionBody {
    #[prost(message, optional, tag = "1")]
    pub token: ::core::option::Option<TokenId>,
    #[prost(uint64, tag = "2")]
    pub amount: u64,
    #[prost(int64, repeated, tag = "3")]
    pub serial_numbers: ::prost::alloc::vec::Vec<i64>,
}

// Records

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionReceipt {
    #[prost(int32, tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub account_id: ::core::option::Option<AccountId>,
    #[prost(message, optional, tag = "6")]
    pub topic_id: ::core::option::Option<TopicId>,
    #[prost(uint64, tag = "7")]
    pub topic_sequence_number: u64,
    #[prost(bytes = "vec", tag = "8")]
    pub topic_running_hash: ::prost::alloc::vec::Vec<u8>,
    #[prost(uint64, tag = "9")]
    pub topic_running_hash_version: u64,
    #[prost(message, optional, tag = "10")]
    pub token_id: ::core::option::Option<TokenId>,
    #[prost(uint64, tag = "11")]
    pub new_total_supply: u64,
    #[prost(int64, repeated, tag = "14")]
    pub serial_numbers: ::prost::alloc::vec::Vec<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionRecord {
    #[prost(message, optional, tag = "1")]
    pub receipt: ::core::option::Option<TransactionReceipt>,
    #[prost(bytes = "vec", tag = "2")]
    pub transaction_hash: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub consensus_timestamp: ::core::option::Option<Timestamp>,
    #[prost(message, optional, tag = "4")]
    pub transaction_id: ::core::option::Option<TransactionId>,
    #[prost(string, tag = "5")]
    pub memo: ::prost::alloc::string::String,
    #[prost(uint64, tag = "6")]
    pub transaction_fee: u64,
    #[prost(message, optional, tag = "10")]
    pub transfer_list: ::core::option::Option<TransferList>,
    #[prost(message, repeated, tag = "11")]
    pub token_transfer_lists: ::prost::alloc::vec::Vec<TokenTransferList>,
    #[prost(message, optional, tag = "15")]
    pub parent_consensus_timestamp: ::core::option::Option<Timestamp>,
}

// Record stream v6

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum HashAlgorithm {
    HashAlgorithmUnknown = 0,
    Sha384 = 1,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HashObject {
    #[prost(enumeration = "HashAlgorithm", tag = "1")]
    pub algorithm: i32,
    #[prost(int32, tag = "2")]
    pub length: i32,
    #[prost(bytes = "vec", tag = "3")]
    pub hash: ::prost::alloc::vec::Vec<u8>,
}

/// One transaction and its record. Both are kept as raw bytes so decoding can
/// be deferred until the item is iterated.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RecordStreamItem {
    #[prost(bytes = "bytes", tag = "1")]
    pub transaction: ::bytes::Bytes,
    #[prost(bytes = "bytes", tag = "2")]
    pub record: ::bytes::Bytes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum SidecarType {
    SidecarTypeUnknown = 0,
    ContractStateChange = 1,
    ContractAction = 2,
    ContractBytecode = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SidecarMetadata {
    #[prost(message, optional, tag = "1")]
    pub hash: ::core::option::Option<HashObject>,
    #[prost(int32, tag = "2")]
    pub id: i32,
    #[prost(enumeration = "SidecarType", repeated, tag = "3")]
    pub types: ::prost::alloc::vec::Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RecordStreamFile {
    #[prost(message, optional, tag = "1")]
    pub hapi_proto_version: ::core::option::Option<SemanticVersion>,
    #[prost(message, optional, tag = "2")]
    pub start_object_running_hash: ::core::option::Option<HashObject>,
    #[prost(message, repeated, tag = "3")]
    pub record_stream_items: ::prost::alloc::vec::Vec<RecordStreamItem>,
    #[prost(message, optional, tag = "4")]
    pub end_object_running_hash: ::core::option::Option<HashObject>,
    #[prost(int64, tag = "5")]
    pub block_number: i64,
    #[prost(message, repeated, tag = "6")]
    pub sidecars: ::prost::alloc::vec::Vec<SidecarMetadata>,
}

// Signatures

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignatureObject {
    #[prost(int32, tag = "1")]
    pub signature_type: i32,
    #[prost(int32, tag = "2")]
    pub length: i32,
    #[prost(int32, tag = "3")]
    pub checksum: i32,
    #[prost(bytes = "vec", tag = "4")]
    pub signature: ::prost::alloc::vec::Vec<u8>,
    #[prost(message, optional, tag = "5")]
    pub hash_object: ::core::option::Option<HashObject>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignatureFile {
    #[prost(message, optional, tag = "1")]
    pub file_signature: ::core::option::Option<SignatureObject>,
    #[prost(message, optional, tag = "2")]
    pub metadata_signature: ::core::option::Option<SignatureObject>,
}

// Balances

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TokenUnitBalance {
    #[prost(message, optional, tag = "1")]
    pub token_id: ::core::option::Option<TokenId>,
    #[prost(uint64, tag = "2")]
    pub balance: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SingleAccountBalances {
    #[prost(message, optional, tag = "1")]
    pub account_id: ::core::option::Option<AccountId>,
    #[prost(uint64, tag = "2")]
    pub hbar_balance: u64,
    #[prost(message, repeated, tag = "3")]
    pub token_unit_balances: ::prost::alloc::vec::Vec<TokenUnitBalance>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AllAccountBalances {
    #[prost(message, optional, tag = "1")]
    pub consensus_timestamp: ::core::option::Option<Timestamp>,
    #[prost(message, repeated, tag = "2")]
    pub all_accounts: ::prost::alloc::vec::Vec<SingleAccountBalances>,
}

// Sidecars

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TransactionSidecarRecord {
    #[prost(message, optional, tag = "1")]
    pub consensus_timestamp: ::core::option::Option<Timestamp>,
    #[prost(bool, tag = "2")]
    pub migration: bool,
    #[prost(oneof = "transaction_sidecar_record::SidecarRecords", tags = "3, 4, 5")]
    pub sidecar_records: ::core::option::Option<transaction_sidecar_record::SidecarRecords>,
}

pub mod transaction_sidecar_record {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum SidecarRecords {
        #[prost(bytes, tag = "3")]
        StateChanges(::prost::alloc::vec::Vec<u8>),
        #[prost(bytes, tag = "4")]
        Actions(::prost::alloc::vec::Vec<u8>),
        #[prost(bytes, tag = "5")]
        Bytecode(::prost::alloc::vec::Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SidecarFile {
    #[prost(message, repeated, tag = "1")]
    pub sidecar_records: ::prost::alloc::vec::Vec<TransactionSidecarRecord>,
}

// Conversions to mirror types

impl Timestamp {
    /// Nanoseconds since the epoch.
    pub fn to_nanos(&self) -> mirror_common::Result<i64> {
        mirror_common::time::to_nanos(self.seconds, self.nanos)
    }

    pub fn from_nanos(timestamp: i64) -> Self {
        let (seconds, nanos) = mirror_common::time::split_nanos(timestamp);
        Self { seconds, nanos }
    }
}

impl AccountId {
    pub fn to_entity_id(&self) -> mirror_common::Result<mirror_common::EntityId> {
        mirror_common::EntityId::new(self.shard_num, self.realm_num, self.account_num)
    }

    pub fn from_entity_id(id: mirror_common::EntityId) -> Self {
        Self {
            shard_num: id.shard,
            realm_num: id.realm,
            account_num: id.num,
        }
    }
}

impl TopicId {
    pub fn to_entity_id(&self) -> mirror_common::Result<mirror_common::EntityId> {
        mirror_common::EntityId::new(self.shard_num, self.realm_num, self.topic_num)
    }

    pub fn from_entity_id(id: mirror_common::EntityId) -> Self {
        Self {
            shard_num: id.shard,
            realm_num: id.realm,
            topic_num: id.num,
        }
    }
}

impl TokenId {
    pub fn to_entity_id(&self) -> mirror_common::Result<mirror_common::EntityId> {
        mirror_common::EntityId::new(self.shard_num, self.realm_num, self.token_num)
    }

    pub fn from_entity_id(id: mirror_common::EntityId) -> Self {
        Self {
            shard_num: id.shard,
            realm_num: id.realm,
            token_num: id.num,
        }
    }
}

impl HashObject {
    pub fn sha384(hash: &mirror_common::Hash384) -> Self {
        Self {
            algorithm: HashAlgorithm::Sha384 as i32,
            length: mirror_common::HASH384_LEN as i32,
            hash: hash.as_bytes().to_vec(),
        }
    }
}

impl TransactionReceipt {
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS
    }
}
