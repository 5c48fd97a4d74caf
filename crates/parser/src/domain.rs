//! Rows produced by the parsers.
//!
//! Each type maps to one persisted table. Optional fields of [`Entity`] and
//! [`Token`] are partial updates: `None` leaves the stored value untouched.

use mirror_common::EntityId;
use mirror_streams::model::SidecarKind;
use serde::{Deserialize, Serialize};

/// Kind of ledger entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Account,
    Topic,
    Token,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Account => "ACCOUNT",
            EntityType::Topic => "TOPIC",
            EntityType::Token => "TOKEN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACCOUNT" => Some(EntityType::Account),
            "TOPIC" => Some(EntityType::Topic),
            "TOKEN" => Some(EntityType::Token),
            _ => None,
        }
    }
}

/// One transaction, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    pub consensus_timestamp: i64,
    /// Body field number; `-1` for unrecognised bodies.
    pub transaction_type: i32,
    pub result: i32,
    pub payer_account_id: Option<EntityId>,
    pub node_account_id: Option<EntityId>,
    pub valid_start_ns: i64,
    pub valid_duration_seconds: Option<i64>,
    pub max_fee: i64,
    pub charged_tx_fee: i64,
    pub memo: Vec<u8>,
    /// Main entity the transaction acts on.
    pub entity_id: Option<EntityId>,
    pub transaction_hash: Vec<u8>,
    /// Position within the record file.
    pub index: i32,
    pub nonce: i32,
    pub scheduled: bool,
    pub parent_consensus_timestamp: Option<i64>,
    pub transaction_bytes: Option<Vec<u8>>,
}

/// One hbar transfer of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CryptoTransfer {
    pub consensus_timestamp: i64,
    pub entity_id: EntityId,
    pub amount: i64,
    pub payer_account_id: Option<EntityId>,
}

/// One token transfer of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenTransfer {
    pub consensus_timestamp: i64,
    pub token_id: EntityId,
    pub account_id: EntityId,
    pub amount: i64,
    pub payer_account_id: Option<EntityId>,
}

/// Insert-or-update of an account, topic or token entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub id: EntityId,
    pub entity_type: EntityType,
    pub created_timestamp: Option<i64>,
    pub modified_timestamp: Option<i64>,
    pub expiration_timestamp: Option<i64>,
    pub auto_renew_period: Option<i64>,
    pub auto_renew_account_id: Option<EntityId>,
    pub key: Option<Vec<u8>>,
    pub submit_key: Option<Vec<u8>>,
    pub memo: Option<String>,
    pub deleted: Option<bool>,
}

impl Entity {
    pub fn new(id: EntityId, entity_type: EntityType) -> Self {
        Self {
            id,
            entity_type,
            created_timestamp: None,
            modified_timestamp: None,
            expiration_timestamp: None,
            auto_renew_period: None,
            auto_renew_account_id: None,
            key: None,
            submit_key: None,
            memo: None,
            deleted: None,
        }
    }

    /// Applies a later update: every field it sets overrides ours.
    pub fn merge(&mut self, later: Entity) {
        fn take<T>(ours: &mut Option<T>, theirs: Option<T>) {
            if theirs.is_some() {
                *ours = theirs;
            }
        }
        take(&mut self.created_timestamp, later.created_timestamp);
        take(&mut self.modified_timestamp, later.modified_timestamp);
        take(&mut self.expiration_timestamp, later.expiration_timestamp);
        take(&mut self.auto_renew_period, later.auto_renew_period);
        take(&mut self.auto_renew_account_id, later.auto_renew_account_id);
        take(&mut self.key, later.key);
        take(&mut self.submit_key, later.submit_key);
        take(&mut self.memo, later.memo);
        take(&mut self.deleted, later.deleted);
    }
}

/// An HCS message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicMessage {
    pub consensus_timestamp: i64,
    pub topic_id: EntityId,
    pub message: Vec<u8>,
    pub running_hash: Vec<u8>,
    pub running_hash_version: i64,
    pub sequence_number: i64,
    pub payer_account_id: Option<EntityId>,
    pub chunk_num: Option<i32>,
    pub chunk_total: Option<i32>,
    pub initial_valid_start: Option<i64>,
}

/// Insert-or-update of a token's metadata and supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub token_id: EntityId,
    pub created_timestamp: Option<i64>,
    pub modified_timestamp: i64,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<i64>,
    pub initial_supply: Option<i64>,
    pub total_supply: Option<i64>,
    pub treasury_account_id: Option<EntityId>,
}

impl Token {
    pub fn update(token_id: EntityId, modified_timestamp: i64) -> Self {
        Self {
            token_id,
            created_timestamp: None,
            modified_timestamp,
            name: None,
            symbol: None,
            decimals: None,
            initial_supply: None,
            total_supply: None,
            treasury_account_id: None,
        }
    }

    pub fn merge(&mut self, later: Token) {
        self.modified_timestamp = later.modified_timestamp;
        if later.created_timestamp.is_some() {
            self.created_timestamp = later.created_timestamp;
        }
        if later.name.is_some() {
            self.name = later.name;
        }
        if later.symbol.is_some() {
            self.symbol = later.symbol;
        }
        if later.decimals.is_some() {
            self.decimals = later.decimals;
        }
        if later.initial_supply.is_some() {
            self.initial_supply = later.initial_supply;
        }
        if later.total_supply.is_some() {
            self.total_supply = later.total_supply;
        }
        if later.treasury_account_id.is_some() {
            self.treasury_account_id = later.treasury_account_id;
        }
    }
}

/// Hbar balance of an account at a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountBalanceRow {
    pub consensus_timestamp: i64,
    pub account_id: EntityId,
    pub balance: i64,
}

/// Token balance of an account at a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenBalanceRow {
    pub consensus_timestamp: i64,
    pub account_id: EntityId,
    pub token_id: EntityId,
    pub balance: i64,
}

/// One sidecar record, payload kept opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarRow {
    pub consensus_timestamp: i64,
    pub sidecar_id: u32,
    /// Position within its sidecar file.
    pub index: i32,
    pub kind: SidecarKind,
    pub migration: bool,
    pub data: Vec<u8>,
}
