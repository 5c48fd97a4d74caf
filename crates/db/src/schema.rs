//! Database schema definitions.
//!
//! # Tables
//!
//! - **Summaries**: `record_file`, `account_balance_file`, one row per
//!   persisted stream file keyed by its identity timestamp
//! - **Items**: `transaction`, `crypto_transfer`, `token_transfer`,
//!   `topic_message`, `account_balance`, `token_balance`, `sidecar_record`
//! - **Current state**: `entity` (with running hbar balance), `token`
//! - **Lookup**: `time_partition`, the time windows of partitioned tables
//! - **Operational**: `stream_gap`, `reconciliation_job`, `storestate`
//!
//! `transaction` is an SQL keyword, so the table name is always quoted.
//! The schema version lives in `storestate` and is managed by
//! [`migrations`](crate::migrations).

/// Complete SQL schema for a fresh database at
/// [`CURRENT_VERSION`](crate::migrations::CURRENT_VERSION).
pub const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS storestate (
    statename TEXT PRIMARY KEY,
    state TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS record_file (
    consensus_end INTEGER PRIMARY KEY,
    consensus_start INTEGER NOT NULL,
    name TEXT UNIQUE NOT NULL,
    version INTEGER NOT NULL,
    hapi_major INTEGER NOT NULL,
    hapi_minor INTEGER NOT NULL,
    hapi_patch INTEGER NOT NULL,
    count INTEGER NOT NULL,
    hash TEXT NOT NULL,
    previous_hash TEXT NOT NULL,
    file_hash TEXT NOT NULL,
    metadata_hash TEXT,
    block_number INTEGER NOT NULL,
    node_id INTEGER,
    size INTEGER NOT NULL,
    bytes BLOB,
    load_start INTEGER NOT NULL,
    load_end INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS record_file_block ON record_file(block_number);

CREATE TABLE IF NOT EXISTS account_balance_file (
    consensus_timestamp INTEGER PRIMARY KEY,
    name TEXT UNIQUE NOT NULL,
    count INTEGER NOT NULL,
    file_hash TEXT NOT NULL,
    node_id INTEGER,
    size INTEGER NOT NULL,
    bytes BLOB,
    load_start INTEGER NOT NULL,
    load_end INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS "transaction" (
    consensus_timestamp INTEGER PRIMARY KEY,
    type INTEGER NOT NULL,
    result INTEGER NOT NULL,
    payer_account_id INTEGER,
    node_account_id INTEGER,
    valid_start_ns INTEGER NOT NULL,
    valid_duration_seconds INTEGER,
    max_fee INTEGER NOT NULL,
    charged_tx_fee INTEGER NOT NULL,
    memo BLOB NOT NULL,
    entity_id INTEGER,
    transaction_hash BLOB NOT NULL,
    file_index INTEGER NOT NULL,
    nonce INTEGER NOT NULL,
    scheduled INTEGER NOT NULL,
    parent_consensus_timestamp INTEGER,
    transaction_bytes BLOB
);
CREATE INDEX IF NOT EXISTS transaction_payer ON "transaction"(payer_account_id, consensus_timestamp);

CREATE TABLE IF NOT EXISTS crypto_transfer (
    consensus_timestamp INTEGER NOT NULL,
    entity_id INTEGER NOT NULL,
    amount INTEGER NOT NULL,
    payer_account_id INTEGER
);
CREATE INDEX IF NOT EXISTS crypto_transfer_timestamp ON crypto_transfer(consensus_timestamp);
CREATE INDEX IF NOT EXISTS crypto_transfer_entity ON crypto_transfer(entity_id, consensus_timestamp);

CREATE TABLE IF NOT EXISTS token_transfer (
    consensus_timestamp INTEGER NOT NULL,
    token_id INTEGER NOT NULL,
    account_id INTEGER NOT NULL,
    amount INTEGER NOT NULL,
    payer_account_id INTEGER
);
CREATE INDEX IF NOT EXISTS token_transfer_timestamp ON token_transfer(consensus_timestamp);

CREATE TABLE IF NOT EXISTS entity (
    id INTEGER PRIMARY KEY,
    type TEXT NOT NULL,
    created_timestamp INTEGER,
    modified_timestamp INTEGER,
    expiration_timestamp INTEGER,
    auto_renew_period INTEGER,
    auto_renew_account_id INTEGER,
    key BLOB,
    submit_key BLOB,
    memo TEXT,
    deleted INTEGER,
    balance INTEGER NOT NULL DEFAULT 0,
    balance_timestamp INTEGER
);

CREATE TABLE IF NOT EXISTS topic_message (
    consensus_timestamp INTEGER PRIMARY KEY,
    topic_id INTEGER NOT NULL,
    message BLOB NOT NULL,
    running_hash BLOB NOT NULL,
    running_hash_version INTEGER NOT NULL,
    sequence_number INTEGER NOT NULL,
    payer_account_id INTEGER,
    chunk_num INTEGER,
    chunk_total INTEGER,
    initial_valid_start INTEGER
);
CREATE UNIQUE INDEX IF NOT EXISTS topic_message_sequence ON topic_message(topic_id, sequence_number);

CREATE TABLE IF NOT EXISTS token (
    token_id INTEGER PRIMARY KEY,
    created_timestamp INTEGER,
    modified_timestamp INTEGER NOT NULL,
    name TEXT,
    symbol TEXT,
    decimals INTEGER,
    initial_supply INTEGER,
    total_supply INTEGER,
    treasury_account_id INTEGER
);

CREATE TABLE IF NOT EXISTS account_balance (
    consensus_timestamp INTEGER NOT NULL,
    account_id INTEGER NOT NULL,
    balance INTEGER NOT NULL,
    PRIMARY KEY (consensus_timestamp, account_id)
);

CREATE TABLE IF NOT EXISTS token_balance (
    consensus_timestamp INTEGER NOT NULL,
    account_id INTEGER NOT NULL,
    token_id INTEGER NOT NULL,
    balance INTEGER NOT NULL,
    PRIMARY KEY (consensus_timestamp, account_id, token_id)
);

CREATE TABLE IF NOT EXISTS sidecar_record (
    consensus_timestamp INTEGER NOT NULL,
    sidecar_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    kind TEXT NOT NULL,
    migration INTEGER NOT NULL,
    data BLOB NOT NULL,
    PRIMARY KEY (sidecar_id, consensus_timestamp, position)
);

CREATE TABLE IF NOT EXISTS time_partition (
    name TEXT PRIMARY KEY,
    parent TEXT NOT NULL,
    from_timestamp INTEGER NOT NULL,
    to_timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS time_partition_parent ON time_partition(parent, from_timestamp);

CREATE TABLE IF NOT EXISTS stream_gap (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stream_type TEXT NOT NULL,
    filename TEXT NOT NULL,
    consensus_timestamp INTEGER NOT NULL,
    reason TEXT NOT NULL,
    retries INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS reconciliation_job (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at INTEGER NOT NULL,
    finished_at INTEGER,
    status TEXT NOT NULL,
    timestamp_start INTEGER,
    timestamp_end INTEGER,
    count INTEGER NOT NULL DEFAULT 0,
    error TEXT
);
"#;

/// Well-known keys for the `storestate` table.
pub mod state_keys {
    /// Current database schema version, managed by the migration system.
    pub const DATABASE_SCHEMA: &str = "databaseschema";

    /// Network the database was created for. A node refuses to ingest
    /// into a database of another network.
    pub const NETWORK: &str = "network";

    /// Consensus timestamp of the last balance file that reconciled.
    pub const LAST_RECONCILED_BALANCE: &str = "lastreconciledbalance";
}
