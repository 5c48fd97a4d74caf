//! Transactional persistence of parsed stream files.
//!
//! [`BatchPersister`] writes one file and every row parsed from it in a
//! single SQLite transaction. The file's summary row doubles as the
//! idempotency key: a file whose identity is already stored is acknowledged
//! without writing anything. Side effects that must only happen once the
//! data is durable run as [`PostCommitHook`]s, in registration order, after
//! the commit.

use std::sync::Arc;

use mirror_common::time::current_timestamp_nanos;
use mirror_common::EntityId;
use mirror_parser::{ParserContext, TopicMessage};
use mirror_streams::{AccountBalanceFile, RecordFile, StreamType};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::partition::TimePartitionService;
use crate::queries::{
    BalanceQueries, EntityQueries, SidecarQueries, StreamFileQueries, TokenQueries,
    TopicMessageQueries, TransactionQueries,
};
use crate::{Database, Result};

/// Rows written for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistStats {
    pub transactions: usize,
    pub crypto_transfers: usize,
    pub token_transfers: usize,
    pub entities: usize,
    pub balance_updates: usize,
    pub tokens: usize,
    pub topic_messages: usize,
    pub account_balances: usize,
    pub token_balances: usize,
    pub sidecar_records: usize,
    pub partitions_created: usize,
}

impl PersistStats {
    /// Item rows written, excluding the summary row and partitions.
    pub fn total_rows(&self) -> usize {
        self.transactions
            + self.crypto_transfers
            + self.token_transfers
            + self.entities
            + self.balance_updates
            + self.tokens
            + self.topic_messages
            + self.account_balances
            + self.token_balances
            + self.sidecar_records
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Inserted(PersistStats),
    /// The file was already stored; nothing was written and no hook ran.
    AlreadyPersisted,
}

impl PersistOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, PersistOutcome::Inserted(_))
    }

    pub fn stats(&self) -> Option<&PersistStats> {
        match self {
            PersistOutcome::Inserted(stats) => Some(stats),
            PersistOutcome::AlreadyPersisted => None,
        }
    }
}

/// What a hook learns about a committed file.
#[derive(Debug, Clone)]
pub struct CommittedFile {
    pub stream_type: StreamType,
    pub name: String,
    pub consensus_end: i64,
    pub new_entity_ids: Vec<EntityId>,
    pub topic_messages: Vec<TopicMessage>,
    pub stats: PersistStats,
}

/// A side effect run after a file's transaction commits.
///
/// Hooks cannot fail the persist; they log their own errors.
pub trait PostCommitHook: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_commit(&self, file: &CommittedFile);
}

/// Writes parsed stream files.
pub struct BatchPersister {
    db: Database,
    partitions: Arc<TimePartitionService>,
    hooks: Vec<Arc<dyn PostCommitHook>>,
}

impl BatchPersister {
    /// The partition service is the first hook.
    pub fn new(db: Database, partitions: Arc<TimePartitionService>) -> Self {
        let first: Arc<dyn PostCommitHook> = partitions.clone();
        Self {
            db,
            partitions,
            hooks: vec![first],
        }
    }

    /// Appends a hook after the existing ones.
    pub fn with_hook(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn hook_names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|hook| hook.name()).collect()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn partitions(&self) -> &Arc<TimePartitionService> {
        &self.partitions
    }

    /// Persists a record file and its parsed rows. The file must carry its
    /// block number.
    pub fn persist_record_file(
        &self,
        file: &RecordFile,
        ctx: &ParserContext,
    ) -> Result<PersistOutcome> {
        let load_start = current_timestamp_nanos();
        let stats = self.db.transaction(|tx| {
            if tx.record_file_exists(file.consensus_end)? {
                return Ok(None);
            }
            let mut stats = PersistStats {
                partitions_created: self.partitions.ensure_partitions(
                    tx,
                    file.consensus_start,
                    file.consensus_end,
                )?,
                ..Default::default()
            };
            insert_items(tx, ctx, &mut stats)?;
            stats.balance_updates = tx.apply_balance_deltas(ctx.balance_deltas(), file.consensus_end)?;
            tx.insert_record_file(file, load_start, current_timestamp_nanos())?;
            Ok(Some(stats))
        })?;

        let Some(stats) = stats else {
            info!(file = %file.name, "Record file already persisted, skipping");
            return Ok(PersistOutcome::AlreadyPersisted);
        };
        info!(
            file = %file.name,
            index = ?file.index,
            transactions = stats.transactions,
            rows = stats.total_rows(),
            "Persisted record file"
        );
        self.run_hooks(&CommittedFile {
            stream_type: StreamType::Record,
            name: file.name.clone(),
            consensus_end: file.consensus_end,
            new_entity_ids: ctx.new_entity_ids(),
            topic_messages: ctx.topic_messages().to_vec(),
            stats,
        });
        Ok(PersistOutcome::Inserted(stats))
    }

    /// Persists a balance snapshot and its parsed rows.
    pub fn persist_balance_file(
        &self,
        file: &AccountBalanceFile,
        ctx: &ParserContext,
    ) -> Result<PersistOutcome> {
        let load_start = current_timestamp_nanos();
        let stats = self.db.transaction(|tx| {
            if tx.account_balance_file_exists(file.consensus_timestamp)? {
                return Ok(None);
            }
            let mut stats = PersistStats {
                partitions_created: self.partitions.ensure_partitions(
                    tx,
                    file.consensus_timestamp,
                    file.consensus_timestamp,
                )?,
                ..Default::default()
            };
            insert_items(tx, ctx, &mut stats)?;
            tx.insert_account_balance_file(file, load_start, current_timestamp_nanos())?;
            Ok(Some(stats))
        })?;

        let Some(stats) = stats else {
            info!(file = %file.name, "Balance file already persisted, skipping");
            return Ok(PersistOutcome::AlreadyPersisted);
        };
        info!(
            file = %file.name,
            accounts = stats.account_balances,
            token_balances = stats.token_balances,
            "Persisted balance file"
        );
        self.run_hooks(&CommittedFile {
            stream_type: StreamType::Balance,
            name: file.name.clone(),
            consensus_end: file.consensus_timestamp,
            new_entity_ids: Vec::new(),
            topic_messages: Vec::new(),
            stats,
        });
        Ok(PersistOutcome::Inserted(stats))
    }

    fn run_hooks(&self, file: &CommittedFile) {
        for hook in &self.hooks {
            debug!(hook = hook.name(), file = %file.name, "Running post-commit hook");
            hook.on_commit(file);
        }
    }
}

/// Inserts every pending row of `ctx`, table by table, each in parse order.
fn insert_items(conn: &Connection, ctx: &ParserContext, stats: &mut PersistStats) -> Result<()> {
    stats.transactions = conn.insert_transactions(ctx.transactions())?;
    stats.crypto_transfers = conn.insert_crypto_transfers(ctx.crypto_transfers())?;
    stats.token_transfers = conn.insert_token_transfers(ctx.token_transfers())?;
    for entity in ctx.entities() {
        conn.upsert_entity(entity)?;
        stats.entities += 1;
    }
    for token in ctx.tokens() {
        conn.upsert_token(token)?;
        stats.tokens += 1;
    }
    stats.topic_messages = conn.insert_topic_messages(ctx.topic_messages())?;
    stats.account_balances = conn.insert_account_balances(ctx.account_balances())?;
    stats.token_balances = conn.insert_token_balances(ctx.token_balances())?;
    stats.sidecar_records = conn.insert_sidecar_records(ctx.sidecar_records())?;
    Ok(())
}
