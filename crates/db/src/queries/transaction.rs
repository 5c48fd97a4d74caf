//! Transactions and their hbar and token transfers.

use std::collections::BTreeMap;

use mirror_common::EntityId;
use mirror_parser::{CryptoTransfer, TokenTransfer, Transaction};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::DbError;

/// Query trait for the `transaction`, `crypto_transfer` and
/// `token_transfer` tables.
pub trait TransactionQueries {
    /// Inserts in order. Returns the number of rows written.
    fn insert_transactions(&self, transactions: &[Transaction]) -> Result<usize, DbError>;

    fn insert_crypto_transfers(&self, transfers: &[CryptoTransfer]) -> Result<usize, DbError>;

    fn insert_token_transfers(&self, transfers: &[TokenTransfer]) -> Result<usize, DbError>;

    fn load_transaction(&self, consensus_timestamp: i64) -> Result<Option<Transaction>, DbError>;

    fn count_transactions(&self) -> Result<i64, DbError>;

    fn load_crypto_transfers(
        &self,
        consensus_timestamp: i64,
    ) -> Result<Vec<CryptoTransfer>, DbError>;

    /// Net hbar change per account over transfers in `(after, up_to]`.
    fn sum_crypto_transfers(
        &self,
        after: i64,
        up_to: i64,
    ) -> Result<BTreeMap<EntityId, i64>, DbError>;
}

fn entity(id: Option<EntityId>) -> Option<i64> {
    id.map(|id| id.encode())
}

fn transaction_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let decode = |value: Option<i64>| value.map(EntityId::decode);
    Ok(Transaction {
        consensus_timestamp: row.get(0)?,
        transaction_type: row.get(1)?,
        result: row.get(2)?,
        payer_account_id: decode(row.get(3)?),
        node_account_id: decode(row.get(4)?),
        valid_start_ns: row.get(5)?,
        valid_duration_seconds: row.get(6)?,
        max_fee: row.get(7)?,
        charged_tx_fee: row.get(8)?,
        memo: row.get(9)?,
        entity_id: decode(row.get(10)?),
        transaction_hash: row.get(11)?,
        index: row.get(12)?,
        nonce: row.get(13)?,
        scheduled: row.get(14)?,
        parent_consensus_timestamp: row.get(15)?,
        transaction_bytes: row.get(16)?,
    })
}

impl TransactionQueries for Connection {
    fn insert_transactions(&self, transactions: &[Transaction]) -> Result<usize, DbError> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO \"transaction\" (consensus_timestamp, type, result, payer_account_id, \
             node_account_id, valid_start_ns, valid_duration_seconds, max_fee, charged_tx_fee, \
             memo, entity_id, transaction_hash, file_index, nonce, scheduled, \
             parent_consensus_timestamp, transaction_bytes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )?;
        for tx in transactions {
            stmt.execute(params![
                tx.consensus_timestamp,
                tx.transaction_type,
                tx.result,
                entity(tx.payer_account_id),
                entity(tx.node_account_id),
                tx.valid_start_ns,
                tx.valid_duration_seconds,
                tx.max_fee,
                tx.charged_tx_fee,
                tx.memo,
                entity(tx.entity_id),
                tx.transaction_hash,
                tx.index,
                tx.nonce,
                tx.scheduled,
                tx.parent_consensus_timestamp,
                tx.transaction_bytes,
            ])?;
        }
        Ok(transactions.len())
    }

    fn insert_crypto_transfers(&self, transfers: &[CryptoTransfer]) -> Result<usize, DbError> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO crypto_transfer (consensus_timestamp, entity_id, amount, payer_account_id) \
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for transfer in transfers {
            stmt.execute(params![
                transfer.consensus_timestamp,
                transfer.entity_id.encode(),
                transfer.amount,
                entity(transfer.payer_account_id),
            ])?;
        }
        Ok(transfers.len())
    }

    fn insert_token_transfers(&self, transfers: &[TokenTransfer]) -> Result<usize, DbError> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO token_transfer (consensus_timestamp, token_id, account_id, amount, \
             payer_account_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for transfer in transfers {
            stmt.execute(params![
                transfer.consensus_timestamp,
                transfer.token_id.encode(),
                transfer.account_id.encode(),
                transfer.amount,
                entity(transfer.payer_account_id),
            ])?;
        }
        Ok(transfers.len())
    }

    fn load_transaction(&self, consensus_timestamp: i64) -> Result<Option<Transaction>, DbError> {
        let tx = self
            .query_row(
                "SELECT consensus_timestamp, type, result, payer_account_id, node_account_id, \
                 valid_start_ns, valid_duration_seconds, max_fee, charged_tx_fee, memo, \
                 entity_id, transaction_hash, file_index, nonce, scheduled, \
                 parent_consensus_timestamp, transaction_bytes \
                 FROM \"transaction\" WHERE consensus_timestamp = ?1",
                params![consensus_timestamp],
                transaction_row,
            )
            .optional()?;
        Ok(tx)
    }

    fn count_transactions(&self) -> Result<i64, DbError> {
        Ok(self.query_row("SELECT COUNT(*) FROM \"transaction\"", [], |row| row.get(0))?)
    }

    fn load_crypto_transfers(
        &self,
        consensus_timestamp: i64,
    ) -> Result<Vec<CryptoTransfer>, DbError> {
        let mut stmt = self.prepare(
            "SELECT consensus_timestamp, entity_id, amount, payer_account_id \
             FROM crypto_transfer WHERE consensus_timestamp = ?1 ORDER BY rowid",
        )?;
        let transfers = stmt
            .query_map(params![consensus_timestamp], |row| {
                Ok(CryptoTransfer {
                    consensus_timestamp: row.get(0)?,
                    entity_id: EntityId::decode(row.get(1)?),
                    amount: row.get(2)?,
                    payer_account_id: row.get::<_, Option<i64>>(3)?.map(EntityId::decode),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(transfers)
    }

    fn sum_crypto_transfers(
        &self,
        after: i64,
        up_to: i64,
    ) -> Result<BTreeMap<EntityId, i64>, DbError> {
        let mut stmt = self.prepare(
            "SELECT entity_id, SUM(amount) FROM crypto_transfer \
             WHERE consensus_timestamp > ?1 AND consensus_timestamp <= ?2 \
             GROUP BY entity_id",
        )?;
        let mut sums = BTreeMap::new();
        let mut rows = stmt.query(params![after, up_to])?;
        while let Some(row) = rows.next()? {
            sums.insert(EntityId::decode(row.get(0)?), row.get(1)?);
        }
        Ok(sums)
    }
}
