//! Account and token balance snapshots.

use std::collections::BTreeMap;

use mirror_common::EntityId;
use mirror_parser::{AccountBalanceRow, TokenBalanceRow};
use rusqlite::{params, Connection};

use crate::error::DbError;

pub trait BalanceQueries {
    fn insert_account_balances(&self, rows: &[AccountBalanceRow]) -> Result<usize, DbError>;

    fn insert_token_balances(&self, rows: &[TokenBalanceRow]) -> Result<usize, DbError>;

    /// Hbar balance per account of the snapshot at `consensus_timestamp`.
    fn load_account_balances(
        &self,
        consensus_timestamp: i64,
    ) -> Result<BTreeMap<EntityId, i64>, DbError>;

    fn load_token_balances(&self, consensus_timestamp: i64)
        -> Result<Vec<TokenBalanceRow>, DbError>;
}

impl BalanceQueries for Connection {
    fn insert_account_balances(&self, rows: &[AccountBalanceRow]) -> Result<usize, DbError> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO account_balance (consensus_timestamp, account_id, balance) \
             VALUES (?1, ?2, ?3)",
        )?;
        for row in rows {
            stmt.execute(params![
                row.consensus_timestamp,
                row.account_id.encode(),
                row.balance
            ])?;
        }
        Ok(rows.len())
    }

    fn insert_token_balances(&self, rows: &[TokenBalanceRow]) -> Result<usize, DbError> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO token_balance (consensus_timestamp, account_id, token_id, balance) \
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for row in rows {
            stmt.execute(params![
                row.consensus_timestamp,
                row.account_id.encode(),
                row.token_id.encode(),
                row.balance
            ])?;
        }
        Ok(rows.len())
    }

    fn load_account_balances(
        &self,
        consensus_timestamp: i64,
    ) -> Result<BTreeMap<EntityId, i64>, DbError> {
        let mut stmt = self.prepare(
            "SELECT account_id, balance FROM account_balance WHERE consensus_timestamp = ?1",
        )?;
        let mut balances = BTreeMap::new();
        let mut rows = stmt.query(params![consensus_timestamp])?;
        while let Some(row) = rows.next()? {
            balances.insert(EntityId::decode(row.get(0)?), row.get(1)?);
        }
        Ok(balances)
    }

    fn load_token_balances(
        &self,
        consensus_timestamp: i64,
    ) -> Result<Vec<TokenBalanceRow>, DbError> {
        let mut stmt = self.prepare(
            "SELECT account_id, token_id, balance FROM token_balance \
             WHERE consensus_timestamp = ?1 ORDER BY account_id, token_id",
        )?;
        let rows = stmt
            .query_map(params![consensus_timestamp], |row| {
                Ok(TokenBalanceRow {
                    consensus_timestamp,
                    account_id: EntityId::decode(row.get(0)?),
                    token_id: EntityId::decode(row.get(1)?),
                    balance: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
