//! Token metadata and supply.

use mirror_common::EntityId;
use mirror_parser::Token;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::DbError;

pub trait TokenQueries {
    /// Inserts the token or merges the fields it sets into the stored row.
    fn upsert_token(&self, token: &Token) -> Result<(), DbError>;

    fn load_token(&self, token_id: EntityId) -> Result<Option<Token>, DbError>;
}

impl TokenQueries for Connection {
    fn upsert_token(&self, token: &Token) -> Result<(), DbError> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO token (token_id, created_timestamp, modified_timestamp, name, symbol, \
             decimals, initial_supply, total_supply, treasury_account_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(token_id) DO UPDATE SET \
             created_timestamp = COALESCE(excluded.created_timestamp, token.created_timestamp), \
             modified_timestamp = excluded.modified_timestamp, \
             name = COALESCE(excluded.name, token.name), \
             symbol = COALESCE(excluded.symbol, token.symbol), \
             decimals = COALESCE(excluded.decimals, token.decimals), \
             initial_supply = COALESCE(excluded.initial_supply, token.initial_supply), \
             total_supply = COALESCE(excluded.total_supply, token.total_supply), \
             treasury_account_id = COALESCE(excluded.treasury_account_id, token.treasury_account_id)",
        )?;
        stmt.execute(params![
            token.token_id.encode(),
            token.created_timestamp,
            token.modified_timestamp,
            token.name,
            token.symbol,
            token.decimals,
            token.initial_supply,
            token.total_supply,
            token.treasury_account_id.map(|id| id.encode()),
        ])?;
        Ok(())
    }

    fn load_token(&self, token_id: EntityId) -> Result<Option<Token>, DbError> {
        let token = self
            .query_row(
                "SELECT created_timestamp, modified_timestamp, name, symbol, decimals, \
                 initial_supply, total_supply, treasury_account_id \
                 FROM token WHERE token_id = ?1",
                params![token_id.encode()],
                |row| {
                    Ok(Token {
                        token_id,
                        created_timestamp: row.get(0)?,
                        modified_timestamp: row.get(1)?,
                        name: row.get(2)?,
                        symbol: row.get(3)?,
                        decimals: row.get(4)?,
                        initial_supply: row.get(5)?,
                        total_supply: row.get(6)?,
                        treasury_account_id: row.get::<_, Option<i64>>(7)?.map(EntityId::decode),
                    })
                },
            )
            .optional()?;
        Ok(token)
    }
}
