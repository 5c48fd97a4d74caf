//! Current state of accounts, topics and tokens.
//!
//! Entity updates are partial: a `NULL` column in an update keeps the stored
//! value. Hbar balances are maintained as a running sum of transfers.

use std::collections::BTreeMap;

use mirror_common::EntityId;
use mirror_parser::{Entity, EntityType};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::DbError;

/// A stored `entity` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRow {
    pub entity: Entity,
    pub balance: i64,
    pub balance_timestamp: Option<i64>,
}

/// Query trait for the `entity` table.
pub trait EntityQueries {
    /// Inserts the entity or merges the fields it sets into the stored row.
    fn upsert_entity(&self, entity: &Entity) -> Result<(), DbError>;

    /// Adds each delta to the entity's balance. Unknown entities are created
    /// as accounts.
    fn apply_balance_deltas(
        &self,
        deltas: &BTreeMap<EntityId, i64>,
        consensus_timestamp: i64,
    ) -> Result<usize, DbError>;

    fn load_entity(&self, id: EntityId) -> Result<Option<EntityRow>, DbError>;

    /// Balances of every entity, as of the last applied transfer.
    fn load_entity_balances(&self) -> Result<BTreeMap<EntityId, i64>, DbError>;
}

impl EntityQueries for Connection {
    fn upsert_entity(&self, entity: &Entity) -> Result<(), DbError> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO entity (id, type, created_timestamp, modified_timestamp, \
             expiration_timestamp, auto_renew_period, auto_renew_account_id, key, submit_key, \
             memo, deleted) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
             ON CONFLICT(id) DO UPDATE SET \
             created_timestamp = COALESCE(excluded.created_timestamp, entity.created_timestamp), \
             modified_timestamp = COALESCE(excluded.modified_timestamp, entity.modified_timestamp), \
             expiration_timestamp = COALESCE(excluded.expiration_timestamp, entity.expiration_timestamp), \
             auto_renew_period = COALESCE(excluded.auto_renew_period, entity.auto_renew_period), \
             auto_renew_account_id = COALESCE(excluded.auto_renew_account_id, entity.auto_renew_account_id), \
             key = COALESCE(excluded.key, entity.key), \
             submit_key = COALESCE(excluded.submit_key, entity.submit_key), \
             memo = COALESCE(excluded.memo, entity.memo), \
             deleted = COALESCE(excluded.deleted, entity.deleted)",
        )?;
        stmt.execute(params![
            entity.id.encode(),
            entity.entity_type.as_str(),
            entity.created_timestamp,
            entity.modified_timestamp,
            entity.expiration_timestamp,
            entity.auto_renew_period,
            entity.auto_renew_account_id.map(|id| id.encode()),
            entity.key,
            entity.submit_key,
            entity.memo,
            entity.deleted,
        ])?;
        Ok(())
    }

    fn apply_balance_deltas(
        &self,
        deltas: &BTreeMap<EntityId, i64>,
        consensus_timestamp: i64,
    ) -> Result<usize, DbError> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO entity (id, type, balance, balance_timestamp) VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(id) DO UPDATE SET \
             balance = entity.balance + excluded.balance, \
             balance_timestamp = excluded.balance_timestamp",
        )?;
        for (id, delta) in deltas {
            stmt.execute(params![
                id.encode(),
                EntityType::Account.as_str(),
                delta,
                consensus_timestamp
            ])?;
        }
        Ok(deltas.len())
    }

    fn load_entity(&self, id: EntityId) -> Result<Option<EntityRow>, DbError> {
        let row = self
            .query_row(
                "SELECT type, created_timestamp, modified_timestamp, expiration_timestamp, \
                 auto_renew_period, auto_renew_account_id, key, submit_key, memo, deleted, \
                 balance, balance_timestamp FROM entity WHERE id = ?1",
                params![id.encode()],
                |row| {
                    let kind: String = row.get(0)?;
                    let mut entity = Entity::new(id, EntityType::Account);
                    entity.created_timestamp = row.get(1)?;
                    entity.modified_timestamp = row.get(2)?;
                    entity.expiration_timestamp = row.get(3)?;
                    entity.auto_renew_period = row.get(4)?;
                    entity.auto_renew_account_id =
                        row.get::<_, Option<i64>>(5)?.map(EntityId::decode);
                    entity.key = row.get(6)?;
                    entity.submit_key = row.get(7)?;
                    entity.memo = row.get(8)?;
                    entity.deleted = row.get(9)?;
                    let balance: i64 = row.get(10)?;
                    let balance_timestamp: Option<i64> = row.get(11)?;
                    Ok((kind, entity, balance, balance_timestamp))
                },
            )
            .optional()?;

        let Some((kind, mut entity, balance, balance_timestamp)) = row else {
            return Ok(None);
        };
        entity.entity_type = EntityType::parse(&kind)
            .ok_or_else(|| DbError::Integrity(format!("entity {} has type {:?}", id, kind)))?;
        Ok(Some(EntityRow {
            entity,
            balance,
            balance_timestamp,
        }))
    }

    fn load_entity_balances(&self) -> Result<BTreeMap<EntityId, i64>, DbError> {
        let mut stmt = self.prepare("SELECT id, balance FROM entity")?;
        let mut balances = BTreeMap::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            balances.insert(EntityId::decode(row.get(0)?), row.get(1)?);
        }
        Ok(balances)
    }
}
