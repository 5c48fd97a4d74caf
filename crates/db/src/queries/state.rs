//! Key-value queries for the `storestate` table.
//!
//! See [`state_keys`] for the well-known keys.

use mirror_common::NetworkKind;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::DbError;
use crate::schema::state_keys;

/// Query trait for the storestate key-value table.
pub trait StateQueries {
    /// Returns `None` if the key does not exist.
    fn get_state(&self, key: &str) -> Result<Option<String>, DbError>;

    /// Inserts or replaces a value.
    fn set_state(&self, key: &str, value: &str) -> Result<(), DbError>;

    fn delete_state(&self, key: &str) -> Result<(), DbError>;

    /// Network recorded when the database was created.
    fn get_network(&self) -> Result<Option<NetworkKind>, DbError>;

    fn set_network(&self, network: NetworkKind) -> Result<(), DbError>;
}

impl StateQueries for Connection {
    fn get_state(&self, key: &str) -> Result<Option<String>, DbError> {
        let result = self
            .query_row(
                "SELECT state FROM storestate WHERE statename = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    fn set_state(&self, key: &str, value: &str) -> Result<(), DbError> {
        self.execute(
            "INSERT OR REPLACE INTO storestate (statename, state) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete_state(&self, key: &str) -> Result<(), DbError> {
        self.execute("DELETE FROM storestate WHERE statename = ?1", params![key])?;
        Ok(())
    }

    fn get_network(&self) -> Result<Option<NetworkKind>, DbError> {
        match self.get_state(state_keys::NETWORK)? {
            Some(name) => name
                .parse::<NetworkKind>()
                .map(Some)
                .map_err(|e| DbError::Integrity(format!("stored network {:?}: {}", name, e))),
            None => Ok(None),
        }
    }

    fn set_network(&self, network: NetworkKind) -> Result<(), DbError> {
        self.set_state(state_keys::NETWORK, network.as_str())
    }
}
