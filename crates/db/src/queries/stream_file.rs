//! Summary rows of persisted stream files.
//!
//! One `record_file` row per record file, keyed by its consensus end, and
//! one `account_balance_file` row per balance snapshot, keyed by its
//! consensus timestamp. The presence of a row is what makes persisting a
//! file idempotent.

use mirror_common::Hash384;
use mirror_streams::{AccountBalanceFile, RecordFile};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::DbError;

/// A stored `record_file` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFileRow {
    pub name: String,
    pub version: i32,
    pub consensus_start: i64,
    pub consensus_end: i64,
    pub count: i64,
    pub hash: Hash384,
    pub previous_hash: Hash384,
    pub file_hash: Hash384,
    pub metadata_hash: Option<Hash384>,
    pub index: i64,
    pub node_id: Option<i64>,
    pub size: i64,
}

/// A stored `account_balance_file` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceFileRow {
    pub name: String,
    pub consensus_timestamp: i64,
    pub count: i64,
    pub file_hash: Hash384,
    pub node_id: Option<i64>,
    pub size: i64,
}

/// Query trait for stream file summaries.
pub trait StreamFileQueries {
    /// Inserts the summary of a record file. The file must carry its block
    /// number. `load_start`/`load_end` are wall-clock nanoseconds.
    fn insert_record_file(
        &self,
        file: &RecordFile,
        load_start: i64,
        load_end: i64,
    ) -> Result<(), DbError>;

    fn record_file_exists(&self, consensus_end: i64) -> Result<bool, DbError>;

    fn load_record_file(&self, consensus_end: i64) -> Result<Option<RecordFileRow>, DbError>;

    /// The record file with the highest consensus end.
    fn last_record_file(&self) -> Result<Option<RecordFileRow>, DbError>;

    fn count_record_files(&self) -> Result<i64, DbError>;

    fn insert_account_balance_file(
        &self,
        file: &AccountBalanceFile,
        load_start: i64,
        load_end: i64,
    ) -> Result<(), DbError>;

    fn account_balance_file_exists(&self, consensus_timestamp: i64) -> Result<bool, DbError>;

    fn last_account_balance_file(&self) -> Result<Option<BalanceFileRow>, DbError>;

    /// Balance files strictly after `after`, oldest first.
    fn account_balance_files_after(
        &self,
        after: i64,
        limit: usize,
    ) -> Result<Vec<BalanceFileRow>, DbError>;
}

const RECORD_FILE_COLUMNS: &str = "name, version, consensus_start, consensus_end, count, hash, \
     previous_hash, file_hash, metadata_hash, block_number, node_id, size";

const BALANCE_FILE_COLUMNS: &str = "name, consensus_timestamp, count, file_hash, node_id, size";

fn hash_column(row: &Row<'_>, index: usize) -> rusqlite::Result<Hash384> {
    let text: String = row.get(index)?;
    Hash384::from_hex(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn record_file_row(row: &Row<'_>) -> rusqlite::Result<RecordFileRow> {
    let metadata_hash = match row.get::<_, Option<String>>(8)? {
        Some(_) => Some(hash_column(row, 8)?),
        None => None,
    };
    Ok(RecordFileRow {
        name: row.get(0)?,
        version: row.get(1)?,
        consensus_start: row.get(2)?,
        consensus_end: row.get(3)?,
        count: row.get(4)?,
        hash: hash_column(row, 5)?,
        previous_hash: hash_column(row, 6)?,
        file_hash: hash_column(row, 7)?,
        metadata_hash,
        index: row.get(9)?,
        node_id: row.get(10)?,
        size: row.get(11)?,
    })
}

fn balance_file_row(row: &Row<'_>) -> rusqlite::Result<BalanceFileRow> {
    Ok(BalanceFileRow {
        name: row.get(0)?,
        consensus_timestamp: row.get(1)?,
        count: row.get(2)?,
        file_hash: hash_column(row, 3)?,
        node_id: row.get(4)?,
        size: row.get(5)?,
    })
}

impl StreamFileQueries for Connection {
    fn insert_record_file(
        &self,
        file: &RecordFile,
        load_start: i64,
        load_end: i64,
    ) -> Result<(), DbError> {
        let index = file.index.ok_or_else(|| {
            DbError::Integrity(format!("record file {} has no block number", file.name))
        })?;
        self.execute(
            "INSERT INTO record_file (consensus_end, consensus_start, name, version, \
             hapi_major, hapi_minor, hapi_patch, count, hash, previous_hash, file_hash, \
             metadata_hash, block_number, node_id, size, bytes, load_start, load_end) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                file.consensus_end,
                file.consensus_start,
                file.name,
                file.version,
                file.hapi_version.major,
                file.hapi_version.minor,
                file.hapi_version.patch,
                file.count as i64,
                file.hash.to_hex(),
                file.previous_hash.to_hex(),
                file.file_hash.to_hex(),
                file.metadata_hash.map(|h| h.to_hex()),
                index,
                file.node_id,
                file.size as i64,
                file.bytes.as_deref(),
                load_start,
                load_end,
            ],
        )?;
        Ok(())
    }

    fn record_file_exists(&self, consensus_end: i64) -> Result<bool, DbError> {
        let exists = self.query_row(
            "SELECT EXISTS(SELECT 1 FROM record_file WHERE consensus_end = ?1)",
            params![consensus_end],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn load_record_file(&self, consensus_end: i64) -> Result<Option<RecordFileRow>, DbError> {
        let sql = format!(
            "SELECT {} FROM record_file WHERE consensus_end = ?1",
            RECORD_FILE_COLUMNS
        );
        Ok(self
            .query_row(&sql, params![consensus_end], record_file_row)
            .optional()?)
    }

    fn last_record_file(&self) -> Result<Option<RecordFileRow>, DbError> {
        let sql = format!(
            "SELECT {} FROM record_file ORDER BY consensus_end DESC LIMIT 1",
            RECORD_FILE_COLUMNS
        );
        Ok(self.query_row(&sql, [], record_file_row).optional()?)
    }

    fn count_record_files(&self) -> Result<i64, DbError> {
        Ok(self.query_row("SELECT COUNT(*) FROM record_file", [], |row| row.get(0))?)
    }

    fn insert_account_balance_file(
        &self,
        file: &AccountBalanceFile,
        load_start: i64,
        load_end: i64,
    ) -> Result<(), DbError> {
        self.execute(
            "INSERT INTO account_balance_file (consensus_timestamp, name, count, file_hash, \
             node_id, size, bytes, load_start, load_end) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                file.consensus_timestamp,
                file.name,
                file.count as i64,
                file.file_hash.to_hex(),
                file.node_id,
                file.size as i64,
                file.bytes.as_deref(),
                load_start,
                load_end,
            ],
        )?;
        Ok(())
    }

    fn account_balance_file_exists(&self, consensus_timestamp: i64) -> Result<bool, DbError> {
        let exists = self.query_row(
            "SELECT EXISTS(SELECT 1 FROM account_balance_file WHERE consensus_timestamp = ?1)",
            params![consensus_timestamp],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn last_account_balance_file(&self) -> Result<Option<BalanceFileRow>, DbError> {
        let sql = format!(
            "SELECT {} FROM account_balance_file ORDER BY consensus_timestamp DESC LIMIT 1",
            BALANCE_FILE_COLUMNS
        );
        Ok(self.query_row(&sql, [], balance_file_row).optional()?)
    }

    fn account_balance_files_after(
        &self,
        after: i64,
        limit: usize,
    ) -> Result<Vec<BalanceFileRow>, DbError> {
        let sql = format!(
            "SELECT {} FROM account_balance_file WHERE consensus_timestamp > ?1 \
             ORDER BY consensus_timestamp ASC LIMIT ?2",
            BALANCE_FILE_COLUMNS
        );
        let mut stmt = self.prepare(&sql)?;
        let rows = stmt
            .query_map(params![after, limit as i64], balance_file_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
