//! Contract sidecar records.

use mirror_parser::SidecarRow;
use mirror_streams::model::SidecarKind;
use rusqlite::{params, Connection};

use crate::error::DbError;

pub trait SidecarQueries {
    fn insert_sidecar_records(&self, rows: &[SidecarRow]) -> Result<usize, DbError>;

    /// Sidecar records of one transaction, in file order.
    fn load_sidecar_records(&self, consensus_timestamp: i64) -> Result<Vec<SidecarRow>, DbError>;
}

impl SidecarQueries for Connection {
    fn insert_sidecar_records(&self, rows: &[SidecarRow]) -> Result<usize, DbError> {
        let mut stmt = self.prepare_cached(
            "INSERT INTO sidecar_record (consensus_timestamp, sidecar_id, position, kind, \
             migration, data) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for row in rows {
            stmt.execute(params![
                row.consensus_timestamp,
                row.sidecar_id,
                row.index,
                row.kind.as_str(),
                row.migration,
                row.data,
            ])?;
        }
        Ok(rows.len())
    }

    fn load_sidecar_records(&self, consensus_timestamp: i64) -> Result<Vec<SidecarRow>, DbError> {
        let mut stmt = self.prepare(
            "SELECT sidecar_id, position, kind, migration, data FROM sidecar_record \
             WHERE consensus_timestamp = ?1 ORDER BY sidecar_id, position",
        )?;
        let mut rows = stmt.query(params![consensus_timestamp])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let kind: String = row.get(2)?;
            records.push(SidecarRow {
                consensus_timestamp,
                sidecar_id: row.get(0)?,
                index: row.get(1)?,
                kind: SidecarKind::parse(&kind)
                    .ok_or_else(|| DbError::Integrity(format!("unknown sidecar kind {:?}", kind)))?,
                migration: row.get(3)?,
                data: row.get(4)?,
            });
        }
        Ok(records)
    }
}
