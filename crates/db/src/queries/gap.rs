//! Intervals the downloader gave up on.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::DbError;

/// A stored `stream_gap` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamGapRow {
    pub id: i64,
    pub stream_type: String,
    pub filename: String,
    pub consensus_timestamp: i64,
    pub reason: String,
    pub retries: u32,
    pub created_at: i64,
}

pub trait StreamGapQueries {
    /// Records a skipped interval and returns its row id.
    fn insert_stream_gap(
        &self,
        stream_type: &str,
        filename: &str,
        consensus_timestamp: i64,
        reason: &str,
        retries: u32,
        created_at: i64,
    ) -> Result<i64, DbError>;

    /// Gaps of one stream type, oldest interval first.
    fn load_stream_gaps(&self, stream_type: &str) -> Result<Vec<StreamGapRow>, DbError>;

    /// The newest gap of one stream type.
    fn last_stream_gap(&self, stream_type: &str) -> Result<Option<StreamGapRow>, DbError>;
}

fn gap_row(row: &Row<'_>) -> rusqlite::Result<StreamGapRow> {
    Ok(StreamGapRow {
        id: row.get(0)?,
        stream_type: row.get(1)?,
        filename: row.get(2)?,
        consensus_timestamp: row.get(3)?,
        reason: row.get(4)?,
        retries: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl StreamGapQueries for Connection {
    fn insert_stream_gap(
        &self,
        stream_type: &str,
        filename: &str,
        consensus_timestamp: i64,
        reason: &str,
        retries: u32,
        created_at: i64,
    ) -> Result<i64, DbError> {
        self.execute(
            "INSERT INTO stream_gap (stream_type, filename, consensus_timestamp, reason, \
             retries, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![stream_type, filename, consensus_timestamp, reason, retries, created_at],
        )?;
        Ok(self.last_insert_rowid())
    }

    fn load_stream_gaps(&self, stream_type: &str) -> Result<Vec<StreamGapRow>, DbError> {
        let mut stmt = self.prepare(
            "SELECT id, stream_type, filename, consensus_timestamp, reason, retries, created_at \
             FROM stream_gap WHERE stream_type = ?1 ORDER BY consensus_timestamp, id",
        )?;
        let gaps = stmt
            .query_map(params![stream_type], gap_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(gaps)
    }

    fn last_stream_gap(&self, stream_type: &str) -> Result<Option<StreamGapRow>, DbError> {
        Ok(self
            .query_row(
                "SELECT id, stream_type, filename, consensus_timestamp, reason, retries, created_at \
                 FROM stream_gap WHERE stream_type = ?1 \
                 ORDER BY consensus_timestamp DESC, id DESC LIMIT 1",
                params![stream_type],
                gap_row,
            )
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CREATE_SCHEMA;

    #[test]
    fn test_insert_and_load_gaps() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();

        let second = conn
            .insert_stream_gap("RECORD", "b.rcd", 20, "no consensus", 3, 1)
            .unwrap();
        let first = conn
            .insert_stream_gap("RECORD", "a.rcd", 10, "no valid copy", 3, 2)
            .unwrap();
        conn.insert_stream_gap("BALANCE", "c.pb", 15, "no consensus", 1, 3)
            .unwrap();

        let gaps = conn.load_stream_gaps("RECORD").unwrap();
        assert_eq!(gaps.iter().map(|g| g.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(gaps[0].filename, "a.rcd");
        assert_eq!(gaps[0].retries, 3);
        assert!(conn.load_stream_gaps("OTHER").unwrap().is_empty());

        assert_eq!(conn.last_stream_gap("RECORD").unwrap().unwrap().filename, "b.rcd");
        assert!(conn.last_stream_gap("OTHER").unwrap().is_none());
    }
}
