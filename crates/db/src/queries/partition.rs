//! Time partition lookup rows.

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::DbError;

/// One time window of a partitioned table, `[from_timestamp, to_timestamp)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TimePartition {
    pub name: String,
    pub parent: String,
    pub from_timestamp: i64,
    pub to_timestamp: i64,
}

impl TimePartition {
    pub fn contains(&self, timestamp: i64) -> bool {
        self.from_timestamp <= timestamp && timestamp < self.to_timestamp
    }
}

pub trait TimePartitionQueries {
    /// Returns `false` if a partition of that name already exists.
    fn insert_time_partition(&self, partition: &TimePartition) -> Result<bool, DbError>;

    /// Partitions of `parent`, or of every table, ordered by start.
    fn load_time_partitions(&self, parent: Option<&str>) -> Result<Vec<TimePartition>, DbError>;
}

impl TimePartitionQueries for Connection {
    fn insert_time_partition(&self, partition: &TimePartition) -> Result<bool, DbError> {
        let inserted = self.execute(
            "INSERT OR IGNORE INTO time_partition (name, parent, from_timestamp, to_timestamp) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                partition.name,
                partition.parent,
                partition.from_timestamp,
                partition.to_timestamp
            ],
        )?;
        Ok(inserted > 0)
    }

    fn load_time_partitions(&self, parent: Option<&str>) -> Result<Vec<TimePartition>, DbError> {
        let mut stmt = self.prepare(
            "SELECT name, parent, from_timestamp, to_timestamp FROM time_partition \
             WHERE ?1 IS NULL OR parent = ?1 ORDER BY from_timestamp, parent",
        )?;
        let partitions = stmt
            .query_map(params![parent], |row| {
                Ok(TimePartition {
                    name: row.get(0)?,
                    parent: row.get(1)?,
                    from_timestamp: row.get(2)?,
                    to_timestamp: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(partitions)
    }
}
