//! Balance reconciliation job history.

use std::fmt;
use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::DbError;

/// Outcome of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationStatus {
    Running,
    Success,
    /// A balance snapshot differs from the previous snapshot plus the
    /// transfers between them.
    FailureCryptoTransfers,
    /// The run aborted on an error.
    FailureUnknown,
}

impl ReconciliationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationStatus::Running => "RUNNING",
            ReconciliationStatus::Success => "SUCCESS",
            ReconciliationStatus::FailureCryptoTransfers => "FAILURE_CRYPTO_TRANSFERS",
            ReconciliationStatus::FailureUnknown => "FAILURE_UNKNOWN",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ReconciliationStatus::FailureCryptoTransfers | ReconciliationStatus::FailureUnknown
        )
    }
}

impl fmt::Display for ReconciliationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconciliationStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RUNNING" => Ok(ReconciliationStatus::Running),
            "SUCCESS" => Ok(ReconciliationStatus::Success),
            "FAILURE_CRYPTO_TRANSFERS" => Ok(ReconciliationStatus::FailureCryptoTransfers),
            "FAILURE_UNKNOWN" => Ok(ReconciliationStatus::FailureUnknown),
            other => Err(DbError::Integrity(format!(
                "unknown reconciliation status {:?}",
                other
            ))),
        }
    }
}

/// A `reconciliation_job` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationJob {
    pub id: i64,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub status: ReconciliationStatus,
    /// First balance snapshot checked.
    pub timestamp_start: Option<i64>,
    /// Last balance snapshot checked.
    pub timestamp_end: Option<i64>,
    /// Snapshot pairs checked.
    pub count: i64,
    pub error: Option<String>,
}

pub trait ReconciliationQueries {
    /// Creates a `RUNNING` job and returns it.
    fn start_reconciliation_job(&self, started_at: i64) -> Result<ReconciliationJob, DbError>;

    /// Stores the job's final state.
    fn finish_reconciliation_job(&self, job: &ReconciliationJob) -> Result<(), DbError>;

    fn latest_reconciliation_job(&self) -> Result<Option<ReconciliationJob>, DbError>;
}

fn job_row(row: &Row<'_>) -> rusqlite::Result<(ReconciliationJob, String)> {
    let status: String = row.get(3)?;
    Ok((
        ReconciliationJob {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            status: ReconciliationStatus::Running,
            timestamp_start: row.get(4)?,
            timestamp_end: row.get(5)?,
            count: row.get(6)?,
            error: row.get(7)?,
        },
        status,
    ))
}

impl ReconciliationQueries for Connection {
    fn start_reconciliation_job(&self, started_at: i64) -> Result<ReconciliationJob, DbError> {
        self.execute(
            "INSERT INTO reconciliation_job (started_at, status) VALUES (?1, ?2)",
            params![started_at, ReconciliationStatus::Running.as_str()],
        )?;
        Ok(ReconciliationJob {
            id: self.last_insert_rowid(),
            started_at,
            finished_at: None,
            status: ReconciliationStatus::Running,
            timestamp_start: None,
            timestamp_end: None,
            count: 0,
            error: None,
        })
    }

    fn finish_reconciliation_job(&self, job: &ReconciliationJob) -> Result<(), DbError> {
        let updated = self.execute(
            "UPDATE reconciliation_job SET finished_at = ?2, status = ?3, timestamp_start = ?4, \
             timestamp_end = ?5, count = ?6, error = ?7 WHERE id = ?1",
            params![
                job.id,
                job.finished_at,
                job.status.as_str(),
                job.timestamp_start,
                job.timestamp_end,
                job.count,
                job.error,
            ],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound(format!("reconciliation job {}", job.id)));
        }
        Ok(())
    }

    fn latest_reconciliation_job(&self) -> Result<Option<ReconciliationJob>, DbError> {
        let row = self
            .query_row(
                "SELECT id, started_at, finished_at, status, timestamp_start, timestamp_end, \
                 count, error FROM reconciliation_job ORDER BY id DESC LIMIT 1",
                [],
                job_row,
            )
            .optional()?;
        match row {
            Some((mut job, status)) => {
                job.status = status.parse()?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CREATE_SCHEMA;

    #[test]
    fn test_job_lifecycle() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();
        assert!(conn.latest_reconciliation_job().unwrap().is_none());

        let mut job = conn.start_reconciliation_job(100).unwrap();
        assert_eq!(
            conn.latest_reconciliation_job().unwrap().unwrap().status,
            ReconciliationStatus::Running
        );

        job.finished_at = Some(200);
        job.status = ReconciliationStatus::FailureCryptoTransfers;
        job.timestamp_start = Some(1);
        job.timestamp_end = Some(2);
        job.count = 1;
        job.error = Some("0.0.2 off by 5".into());
        conn.finish_reconciliation_job(&job).unwrap();

        let stored = conn.latest_reconciliation_job().unwrap().unwrap();
        assert_eq!(stored, job);
        assert!(stored.status.is_failure());
    }

    #[test]
    fn test_finish_unknown_job() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(CREATE_SCHEMA).unwrap();
        let mut job = conn.start_reconciliation_job(1).unwrap();
        job.id += 10;
        assert!(matches!(
            conn.finish_reconciliation_job(&job),
            Err(DbError::NotFound(_))
        ));
    }
}
