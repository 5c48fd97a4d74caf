//! Database error types.
//!
//! All errors of the persistence layer are consolidated into [`DbError`],
//! which converts automatically from the underlying SQLite, pool and
//! serialization errors.

use thiserror::Error;

/// Errors that can occur during database operations.
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLite error, including constraint violations.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A connection could not be obtained from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Creating the database file or its directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding a notification payload failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored identifier or timestamp is out of range.
    #[error("Invalid value: {0}")]
    Common(#[from] mirror_common::Error),

    /// Requested data was not found where it must exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Stored data is in an unexpected state, such as a malformed hash or
    /// an unknown enum value.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// The schema version is incompatible or a migration failed.
    #[error("Migration error: {0}")]
    Migration(String),
}
