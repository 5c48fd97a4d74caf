//! Connection pool management.
//!
//! [`Database`] wraps an r2d2 pool of SQLite connections. It is cheap to
//! clone and can be moved into blocking tasks; every clone shares the pool.

use crate::error::DbError;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

/// A pooled SQLite connection, returned to the pool on drop.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Database handle with connection pooling.
///
/// # Example
///
/// ```no_run
/// use mirror_db::Database;
///
/// let db = Database::open("mirror.db")?;
///
/// db.transaction(|tx| {
///     tx.execute("DELETE FROM stream_gap", [])?;
///     Ok(())
/// })?;
/// # Ok::<(), mirror_db::DbError>(())
/// ```
pub struct Database {
    pub(crate) pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Obtains a connection from the pool.
    ///
    /// Blocks until a connection is free or the pool's timeout elapses. An
    /// in-memory database has a single connection, so callers must not ask
    /// for a second one while holding the first.
    pub fn connection(&self) -> Result<PooledConnection, DbError> {
        self.pool.get().map_err(DbError::from)
    }

    /// Runs `f` inside a transaction, committing if it returns `Ok`.
    ///
    /// An `Err` from `f` drops the transaction, which rolls it back.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T, DbError>,
    {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Runs `f` with a pooled connection outside of any explicit
    /// transaction.
    pub fn with_connection<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self.connection()?;
        f(&conn)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.pool.state();
        f.debug_struct("Database")
            .field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections)
            .finish()
    }
}
