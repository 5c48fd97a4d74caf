//! SQLite persistence for the mirror node ingestion core.
//!
//! # Architecture
//!
//! - [`pool`]: r2d2 connection pool, transactions
//! - [`schema`] / [`migrations`]: table layout and schema versioning
//! - [`queries`]: typed query traits implemented on [`rusqlite::Connection`]
//! - [`persister`]: one transaction per stream file, idempotent by file
//!   identity, with post-commit hooks
//! - [`notifier`]: broadcast of committed files
//! - [`partition`]: time partitions of the large item tables
//!
//! # Usage
//!
//! ```no_run
//! use mirror_db::{queries::StreamFileQueries, Database};
//!
//! let db = Database::open("data/mirror.db")?;
//! let last = db.with_connection(|conn| conn.last_record_file())?;
//! if let Some(file) = last {
//!     println!("last record file: {} (block {})", file.name, file.index);
//! }
//! # Ok::<(), mirror_db::DbError>(())
//! ```

pub mod error;
pub mod migrations;
pub mod notifier;
pub mod partition;
pub mod persister;
pub mod pool;
pub mod queries;
pub mod schema;

pub use error::DbError;
pub use migrations::{needs_migration, run_migrations, verify_schema, CURRENT_VERSION};
pub use notifier::{FileNotification, Notifier, NotifierConfig, TopicMessageNotification};
pub use partition::{PartitionConfig, TimePartitionService, PARTITIONED_TABLES};
pub use persister::{BatchPersister, CommittedFile, PersistOutcome, PersistStats, PostCommitHook};
pub use pool::{Database, PooledConnection};
pub use queries::*;

use std::path::Path;

use mirror_common::NetworkKind;
use tracing::info;

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DbError>;

/// Connections in a file-backed pool unless configured otherwise.
pub const DEFAULT_POOL_SIZE: u32 = 10;

impl Database {
    /// Opens or creates the database at `path`, creating its directory and
    /// bringing the schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_pool_size(path, DEFAULT_POOL_SIZE)
    }

    pub fn open_with_pool_size(path: impl AsRef<Path>, pool_size: u32) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = r2d2_sqlite::SqliteConnectionManager::file(path)
            .with_init(|conn| conn.execute_batch("PRAGMA busy_timeout = 5000;"));
        let pool = r2d2::Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    /// Opens a private in-memory database with a single connection.
    pub fn open_in_memory() -> Result<Self> {
        let manager = r2d2_sqlite::SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        let initialized: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'storestate'",
            [],
            |row| row.get(0),
        )?;
        if initialized {
            if migrations::needs_migration(&conn)? {
                info!("Database requires migration");
                migrations::run_migrations(&conn)?;
            }
            migrations::verify_schema(&conn)?;
        } else {
            migrations::initialize_schema(&conn)?;
        }
        Ok(())
    }

    /// Runs pending migrations. Opening already does this; `upgrade-db`
    /// calls it explicitly.
    pub fn upgrade(&self) -> Result<()> {
        let conn = self.connection()?;
        migrations::run_migrations(&conn)
    }

    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.connection()?;
        migrations::get_schema_version(&conn)
    }

    /// Records `network` on first use and refuses a database created for
    /// another network afterwards.
    pub fn ensure_network(&self, network: NetworkKind) -> Result<()> {
        self.with_connection(|conn| match conn.get_network()? {
            Some(stored) if stored != network => Err(DbError::Integrity(format!(
                "database belongs to network {}, configured for {}",
                stored, network
            ))),
            Some(_) => Ok(()),
            None => conn.set_network(network),
        })
    }

    pub fn last_record_file(&self) -> Result<Option<RecordFileRow>> {
        self.with_connection(|conn| conn.last_record_file())
    }

    pub fn last_account_balance_file(&self) -> Result<Option<BalanceFileRow>> {
        self.with_connection(|conn| conn.last_account_balance_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_at_current_version() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), CURRENT_VERSION);
        assert!(db.last_record_file().unwrap().is_none());
        db.upgrade().unwrap();
    }

    #[test]
    fn test_open_file_creates_directory_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mirror.db");
        {
            let db = Database::open(&path).unwrap();
            db.with_connection(|conn| conn.set_state("marker", "1")).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(
            db.with_connection(|conn| conn.get_state("marker")).unwrap().as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_ensure_network() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_network(NetworkKind::Testnet).unwrap();
        db.ensure_network(NetworkKind::Testnet).unwrap();
        assert!(matches!(
            db.ensure_network(NetworkKind::Mainnet),
            Err(DbError::Integrity(_))
        ));
    }
}
