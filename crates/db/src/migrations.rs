//! Database schema migrations.
//!
//! Migrations upgrade the schema one version at a time, each inside its own
//! transaction. A fresh database is created directly at [`CURRENT_VERSION`]
//! from [`CREATE_SCHEMA`](crate::schema::CREATE_SCHEMA); older databases are
//! walked forward through the registered migrations. A database newer than this build
//! is refused.
//!
//! To add a migration, increment [`CURRENT_VERSION`], append an entry whose
//! `from_version` is the previous version, and keep its SQL idempotent
//! (`IF NOT EXISTS`).

use crate::schema::state_keys::DATABASE_SCHEMA;
use crate::{DbError, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

/// Current database schema version.
pub const CURRENT_VERSION: i32 = 3;

struct Migration {
    from_version: i32,
    to_version: i32,
    /// Idempotent upgrade SQL.
    upgrade_sql: &'static str,
    description: &'static str,
}

/// Ordered so that each entry starts where the previous one ends.
const MIGRATIONS: &[Migration] = &[
    Migration {
        from_version: 1,
        to_version: 2,
        upgrade_sql: r#"
            CREATE TABLE IF NOT EXISTS sidecar_record (
                consensus_timestamp INTEGER NOT NULL,
                sidecar_id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                kind TEXT NOT NULL,
                migration INTEGER NOT NULL,
                data BLOB NOT NULL,
                PRIMARY KEY (sidecar_id, consensus_timestamp, position)
            );
        "#,
        description: "Add sidecar_record table for contract sidecars",
    },
    Migration {
        from_version: 2,
        to_version: 3,
        upgrade_sql: r#"
            CREATE TABLE IF NOT EXISTS stream_gap (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stream_type TEXT NOT NULL,
                filename TEXT NOT NULL,
                consensus_timestamp INTEGER NOT NULL,
                reason TEXT NOT NULL,
                retries INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS reconciliation_job (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at INTEGER NOT NULL,
                finished_at INTEGER,
                status TEXT NOT NULL,
                timestamp_start INTEGER,
                timestamp_end INTEGER,
                count INTEGER NOT NULL DEFAULT 0,
                error TEXT
            );
        "#,
        description: "Add stream_gap and reconciliation_job tables",
    },
];

/// Reads the recorded schema version; a database without one is at
/// version 1.
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT state FROM storestate WHERE statename = ?1",
            [DATABASE_SCHEMA],
            |row| row.get(0),
        )
        .optional()?;
    match stored {
        Some(text) => text
            .parse()
            .map_err(|_| DbError::Migration(format!("invalid schema version {:?}", text))),
        None => Ok(1),
    }
}

pub fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO storestate (statename, state) VALUES (?1, ?2)",
        [DATABASE_SCHEMA, &version.to_string()],
    )?;
    Ok(())
}

pub fn needs_migration(conn: &Connection) -> Result<bool> {
    Ok(get_schema_version(conn)? < CURRENT_VERSION)
}

/// Walks the schema forward to [`CURRENT_VERSION`], one transaction per
/// step. A no-op on an up-to-date database.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let mut version = get_schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(DbError::Migration(format!(
            "database version {} is newer than supported version {}",
            version, CURRENT_VERSION
        )));
    }
    if version == CURRENT_VERSION {
        info!(version, "Database schema is up to date");
        return Ok(());
    }

    while version < CURRENT_VERSION {
        let migration = MIGRATIONS
            .iter()
            .find(|m| m.from_version == version)
            .ok_or_else(|| DbError::Migration(format!("no migration from version {}", version)))?;
        info!(
            from = migration.from_version,
            to = migration.to_version,
            description = migration.description,
            "Applying schema migration"
        );

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.upgrade_sql)?;
        set_schema_version(&tx, migration.to_version)?;
        tx.commit()?;
        version = migration.to_version;
    }
    info!(version, "Database schema migrated");
    Ok(())
}

/// Fails unless the database is exactly at [`CURRENT_VERSION`].
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;
    if version < CURRENT_VERSION {
        return Err(DbError::Migration(format!(
            "database schema version {} is too old, run upgrade-db first",
            version
        )));
    }
    if version > CURRENT_VERSION {
        return Err(DbError::Migration(format!(
            "database schema version {} is newer than this build supports ({})",
            version, CURRENT_VERSION
        )));
    }
    Ok(())
}

/// Creates every table of an empty database at [`CURRENT_VERSION`].
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(crate::schema::CREATE_SCHEMA)?;
    set_schema_version(conn, CURRENT_VERSION)?;
    info!(version = CURRENT_VERSION, "Initialized database schema");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(crate::schema::CREATE_SCHEMA).unwrap();
        conn
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_get_schema_version_default() {
        let conn = setup_test_db();
        assert_eq!(get_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn test_initialize_schema_sets_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
        assert!(!needs_migration(&conn).unwrap());
        assert!(verify_schema(&conn).is_ok());
    }

    #[test]
    fn test_migrations_are_contiguous() {
        let mut version = 1;
        for migration in MIGRATIONS {
            assert_eq!(migration.from_version, version);
            assert_eq!(migration.to_version, version + 1);
            version = migration.to_version;
        }
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_run_migrations_from_first_version() {
        let conn = setup_test_db();
        conn.execute_batch(
            "DROP TABLE sidecar_record; DROP TABLE stream_gap; DROP TABLE reconciliation_job;",
        )
        .unwrap();
        set_schema_version(&conn, 1).unwrap();
        assert!(needs_migration(&conn).unwrap());
        assert!(verify_schema(&conn).is_err());

        run_migrations(&conn).unwrap();

        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
        for table in ["sidecar_record", "stream_gap", "reconciliation_job"] {
            assert!(table_exists(&conn, table), "{} missing", table);
        }
        // A second run is a no-op.
        run_migrations(&conn).unwrap();
    }

    #[test]
    fn test_newer_database_is_refused() {
        let conn = setup_test_db();
        set_schema_version(&conn, CURRENT_VERSION + 1).unwrap();
        assert!(matches!(run_migrations(&conn), Err(DbError::Migration(_))));
        assert!(matches!(verify_schema(&conn), Err(DbError::Migration(_))));
    }
}
