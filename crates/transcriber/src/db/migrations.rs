//! Versioned schema upgrades for the job store.
//!
//! Applied versions are recorded in `_migrations`. Column additions check
//! `pragma_table_info` first so a database whose schema is ahead of its
//! bookkeeping can still be opened.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    kind: MigrationKind,
}

enum MigrationKind {
    /// Execute the SQL directly.
    Standard,
    /// ALTER TABLE ADD COLUMN, skipped if the column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// Ordered by version.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_jobs_table",
        sql: include_str!("sql/001_create_jobs.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "add_segment_count_to_jobs",
        sql: include_str!("sql/002_add_segment_count.sql"),
        kind: MigrationKind::AddColumn {
            table: "jobs",
            column: "segment_count",
        },
    },
];

const BOOKKEEPING: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

/// Highest applied migration version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    conn.execute_batch(BOOKKEEPING)?;
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}

/// Applies every migration newer than [`schema_version`]. Each migration and
/// its bookkeeping row commit together.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    let applied = schema_version(conn)?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(conn, migration).map_err(|e| match e {
            DatabaseError::Sqlite(source) => DatabaseError::Migration {
                version: migration.version,
                reason: source.to_string(),
            },
            other => other,
        })?;
    }

    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    let skip = match migration.kind {
        MigrationKind::Standard => false,
        MigrationKind::AddColumn { table, column } => column_exists(&tx, table, column)?,
    };
    if skip {
        log::info!(
            "Migration v{} ({}) already reflected in schema, recording only",
            migration.version,
            migration.description
        );
    } else {
        log::info!(
            "Applying migration v{}: {}",
            migration.version,
            migration.description
        );
        tx.execute_batch(migration.sql)?;
    }

    tx.execute(
        "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
        rusqlite::params![migration.version, migration.description],
    )?;
    tx.commit()?;
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let found: u32 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        rusqlite::params![table, column],
        |r| r.get(0),
    )?;
    Ok(found > 0)
}
