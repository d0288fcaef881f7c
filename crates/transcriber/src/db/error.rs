//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// Update targeted a job that does not exist.
    #[error("Job {0} does not exist")]
    MissingJob(String),

    /// Update targeted a job that already reached a terminal state.
    #[error("Job {0} is terminal and can no longer be modified")]
    TerminalJob(String),

    /// A stored row could not be mapped back to a job.
    #[error("Corrupt job row {id}: {reason}")]
    Corrupt { id: String, reason: String },
}
