//! Job repository: persistence operations for the `jobs` table.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::job::{FailureReason, Job, JobId, JobStatus};

/// Persistence collaborator for job records.
///
/// Every method is one atomic step: status and the fields that depend on it
/// are always written together.
pub trait JobRepository: Send + Sync {
    fn create(&self, job: &Job) -> Result<(), DatabaseError>;

    /// Overwrites the mutable fields of a non-terminal job.
    /// Fails with [`DatabaseError::TerminalJob`] once the stored row is terminal.
    fn update(&self, job: &Job) -> Result<(), DatabaseError>;

    fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, DatabaseError>;

    /// Most recent jobs first, any status.
    fn list_recent(&self, limit: usize) -> Result<Vec<Job>, DatabaseError>;

    /// Most recent completed or failed jobs first.
    fn list_finished(&self, limit: usize) -> Result<Vec<Job>, DatabaseError>;

    /// Replaces the display name in any status and returns the updated record.
    /// Fails with [`DatabaseError::MissingJob`] for an unknown id.
    fn rename(&self, id: &JobId, name: &str, now: DateTime<Utc>) -> Result<Job, DatabaseError>;

    /// Removes the record. Fails with [`DatabaseError::MissingJob`] for an unknown id.
    fn delete(&self, id: &JobId) -> Result<(), DatabaseError>;
}

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub original_name: String,
    pub byte_size: i64,
    pub mime_type: Option<String>,
    pub status: String,
    pub progress_percent: i64,
    pub progress_message: String,
    pub transcription_text: String,
    pub error_kind: Option<String>,
    pub error_reason: String,
    pub duration_seconds: Option<f64>,
    pub segment_count: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            original_name: row.get("original_name")?,
            byte_size: row.get("byte_size")?,
            mime_type: row.get("mime_type")?,
            status: row.get("status")?,
            progress_percent: row.get("progress_percent")?,
            progress_message: row.get("progress_message")?,
            transcription_text: row.get("transcription_text")?,
            error_kind: row.get("error_kind")?,
            error_reason: row.get("error_reason")?,
            duration_seconds: row.get("duration_seconds")?,
            segment_count: row.get("segment_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }

    pub fn from_job(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            original_name: job.original_name.clone(),
            byte_size: i64::try_from(job.byte_size).unwrap_or(i64::MAX),
            mime_type: job.mime_type.clone(),
            status: job.status.as_str().to_string(),
            progress_percent: i64::from(job.progress_percent),
            progress_message: job.progress_message.clone(),
            transcription_text: job.transcription_text.clone(),
            error_kind: job.failure.map(|f| f.code().to_string()),
            error_reason: job.error_reason().to_string(),
            duration_seconds: job.duration_seconds,
            segment_count: job.segment_count.map(i64::from),
            created_at: format_timestamp(&job.created_at),
            updated_at: format_timestamp(&job.updated_at),
            completed_at: job.completed_at.as_ref().map(format_timestamp),
        }
    }

    pub fn into_job(self) -> Result<Job, DatabaseError> {
        let id = self.id;
        let corrupt = |reason: String| DatabaseError::Corrupt {
            id: id.clone(),
            reason,
        };

        let status: JobStatus = self.status.parse().map_err(corrupt)?;
        let failure = self
            .error_kind
            .as_deref()
            .map(str::parse::<FailureReason>)
            .transpose()
            .map_err(corrupt)?;
        let created_at = parse_timestamp(&self.created_at).map_err(corrupt)?;
        let updated_at = parse_timestamp(&self.updated_at).map_err(corrupt)?;
        let completed_at = self
            .completed_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(corrupt)?;
        let job_id = id.parse::<JobId>().map_err(corrupt)?;

        Ok(Job {
            id: job_id,
            original_name: self.original_name,
            byte_size: u64::try_from(self.byte_size).unwrap_or(0),
            mime_type: self.mime_type,
            status,
            progress_percent: u8::try_from(self.progress_percent.clamp(0, 100)).unwrap_or(0),
            progress_message: self.progress_message,
            transcription_text: self.transcription_text,
            failure,
            duration_seconds: self.duration_seconds,
            segment_count: self.segment_count.and_then(|c| u32::try_from(c).ok()),
            created_at,
            updated_at,
            completed_at,
        })
    }
}

/// Fixed-width RFC 3339 so lexical ordering in SQL matches time ordering.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
}

fn insert(conn: &Connection, row: &JobRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (id, original_name, byte_size, mime_type, status, progress_percent,
         progress_message, transcription_text, error_kind, error_reason, duration_seconds,
         segment_count, created_at, updated_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            row.id,
            row.original_name,
            row.byte_size,
            row.mime_type,
            row.status,
            row.progress_percent,
            row.progress_message,
            row.transcription_text,
            row.error_kind,
            row.error_reason,
            row.duration_seconds,
            row.segment_count,
            row.created_at,
            row.updated_at,
            row.completed_at,
        ],
    )?;
    Ok(())
}

fn update_unless_terminal(conn: &Connection, row: &JobRow) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE jobs SET status=?2, progress_percent=?3, progress_message=?4,
         transcription_text=?5, error_kind=?6, error_reason=?7, duration_seconds=?8,
         segment_count=?9, updated_at=?10, completed_at=?11
         WHERE id=?1 AND status NOT IN ('completed', 'failed')",
        params![
            row.id,
            row.status,
            row.progress_percent,
            row.progress_message,
            row.transcription_text,
            row.error_kind,
            row.error_reason,
            row.duration_seconds,
            row.segment_count,
            row.updated_at,
            row.completed_at,
        ],
    )?;

    if changed == 0 {
        let exists: Option<String> = conn
            .query_row("SELECT status FROM jobs WHERE id = ?1", params![row.id], |r| {
                r.get(0)
            })
            .optional()?;
        return Err(match exists {
            Some(_) => DatabaseError::TerminalJob(row.id.clone()),
            None => DatabaseError::MissingJob(row.id.clone()),
        });
    }
    Ok(())
}

fn find(conn: &Connection, id: &JobId) -> Result<Option<Job>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
    let row = stmt
        .query_row(params![id.as_str()], JobRow::from_row)
        .optional()?;
    row.map(JobRow::into_job).transpose()
}

fn select(conn: &Connection, sql: &str, limit: usize) -> Result<Vec<Job>, DatabaseError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare(sql)?;
    let rows: Vec<JobRow> = stmt
        .query_map(params![limit], JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(JobRow::into_job).collect()
}

impl JobRepository for Database {
    fn create(&self, job: &Job) -> Result<(), DatabaseError> {
        let row = JobRow::from_job(job);
        self.with_conn(|conn| insert(conn, &row))
    }

    fn update(&self, job: &Job) -> Result<(), DatabaseError> {
        let row = JobRow::from_job(job);
        self.with_conn(|conn| update_unless_terminal(conn, &row))
    }

    fn find_by_id(&self, id: &JobId) -> Result<Option<Job>, DatabaseError> {
        self.with_conn(|conn| find(conn, id))
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<Job>, DatabaseError> {
        self.with_conn(|conn| {
            select(
                conn,
                "SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?1",
                limit,
            )
        })
    }

    fn list_finished(&self, limit: usize) -> Result<Vec<Job>, DatabaseError> {
        self.with_conn(|conn| {
            select(
                conn,
                "SELECT * FROM jobs WHERE status IN ('completed', 'failed')
                 ORDER BY created_at DESC LIMIT ?1",
                limit,
            )
        })
    }

    fn rename(&self, id: &JobId, name: &str, now: DateTime<Utc>) -> Result<Job, DatabaseError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE jobs SET original_name = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.as_str(), name, format_timestamp(&now)],
            )?;
            if changed == 0 {
                return Err(DatabaseError::MissingJob(id.to_string()));
            }
            find(conn, id)?.ok_or_else(|| DatabaseError::MissingJob(id.to_string()))
        })
    }

    fn delete(&self, id: &JobId) -> Result<(), DatabaseError> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id.as_str()])?;
            if changed == 0 {
                return Err(DatabaseError::MissingJob(id.to_string()));
            }
            Ok(())
        })
    }
}
