//! Edits to stored job records: rename and delete.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::db::{DatabaseError, JobRepository};
use crate::error::QueryError;
use crate::job::{JobId, JobStatus};
use crate::status::{Admission, InFlightRegistry, JobSummary};

#[derive(Clone)]
pub struct JobCatalog {
    repository: Arc<dyn JobRepository>,
    in_flight: InFlightRegistry,
}

impl JobCatalog {
    pub fn new(repository: Arc<dyn JobRepository>, in_flight: InFlightRegistry) -> Self {
        Self {
            repository,
            in_flight,
        }
    }

    /// Sets a new display name. Surrounding whitespace is dropped and the
    /// result must not be empty. Allowed in any status.
    pub fn rename(&self, id: &JobId, name: &str) -> Result<JobSummary, QueryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(QueryError::EmptyName);
        }

        let job = self
            .repository
            .rename(id, name, Utc::now())
            .map_err(|e| not_found(id, e))?;
        info!(job_id = %id, name, "Job renamed");
        Ok(JobSummary::from_job(&job))
    }

    /// Removes a record. A job still queued or running in this process is
    /// refused; its run would otherwise end without a record to write.
    pub fn delete(&self, id: &JobId) -> Result<(), QueryError> {
        let admission = self.in_flight.get(id);
        if admission == Some(Admission::Queued) {
            let status = self
                .repository
                .find_by_id(id)?
                .map(|job| job.status)
                .unwrap_or(JobStatus::Pending);
            return Err(QueryError::StillRunning {
                job_id: id.to_string(),
                status: status.to_string(),
            });
        }

        match self.repository.delete(id) {
            Ok(()) => {}
            // An abandoned submission may never have been recorded.
            Err(DatabaseError::MissingJob(_)) if admission.is_some() => {}
            Err(e) => return Err(not_found(id, e)),
        }
        self.in_flight.forget(id);
        info!(job_id = %id, "Job deleted");
        Ok(())
    }
}

fn not_found(id: &JobId, error: DatabaseError) -> QueryError {
    match error {
        DatabaseError::MissingJob(_) => QueryError::NotFound(id.to_string()),
        other => QueryError::Persistence(other),
    }
}
