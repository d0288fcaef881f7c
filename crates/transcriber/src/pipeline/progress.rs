use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::job::Job;

/// Observer notified after every persisted change to a job.
pub trait ProgressListener: Send + Sync {
    fn job_changed(&self, job: &Job);
}

/// No-op listener for runs without subscribers.
pub struct NoopProgress;

impl ProgressListener for NoopProgress {
    fn job_changed(&self, _job: &Job) {}
}

impl ProgressListener for JobProgressBroadcaster {
    fn job_changed(&self, job: &Job) {
        self.send(JobProgressEvent::from_job(job));
    }
}
