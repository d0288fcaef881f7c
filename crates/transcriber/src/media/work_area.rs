//! Job-scoped temporary storage.

use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::job::JobId;

/// Directory name prefix for per-job work areas under `<root>/jobs`.
pub const WORK_AREA_PREFIX: &str = "job_";

/// Temporary directory owned by exactly one job run, plus any extra files
/// (such as the staged upload) handed over to it.
///
/// [`WorkArea::cleanup`] may be called any number of times. If it never
/// ran, dropping the area removes everything it owns.
#[derive(Debug)]
pub struct WorkArea {
    dir: PathBuf,
    adopted: Vec<PathBuf>,
    cleaned: bool,
}

impl WorkArea {
    /// Creates `<root>/jobs/job_<id>`.
    pub fn create(root: &Path, job_id: &JobId) -> io::Result<Self> {
        let dir = root
            .join("jobs")
            .join(format!("{}{}", WORK_AREA_PREFIX, job_id));
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            adopted: Vec::new(),
            cleaned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Takes ownership of a file outside the area so cleanup removes it too.
    pub fn adopt(&mut self, path: impl Into<PathBuf>) {
        self.adopted.push(path.into());
    }

    pub fn is_cleaned(&self) -> bool {
        self.cleaned
    }

    /// Removes the directory and all adopted files. Missing entries are not
    /// an error, so repeated calls succeed.
    pub fn cleanup(&mut self) -> io::Result<()> {
        let mut first_error = None;

        for path in &self.adopted {
            if let Err(e) = remove_file(path) {
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = remove_dir(&self.dir) {
            first_error.get_or_insert(e);
        }

        self.cleaned = true;
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for WorkArea {
    fn drop(&mut self) {
        if !self.cleaned {
            if let Err(e) = self.cleanup() {
                warn!(dir = %self.dir.display(), error = %e, "Work area cleanup on drop failed");
            }
        }
    }
}

fn remove_file(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn remove_dir(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
