//! Job-scoped scratch directories.

use std::path::{Path, PathBuf};

use mp_toolkit_core::InjectError;

/// Default scratch root: `<system temp dir>/mp-toolkit`.
pub fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("mp-toolkit")
}

/// Directory name of job `job_id`'s workspace. The process id keeps two
/// toolkit instances sharing one scratch root from touching each other's jobs.
pub fn workspace_dir_name(job_id: u64) -> String {
    format!("job-{}-{}", std::process::id(), job_id)
}

/// Scratch directory owned by exactly one injection job.
///
/// The directory is removed by [`release`](Self::release) or, failing that,
/// when the workspace is dropped, so every exit path of a job tears it down.
#[derive(Debug)]
pub struct TempWorkspace {
    root: PathBuf,
    released: bool,
}

impl TempWorkspace {
    /// Create a fresh, empty scratch directory for job `job_id` under `scratch_root`.
    ///
    /// A leftover directory with the same name (from a run that crashed
    /// before teardown) is wiped first.
    pub fn acquire(scratch_root: &Path, job_id: u64) -> Result<Self, InjectError> {
        let root = scratch_root.join(workspace_dir_name(job_id));

        if root.exists() {
            log::warn!("removing stale workspace {}", root.display());
            std::fs::remove_dir_all(&root).map_err(|e| {
                InjectError::workspace(format!(
                    "cannot remove stale {}: {}",
                    root.display(),
                    e
                ))
            })?;
        }
        std::fs::create_dir_all(&root).map_err(|e| {
            InjectError::workspace(format!("cannot create {}: {}", root.display(), e))
        })?;

        log::debug!("acquired workspace {}", root.display());
        Ok(Self {
            root,
            released: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `name` inside the workspace.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Recursively delete the workspace. Idempotent: a directory that is
    /// already gone counts as released.
    pub fn release(&mut self) -> Result<(), InjectError> {
        if self.released {
            return Ok(());
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(InjectError::workspace(format!(
                    "cannot remove {}: {}",
                    self.root.display(),
                    e
                )));
            }
        }
        self.released = true;
        log::debug!("released workspace {}", self.root.display());
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for TempWorkspace {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("leaked workspace: {}", e);
        }
    }
}
