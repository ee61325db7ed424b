use std::path::PathBuf;

use mp_toolkit_core::{ContainerKind, InjectError};

use crate::broker::SavePathTicket;
use crate::job::JobState;

/// Messages sent from the injection worker to the foreground thread.
///
/// Every submitted job produces exactly one `Finished`, always last.
#[derive(Debug)]
pub enum JobEvent {
    /// The worker picked the job up
    Started {
        job_id: u64,
        image: PathBuf,
        kind: ContainerKind,
    },

    /// The job moved to a new state
    StateChanged { job_id: u64, state: JobState },

    /// The worker is blocked until this ticket is answered
    SavePathRequested(SavePathTicket),

    /// Terminal report
    Finished(JobReport),
}

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    /// Patched artifact written to `path`
    Done { path: PathBuf },

    /// User dismissed the save dialog; nothing was written
    Cancelled,

    /// Any other failure
    Failed { error: InjectError },
}

impl JobOutcome {
    /// Build the outcome for a pipeline result, splitting out cancellation.
    pub fn from_result(result: Result<PathBuf, InjectError>) -> Self {
        match result {
            Ok(path) => Self::Done { path },
            Err(e) if e.is_cancellation() => Self::Cancelled,
            Err(error) => Self::Failed { error },
        }
    }
}

/// Terminal report for one job.
#[derive(Debug)]
pub struct JobReport {
    pub job_id: u64,
    pub outcome: JobOutcome,
    /// Set when the workspace could not be removed after the job ended
    pub teardown_error: Option<InjectError>,
}

impl JobReport {
    pub fn success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Done { .. })
    }

    pub fn result_path(&self) -> Option<&PathBuf> {
        match &self.outcome {
            JobOutcome::Done { path } => Some(path),
            _ => None,
        }
    }

    /// Single user-facing line for the completion dialog.
    pub fn message(&self) -> String {
        match &self.outcome {
            JobOutcome::Done { .. } => "Code injection completed successfully!".to_string(),
            JobOutcome::Cancelled => "Injection cancelled; nothing was saved.".to_string(),
            JobOutcome::Failed { error } => format!("Error during injection: {}", error),
        }
    }
}
