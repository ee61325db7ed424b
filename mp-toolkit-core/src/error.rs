use std::path::PathBuf;

use thiserror::Error;

use crate::tool::Tool;

/// Errors that can end an injection job.
#[derive(Debug, Error)]
pub enum InjectError {
    /// Source image is missing or cannot be stat'ed
    #[error("Cannot read {}: {source}", .path.display())]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image does not look like any supported container
    #[error("Unrecognized game image: {0}")]
    ClassificationFailure(String),

    /// Bundled executable is missing for the running OS
    #[error("Tool {tool} not found at {}", .path.display())]
    ToolNotFound { tool: Tool, path: PathBuf },

    /// Extraction did not yield the expected layout
    #[error("Malformed image: {0}")]
    MalformedImage(String),

    /// Child process exited with a non-zero status (or was killed by a signal)
    #[error("{tool} failed with {}", describe_exit(.code))]
    ToolExecutionFailed { tool: Tool, code: Option<i32> },

    /// Tool exited cleanly but did not write its artifact
    #[error("{tool} did not produce {}", .path.display())]
    ToolOutputMissing { tool: Tool, path: PathBuf },

    /// Tool ran past the configured timeout and was killed
    #[error("{tool} timed out after {seconds}s")]
    ToolTimedOut { tool: Tool, seconds: u64 },

    /// Save dialog dismissed without a path
    #[error("Cancelled by user")]
    UserCancelled,

    /// Scratch directory could not be created or removed
    #[error("Workspace error: {0}")]
    WorkspaceError(String),

    /// Submission rejected because another job is in flight
    #[error("An injection is already running")]
    AlreadyRunning,

    /// Submission rejected before classification
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O error while swapping or writing artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl InjectError {
    pub fn file_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn classification(msg: impl Into<String>) -> Self {
        Self::ClassificationFailure(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedImage(msg.into())
    }

    pub fn workspace(msg: impl Into<String>) -> Self {
        Self::WorkspaceError(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// True when the job ended because the user declined to pick a path.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }
}
