use thiserror::Error;

use mp_toolkit_core::InjectError;
use mp_toolkit_lib::SettingsError;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Engine rejected the request or the job failed
    #[error("{0}")]
    Inject(#[from] InjectError),

    /// Settings file could not be read or written
    #[error("Config error: {0}")]
    Settings(#[from] SettingsError),

    /// Bad or conflicting command-line input
    #[error("{0}")]
    Usage(String),

    /// The save prompt could not be shown
    #[error("Prompt error: {0}")]
    Prompt(String),
}

impl CliError {
    pub(crate) fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub(crate) fn prompt(msg: impl Into<String>) -> Self {
        Self::Prompt(msg.into())
    }
}
