//! Cross-thread save-path negotiation.
//!
//! The worker never touches UI objects. When it needs a destination it
//! publishes a [`SavePathTicket`] on the job's event channel and blocks on a
//! private reply channel until the foreground answers the ticket. A ticket
//! is consumed by answering it, so each request gets at most one response.

use std::path::PathBuf;
use std::sync::mpsc;

use mp_toolkit_core::{GameImage, InjectError};

use crate::progress::JobEvent;

/// What the worker asks the foreground for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePathRequest {
    /// Default file name for the dialog, e.g. `game (Modded).z64`
    pub suggested_name: String,
    /// Extension of the artifact without the dot
    pub extension: String,
    /// File-type filter, e.g. `Z64 Files (*.z64)`
    pub filter_description: String,
}

impl SavePathRequest {
    pub fn for_image(image: &GameImage) -> Self {
        let kind = image.kind();
        Self {
            suggested_name: image.suggested_output_name(),
            extension: kind.output_extension().to_string(),
            filter_description: kind.filter_description().to_string(),
        }
    }
}

/// The foreground's answer. `None` means the user dismissed the dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePathResponse {
    pub chosen_path: Option<PathBuf>,
}

/// A pending save-path request, handed to the foreground thread.
#[derive(Debug)]
pub struct SavePathTicket {
    job_id: u64,
    request: SavePathRequest,
    reply: mpsc::SyncSender<SavePathResponse>,
}

impl SavePathTicket {
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    pub fn request(&self) -> &SavePathRequest {
        &self.request
    }

    /// Send the answer back to the waiting worker.
    pub fn answer(self, chosen_path: Option<PathBuf>) {
        if self
            .reply
            .send(SavePathResponse { chosen_path })
            .is_err()
        {
            log::warn!("job {} is no longer waiting for a save path", self.job_id);
        }
    }

    pub fn choose(self, path: impl Into<PathBuf>) {
        self.answer(Some(path.into()));
    }

    pub fn cancel(self) {
        self.answer(None);
    }
}

/// Worker-side handle for asking the foreground where to save.
pub struct SavePathBroker {
    job_id: u64,
    events: mpsc::Sender<JobEvent>,
}

impl SavePathBroker {
    pub fn new(job_id: u64, events: mpsc::Sender<JobEvent>) -> Self {
        Self { job_id, events }
    }

    /// Publish `request` and block until the foreground answers.
    ///
    /// There is no timeout: an unanswered ticket keeps the worker waiting.
    /// A cancelled answer, an empty path, or a ticket dropped without an
    /// answer all yield [`InjectError::UserCancelled`].
    pub fn request(&mut self, request: SavePathRequest) -> Result<PathBuf, InjectError> {
        let (reply, response) = mpsc::sync_channel(1);
        let ticket = SavePathTicket {
            job_id: self.job_id,
            request,
            reply,
        };

        log::debug!(
            "job {} requesting save path (suggested {})",
            self.job_id,
            ticket.request.suggested_name
        );
        if self.events.send(JobEvent::SavePathRequested(ticket)).is_err() {
            log::warn!("no foreground listening for job {}", self.job_id);
            return Err(InjectError::UserCancelled);
        }

        match response.recv() {
            Ok(SavePathResponse {
                chosen_path: Some(path),
            }) if !path.as_os_str().is_empty() => Ok(path),
            Ok(_) => Err(InjectError::UserCancelled),
            Err(_) => {
                log::warn!("save-path ticket for job {} dropped unanswered", self.job_id);
                Err(InjectError::UserCancelled)
            }
        }
    }
}
