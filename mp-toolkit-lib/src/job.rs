//! The injection job state machine.
//!
//! ```text
//! Idle → Extracting → Patching → Repacking → AwaitingSavePath → Writing → Done
//!   └────────────┴──────────┴──────────┴────────────┴─────────────┴──→ Failed
//! ```
//!
//! N64 jobs skip `Extracting` and `Repacking`. States only move forward; the
//! workspace is released before the terminal state is entered.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;

use mp_toolkit_core::{CodeList, GameImage, InjectError};

use crate::broker::SavePathBroker;
use crate::pipeline::{ContainerPipeline, PipelineEnv};
use crate::progress::{JobEvent, JobOutcome, JobReport};
use crate::tools::{ToolLocator, ToolRunner};
use crate::workspace::TempWorkspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Idle,
    Extracting,
    Patching,
    Repacking,
    AwaitingSavePath,
    Writing,
    Done,
    Failed,
}

impl JobState {
    fn rank(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Extracting => 1,
            Self::Patching => 2,
            Self::Repacking => 3,
            Self::AwaitingSavePath => 4,
            Self::Writing => 5,
            Self::Done | Self::Failed => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal forward step.
    pub fn can_advance_to(&self, next: JobState) -> bool {
        !self.is_terminal() && (next == Self::Failed || next.rank() > self.rank())
    }

    /// Short status line for progress displays.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Waiting",
            Self::Extracting => "Extracting image",
            Self::Patching => "Patching executable",
            Self::Repacking => "Repacking image",
            Self::AwaitingSavePath => "Waiting for save location",
            Self::Writing => "Writing output",
            Self::Done => "Done",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Tracks a job's current state and announces every transition.
pub struct StageTracker {
    job_id: u64,
    state: JobState,
    history: Vec<JobState>,
    events: mpsc::Sender<JobEvent>,
}

impl StageTracker {
    pub fn new(job_id: u64, events: mpsc::Sender<JobEvent>) -> Self {
        Self {
            job_id,
            state: JobState::Idle,
            history: vec![JobState::Idle],
            events,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    /// Move to `next`. Backward or post-terminal transitions are ignored.
    pub fn enter(&mut self, next: JobState) {
        if !self.state.can_advance_to(next) {
            log::error!(
                "job {}: refusing transition {:?} -> {:?}",
                self.job_id,
                self.state,
                next
            );
            debug_assert!(false, "illegal job transition {:?} -> {:?}", self.state, next);
            return;
        }
        log::debug!("job {}: {:?} -> {:?}", self.job_id, self.state, next);
        self.state = next;
        self.history.push(next);
        let _ = self.events.send(JobEvent::StateChanged {
            job_id: self.job_id,
            state: next,
        });
    }
}

/// Shared, read-only collaborators every job needs.
#[derive(Clone)]
pub struct JobResources {
    pub tools: Arc<ToolLocator>,
    pub runner: Arc<dyn ToolRunner>,
    /// Directory under which per-job workspaces are created
    pub scratch_root: PathBuf,
}

/// One injection run: a classified image, its codes and the resources to patch it.
pub struct InjectionJob {
    id: u64,
    image: GameImage,
    codes: CodeList,
    pipeline: ContainerPipeline,
    resources: JobResources,
    events: mpsc::Sender<JobEvent>,
}

impl InjectionJob {
    pub fn new(
        id: u64,
        image: GameImage,
        codes: CodeList,
        resources: JobResources,
        events: mpsc::Sender<JobEvent>,
    ) -> Self {
        let pipeline = ContainerPipeline::for_kind(image.kind());
        Self {
            id,
            image,
            codes,
            pipeline,
            resources,
            events,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn image(&self) -> &GameImage {
        &self.image
    }

    pub fn pipeline(&self) -> ContainerPipeline {
        self.pipeline
    }

    /// Run the job to a terminal state on the calling thread.
    ///
    /// Blocks while waiting for the save-path answer. The workspace is
    /// released on every path before the terminal state is announced.
    pub fn run(self) -> JobReport {
        let mut stages = StageTracker::new(self.id, self.events.clone());
        let _ = self.events.send(JobEvent::Started {
            job_id: self.id,
            image: self.image.path().to_path_buf(),
            kind: self.image.kind(),
        });
        log::info!(
            "job {}: injecting {} code line(s) into {} ({})",
            self.id,
            self.codes.line_count(),
            self.image.path().display(),
            self.image.kind()
        );

        let mut workspace = None;
        let result = self.execute(&mut stages, &mut workspace);

        let teardown_error = workspace.as_mut().and_then(|ws| ws.release().err());
        if let Some(e) = &teardown_error {
            log::error!("job {}: {}", self.id, e);
        }

        match &result {
            Ok(path) => {
                log::info!("job {}: done, wrote {}", self.id, path.display());
                stages.enter(JobState::Done);
            }
            Err(e) if e.is_cancellation() => {
                log::info!("job {}: cancelled at save prompt", self.id);
                stages.enter(JobState::Failed);
            }
            Err(e) => {
                log::warn!("job {}: failed during {:?}: {}", self.id, stages.state(), e);
                stages.enter(JobState::Failed);
            }
        }

        JobReport {
            job_id: self.id,
            outcome: JobOutcome::from_result(result),
            teardown_error,
        }
    }

    fn execute(
        &self,
        stages: &mut StageTracker,
        workspace: &mut Option<TempWorkspace>,
    ) -> Result<PathBuf, InjectError> {
        // Fail before touching the disk if any tool for this format is missing.
        for &tool in self.pipeline.required_tools() {
            self.resources.tools.resolve(tool)?;
        }

        let workspace =
            workspace.insert(TempWorkspace::acquire(&self.resources.scratch_root, self.id)?);
        let mut broker = SavePathBroker::new(self.id, self.events.clone());
        let mut env = PipelineEnv {
            tools: &self.resources.tools,
            runner: self.resources.runner.as_ref(),
            workspace,
            broker: &mut broker,
            stages,
        };
        self.pipeline.run(&self.image, &self.codes, &mut env)
    }
}
