//! Background code-injection engine.
//!
//! An [`InjectorController`] validates a submission and runs one
//! [`InjectionJob`] on a worker thread. The worker drives external tools
//! through a [`ToolRunner`], keeps its scratch files in a [`TempWorkspace`],
//! and reports back over a [`JobEvent`] channel, including the
//! [`SavePathTicket`] the foreground must answer before anything is written.

pub mod broker;
pub mod controller;
pub mod job;
pub mod pipeline;
pub mod progress;
pub mod settings;
pub mod tools;
pub mod workspace;

pub use broker::{SavePathBroker, SavePathRequest, SavePathResponse, SavePathTicket};
pub use controller::{InjectorController, next_job_id};
pub use job::{InjectionJob, JobResources, JobState, StageTracker};
pub use pipeline::ContainerPipeline;
pub use progress::{JobEvent, JobOutcome, JobReport};
pub use settings::{
    ResolvedSettings, SETTING_KEYS, Settings, SettingsError, SettingsOverrides, load_settings,
    load_settings_from, render_settings, save_settings_to, settings_path,
};
pub use tools::{
    OsFamily, ProcessRunner, ToolInvocation, ToolLocator, ToolRunner, default_tools_root,
};
pub use workspace::{TempWorkspace, default_scratch_root};
