//! Foreground-facing entry point: validates a submission, starts one
//! background worker, and hands back the event channel.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;

use mp_toolkit_core::{CodeList, InjectError, classify};

use crate::job::{InjectionJob, JobResources};
use crate::progress::{JobEvent, JobOutcome, JobReport};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique job id.
pub fn next_job_id() -> u64 {
    NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed)
}

/// Accepts injection requests and runs each on a dedicated worker thread.
///
/// At most one job runs at a time. The foreground must keep draining the
/// receiver returned by [`new`](Self::new) and answer every
/// [`JobEvent::SavePathRequested`] ticket. Running jobs cannot be cancelled;
/// the only cancellation point is the save-path prompt.
pub struct InjectorController {
    resources: JobResources,
    events: mpsc::Sender<JobEvent>,
    busy: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl InjectorController {
    pub fn new(resources: JobResources) -> (Self, mpsc::Receiver<JobEvent>) {
        let (events, rx) = mpsc::channel();
        let controller = Self {
            resources,
            events,
            busy: Arc::new(AtomicBool::new(false)),
            worker: None,
        };
        (controller, rx)
    }

    pub fn resources(&self) -> &JobResources {
        &self.resources
    }

    /// Whether a job is currently between submission and its `Finished` event.
    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Validate, classify and start an injection job. Returns the job id.
    ///
    /// Input errors are returned directly and no job is started.
    pub fn submit(&mut self, image_path: &Path, codes_text: &str) -> Result<u64, InjectError> {
        if self.is_running() {
            return Err(InjectError::AlreadyRunning);
        }
        if image_path.as_os_str().is_empty() {
            return Err(InjectError::invalid_input("no game image selected"));
        }
        let codes = CodeList::new(codes_text)?;
        let image = classify(image_path)?;

        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(InjectError::AlreadyRunning);
        }
        // The previous worker has already sent Finished; reap it.
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        let job_id = next_job_id();
        let job = InjectionJob::new(
            job_id,
            image,
            codes,
            self.resources.clone(),
            self.events.clone(),
        );
        log::debug!(
            "job {}: submitting {} as {:?}",
            job_id,
            job.image().path().display(),
            job.pipeline()
        );

        let busy = Arc::clone(&self.busy);
        let events = self.events.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("injector-{}", job_id))
            .spawn(move || {
                let report = match std::panic::catch_unwind(AssertUnwindSafe(move || job.run())) {
                    Ok(report) => report,
                    Err(_) => {
                        log::error!("job {}: worker panicked", job_id);
                        JobReport {
                            job_id,
                            outcome: JobOutcome::Failed {
                                error: InjectError::Io(std::io::Error::other(
                                    "injection worker panicked",
                                )),
                            },
                            teardown_error: None,
                        }
                    }
                };
                // Clear first so a foreground reacting to Finished can resubmit.
                busy.store(false, Ordering::SeqCst);
                let _ = events.send(JobEvent::Finished(report));
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(job_id)
            }
            Err(e) => {
                self.busy.store(false, Ordering::SeqCst);
                Err(InjectError::Io(e))
            }
        }
    }

    /// Block until the current worker thread (if any) has exited.
    ///
    /// Only call this once the job's save-path ticket has been answered,
    /// otherwise the worker never finishes.
    pub fn wait(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}
