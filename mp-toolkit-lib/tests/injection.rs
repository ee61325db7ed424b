//! End-to-end injection runs against a scripted tool runner.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use mp_toolkit_core::{InjectError, PATCH_MARKER, Tool};
use mp_toolkit_lib::{
    InjectorController, JobEvent, JobOutcome, JobReport, JobResources, JobState, OsFamily,
    SavePathRequest, SavePathTicket, ToolInvocation, ToolLocator, ToolRunner,
};
use tempfile::TempDir;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;
const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stands in for the real tools: records every call and fakes their output.
#[derive(Default)]
struct ScriptedRunner {
    calls: Mutex<Vec<ToolInvocation>>,
    /// Tool that exits with code 1
    fail: Option<Tool>,
    /// Tool that exits 0 without writing anything
    silent: Option<Tool>,
    /// Top-level folders an extractor produces
    extracted_folders: usize,
    /// Whether the extracted tree contains sys/main.dol
    with_main_dol: bool,
}

impl ScriptedRunner {
    fn healthy() -> Self {
        Self {
            extracted_folders: 1,
            with_main_dol: true,
            ..Default::default()
        }
    }

    fn tools_called(&self) -> Vec<Tool> {
        self.calls.lock().unwrap().iter().map(|c| c.tool).collect()
    }

    fn args_of(&self, tool: Tool) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.tool == tool)
            .map(|c| c.args_lossy())
            .unwrap_or_default()
    }
}

fn dest_of(args: &[String]) -> PathBuf {
    args.iter()
        .find_map(|a| a.strip_prefix("--dest="))
        .map(PathBuf::from)
        .expect("no --dest argument")
}

fn fake_extract(into: &Path, folders: usize, with_main_dol: bool) {
    for i in 0..folders {
        let sys = into.join(format!("GAME{}", i)).join("sys");
        std::fs::create_dir_all(&sys).unwrap();
        if with_main_dol {
            std::fs::write(sys.join("main.dol"), b"original dol").unwrap();
        }
    }
    std::fs::create_dir_all(into).unwrap();
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), InjectError> {
        self.calls.lock().unwrap().push(invocation.clone());
        if self.fail == Some(invocation.tool) {
            return Err(InjectError::ToolExecutionFailed {
                tool: invocation.tool,
                code: Some(1),
            });
        }
        if self.silent == Some(invocation.tool) {
            return Ok(());
        }

        let args = invocation.args_lossy();
        match invocation.tool {
            Tool::GsPatcher => std::fs::write(&args[2], b"patched rom").unwrap(),
            Tool::DiscExtractor => {
                fake_extract(Path::new(&args[2]), self.extracted_folders, self.with_main_dol)
            }
            Tool::IsoExtractor => {
                fake_extract(&dest_of(&args), self.extracted_folders, self.with_main_dol)
            }
            Tool::GeckoPatcher => {
                let dest = dest_of(&args);
                std::fs::create_dir_all(&dest).unwrap();
                std::fs::write(dest.join("main.dol"), b"patched dol").unwrap();
            }
            Tool::DiscRepacker | Tool::IsoRepacker => {
                std::fs::write(dest_of(&args), b"patched disc").unwrap()
            }
        }
        Ok(())
    }
}

struct Harness {
    _tools: TempDir,
    scratch: TempDir,
    input: TempDir,
    output: TempDir,
    runner: Arc<ScriptedRunner>,
    controller: InjectorController,
    events: mpsc::Receiver<JobEvent>,
}

impl Harness {
    fn new(runner: ScriptedRunner) -> Self {
        Self::with_missing_tool(runner, None)
    }

    fn with_missing_tool(runner: ScriptedRunner, missing: Option<Tool>) -> Self {
        let tools = tempfile::tempdir().unwrap();
        let locator = ToolLocator::for_os(tools.path(), OsFamily::Linux);
        for &tool in Tool::all() {
            if Some(tool) == missing {
                continue;
            }
            let path = locator.expected_path(tool);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"").unwrap();
        }

        let runner = Arc::new(runner);
        let scratch = tempfile::tempdir().unwrap();
        let (controller, events) = InjectorController::new(JobResources {
            tools: Arc::new(locator),
            runner: runner.clone(),
            scratch_root: scratch.path().to_path_buf(),
        });

        Self {
            _tools: tools,
            scratch,
            input: tempfile::tempdir().unwrap(),
            output: tempfile::tempdir().unwrap(),
            runner,
            controller,
            events,
        }
    }

    /// Sparse input image of the given size.
    fn image(&self, name: &str, size: u64) -> PathBuf {
        let path = self.input.path().join(name);
        File::create(&path).unwrap().set_len(size).unwrap();
        path
    }

    fn next_event(&self) -> JobEvent {
        self.events
            .recv_timeout(EVENT_TIMEOUT)
            .expect("worker went silent")
    }

    fn next_ticket(&self, states: &mut Vec<JobState>) -> SavePathTicket {
        loop {
            match self.next_event() {
                JobEvent::SavePathRequested(ticket) => return ticket,
                JobEvent::StateChanged { state, .. } => states.push(state),
                JobEvent::Started { .. } => {}
                JobEvent::Finished(report) => panic!("finished before asking: {:?}", report),
            }
        }
    }

    fn finish(&mut self, states: &mut Vec<JobState>) -> JobReport {
        loop {
            match self.next_event() {
                JobEvent::Finished(report) => {
                    self.controller.wait();
                    return report;
                }
                JobEvent::StateChanged { state, .. } => states.push(state),
                JobEvent::SavePathRequested(ticket) => panic!("unexpected ticket {:?}", ticket),
                JobEvent::Started { .. } => {}
            }
        }
    }

    /// Run a job, answering the save prompt with `answer(request)`.
    fn run(
        &mut self,
        image: &Path,
        answer: impl FnOnce(&SavePathRequest) -> Option<PathBuf>,
    ) -> (Vec<JobState>, Option<SavePathRequest>, JobReport) {
        self.controller.submit(image, "04001234 00000001").unwrap();
        let mut states = Vec::new();

        // A failing job reports Finished without ever asking for a path.
        let mut request = None;
        loop {
            match self.next_event() {
                JobEvent::SavePathRequested(ticket) => {
                    request = Some(ticket.request().clone());
                    let choice = answer(ticket.request());
                    ticket.answer(choice);
                    break;
                }
                JobEvent::StateChanged { state, .. } => states.push(state),
                JobEvent::Started { .. } => {}
                JobEvent::Finished(report) => {
                    self.controller.wait();
                    return (states, request, report);
                }
            }
        }
        let report = self.finish(&mut states);
        (states, request, report)
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path()).unwrap().count() == 0
    }
}

#[test]
fn n64_rom_is_patched_directly() {
    let mut h = Harness::new(ScriptedRunner::healthy());
    let rom = h.image("game.z64", 80 * MIB);
    let out = h.output.path().join("party.z64");

    let (states, request, report) = h.run(&rom, |_| Some(out.clone()));

    assert_eq!(h.runner.tools_called(), vec![Tool::GsPatcher]);
    let args = h.runner.args_of(Tool::GsPatcher);
    assert!(args[0].ends_with("codes.txt"));
    assert_eq!(args[1], rom.to_string_lossy());
    assert!(args[2].ends_with("game.z64"));

    let request = request.unwrap();
    assert_eq!(request.suggested_name, "game (Modded).z64");
    assert_eq!(request.filter_description, "Z64 Files (*.z64)");

    assert_eq!(
        states,
        vec![
            JobState::Patching,
            JobState::AwaitingSavePath,
            JobState::Writing,
            JobState::Done
        ]
    );
    assert!(report.success(), "{}", report.message());
    assert_eq!(report.result_path(), Some(&out));
    assert_eq!(std::fs::read(&out).unwrap(), b"patched rom");
    assert!(h.scratch_is_empty());
    assert!(!h.controller.is_running());
}

#[test]
fn codes_file_carries_marker_line() {
    struct Capture(Mutex<Option<String>>);
    impl ToolRunner for Capture {
        fn run(&self, invocation: &ToolInvocation) -> Result<(), InjectError> {
            let args = invocation.args_lossy();
            *self.0.lock().unwrap() = Some(std::fs::read_to_string(&args[0]).unwrap());
            std::fs::write(&args[2], b"rom").unwrap();
            Ok(())
        }
    }

    let tools = tempfile::tempdir().unwrap();
    let locator = ToolLocator::for_os(tools.path(), OsFamily::Linux);
    let gs = locator.expected_path(Tool::GsPatcher);
    std::fs::create_dir_all(gs.parent().unwrap()).unwrap();
    std::fs::write(&gs, b"").unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let capture = Arc::new(Capture(Mutex::new(None)));
    let (mut controller, events) = InjectorController::new(JobResources {
        tools: Arc::new(locator),
        runner: capture.clone(),
        scratch_root: scratch.path().to_path_buf(),
    });

    let input = tempfile::tempdir().unwrap();
    let rom = input.path().join("mp3.n64");
    File::create(&rom).unwrap().set_len(32 * MIB).unwrap();
    controller.submit(&rom, "\n  C2000000 00000002\n").unwrap();

    loop {
        match events.recv_timeout(EVENT_TIMEOUT).unwrap() {
            JobEvent::SavePathRequested(ticket) => ticket.cancel(),
            JobEvent::Finished(_) => break,
            _ => {}
        }
    }
    controller.wait();
    let written = capture.0.lock().unwrap().clone().unwrap();
    assert_eq!(written, format!("{}\nC2000000 00000002", PATCH_MARKER));
}

#[test]
fn wbfs_runs_full_wii_pipeline() {
    let mut h = Harness::new(ScriptedRunner::healthy());
    let image = h.image("Mario Party 8.wbfs", 4 * GIB + 300 * MIB);
    let out = h.output.path().join("mp8.wbfs");

    let (states, request, report) = h.run(&image, |_| Some(out.clone()));

    assert_eq!(
        h.runner.tools_called(),
        vec![Tool::DiscExtractor, Tool::GeckoPatcher, Tool::DiscRepacker]
    );
    let extract = h.runner.args_of(Tool::DiscExtractor);
    assert_eq!(extract[0], "extract");
    assert!(extract[2].ends_with("tmpROM"));

    let gecko = h.runner.args_of(Tool::GeckoPatcher);
    assert_eq!(gecko[0], "--hooktype=GX");
    assert_eq!(gecko[1], "--optimize");
    assert!(gecko[2].ends_with("sys/main.dol"));
    assert!(gecko[3].ends_with("codes.txt"));
    assert!(gecko[4].starts_with("--dest=") && gecko[4].ends_with("tmpDOL"));

    let repack = h.runner.args_of(Tool::DiscRepacker);
    assert_eq!(repack[0], "copy");
    assert!(repack[2].ends_with("game.wbfs"));

    assert_eq!(
        request.unwrap().suggested_name,
        "Mario Party 8 (Modded).wbfs"
    );
    assert_eq!(
        states,
        vec![
            JobState::Extracting,
            JobState::Patching,
            JobState::Repacking,
            JobState::AwaitingSavePath,
            JobState::Writing,
            JobState::Done
        ]
    );
    assert!(report.success());
    assert_eq!(std::fs::read(&out).unwrap(), b"patched disc");
    assert!(h.scratch_is_empty());
}

#[test]
fn large_iso_is_treated_as_wii_disc() {
    let mut h = Harness::new(ScriptedRunner::healthy());
    let image = h.image("mp9.iso", 4 * GIB + 1);
    let out = h.output.path().join("mp9.wbfs");

    let (_, request, report) = h.run(&image, |_| Some(out.clone()));

    assert_eq!(request.unwrap().extension, "wbfs");
    assert_eq!(h.runner.tools_called()[0], Tool::DiscExtractor);
    assert!(report.success());
}

#[test]
fn gamecube_iso_uses_iso_tools_without_optimize() {
    let mut h = Harness::new(ScriptedRunner::healthy());
    let image = h.image("mp4.iso", 1400 * MIB);
    let out = h.output.path().join("mp4.iso");

    let (_, request, report) = h.run(&image, |_| Some(out.clone()));

    assert_eq!(
        h.runner.tools_called(),
        vec![Tool::IsoExtractor, Tool::GeckoPatcher, Tool::IsoRepacker]
    );
    let extract = h.runner.args_of(Tool::IsoExtractor);
    assert_eq!(extract[0], image.to_string_lossy());
    assert_eq!(extract[1], "E");
    assert!(extract[2].starts_with("--dest="));

    let gecko = h.runner.args_of(Tool::GeckoPatcher);
    assert!(!gecko.iter().any(|a| a == "--optimize"));

    let repack = h.runner.args_of(Tool::IsoRepacker);
    assert_eq!(repack[1], "B");
    assert!(repack[2].ends_with("game.iso"));

    assert_eq!(request.unwrap().filter_description, "ISO Files (*.iso)");
    assert!(report.success());
    assert_eq!(std::fs::read(&out).unwrap(), b"patched disc");
}

#[test]
fn extraction_without_single_folder_is_malformed() {
    for folders in [0, 2] {
        let mut h = Harness::new(ScriptedRunner {
            extracted_folders: folders,
            with_main_dol: true,
            ..Default::default()
        });
        let image = h.image("mp8.wbfs", 2 * GIB);

        let (states, request, report) = h.run(&image, |_| unreachable!());

        assert!(request.is_none());
        assert_eq!(h.runner.tools_called(), vec![Tool::DiscExtractor]);
        assert!(matches!(
            report.outcome,
            JobOutcome::Failed {
                error: InjectError::MalformedImage(_)
            }
        ));
        assert_eq!(states.last(), Some(&JobState::Failed));
        assert!(h.scratch_is_empty());
    }
}

#[test]
fn missing_main_dol_is_malformed() {
    let mut h = Harness::new(ScriptedRunner {
        extracted_folders: 1,
        with_main_dol: false,
        ..Default::default()
    });
    let image = h.image("mp6.iso", GIB);

    let (_, _, report) = h.run(&image, |_| unreachable!());

    assert_eq!(h.runner.tools_called(), vec![Tool::IsoExtractor]);
    assert!(matches!(
        report.outcome,
        JobOutcome::Failed {
            error: InjectError::MalformedImage(_)
        }
    ));
}

/// Image name, size and the states a job passes through before each tool runs.
struct StepCase {
    image: &'static str,
    size: u64,
    tool: Tool,
    called: &'static [Tool],
    states: &'static [JobState],
}

const STEP_CASES: &[StepCase] = &[
    StepCase {
        image: "mp2.z64",
        size: 64 * MIB,
        tool: Tool::GsPatcher,
        called: &[Tool::GsPatcher],
        states: &[JobState::Patching],
    },
    StepCase {
        image: "mp8.wbfs",
        size: 2 * GIB,
        tool: Tool::DiscExtractor,
        called: &[Tool::DiscExtractor],
        states: &[JobState::Extracting],
    },
    StepCase {
        image: "mp8.wbfs",
        size: 2 * GIB,
        tool: Tool::GeckoPatcher,
        called: &[Tool::DiscExtractor, Tool::GeckoPatcher],
        states: &[JobState::Extracting, JobState::Patching],
    },
    StepCase {
        image: "mp8.wbfs",
        size: 2 * GIB,
        tool: Tool::DiscRepacker,
        called: &[Tool::DiscExtractor, Tool::GeckoPatcher, Tool::DiscRepacker],
        states: &[JobState::Extracting, JobState::Patching, JobState::Repacking],
    },
    StepCase {
        image: "mp5.iso",
        size: 1400 * MIB,
        tool: Tool::IsoExtractor,
        called: &[Tool::IsoExtractor],
        states: &[JobState::Extracting],
    },
    StepCase {
        image: "mp5.iso",
        size: 1400 * MIB,
        tool: Tool::GeckoPatcher,
        called: &[Tool::IsoExtractor, Tool::GeckoPatcher],
        states: &[JobState::Extracting, JobState::Patching],
    },
    StepCase {
        image: "mp5.iso",
        size: 1400 * MIB,
        tool: Tool::IsoRepacker,
        called: &[Tool::IsoExtractor, Tool::GeckoPatcher, Tool::IsoRepacker],
        states: &[JobState::Extracting, JobState::Patching, JobState::Repacking],
    },
];

/// Run `case` with `runner`, check it stopped at `case.tool` without
/// prompting or leaving files behind, and return the failure.
fn run_to_failure(case: &StepCase, runner: ScriptedRunner) -> InjectError {
    let mut h = Harness::new(runner);
    let image = h.image(case.image, case.size);

    let (states, request, report) = h.run(&image, |_| unreachable!());

    let label = format!("{} / {}", case.image, case.tool);
    assert!(request.is_none(), "{}: asked for a save path", label);
    assert_eq!(h.runner.tools_called(), case.called, "{}", label);

    let mut expected = case.states.to_vec();
    expected.push(JobState::Failed);
    assert_eq!(states, expected, "{}", label);

    assert!(h.scratch_is_empty(), "{}: scratch left behind", label);
    assert_eq!(std::fs::read_dir(h.output.path()).unwrap().count(), 0, "{}", label);
    assert!(!h.controller.is_running());

    match report.outcome {
        JobOutcome::Failed { error } => error,
        other => panic!("{}: expected failure, got {:?}", label, other),
    }
}

#[test]
fn failing_step_stops_the_pipeline() {
    for case in STEP_CASES {
        let error = run_to_failure(
            case,
            ScriptedRunner {
                fail: Some(case.tool),
                ..ScriptedRunner::healthy()
            },
        );
        match error {
            InjectError::ToolExecutionFailed { tool, code } => {
                assert_eq!(tool, case.tool);
                assert_eq!(code, Some(1));
            }
            other => panic!("{}: expected ToolExecutionFailed, got {:?}", case.tool, other),
        }
    }
}

#[test]
fn failure_message_names_the_tool() {
    let mut h = Harness::new(ScriptedRunner {
        fail: Some(Tool::DiscExtractor),
        ..ScriptedRunner::healthy()
    });
    let image = h.image("mp8.wbfs", 2 * GIB);

    let (_, _, report) = h.run(&image, |_| unreachable!());

    assert_eq!(
        report.message(),
        "Error during injection: disc-extractor failed with exit code 1"
    );
}

#[test]
fn silent_producer_is_reported_as_missing_output() {
    // Extractors are excluded: an empty extraction is a malformed image.
    let producers = STEP_CASES
        .iter()
        .filter(|c| !matches!(c.tool, Tool::DiscExtractor | Tool::IsoExtractor));

    for case in producers {
        let error = run_to_failure(
            case,
            ScriptedRunner {
                silent: Some(case.tool),
                ..ScriptedRunner::healthy()
            },
        );
        match error {
            InjectError::ToolOutputMissing { tool, .. } => assert_eq!(tool, case.tool),
            other => panic!("{}: expected ToolOutputMissing, got {:?}", case.tool, other),
        }
    }
}

#[test]
fn silent_extractor_is_reported_as_malformed_image() {
    for tool in [Tool::DiscExtractor, Tool::IsoExtractor] {
        let case = STEP_CASES.iter().find(|c| c.tool == tool).unwrap();
        let error = run_to_failure(
            case,
            ScriptedRunner {
                silent: Some(tool),
                ..ScriptedRunner::healthy()
            },
        );
        assert!(matches!(error, InjectError::MalformedImage(_)), "{:?}", error);
    }
}

#[test]
fn missing_tool_fails_before_any_step() {
    let mut h = Harness::with_missing_tool(ScriptedRunner::healthy(), Some(Tool::DiscRepacker));
    let image = h.image("mp8.wbfs", 2 * GIB);

    let (states, _, report) = h.run(&image, |_| unreachable!());

    assert!(h.runner.tools_called().is_empty());
    assert_eq!(states, vec![JobState::Failed]);
    assert!(matches!(
        report.outcome,
        JobOutcome::Failed {
            error: InjectError::ToolNotFound {
                tool: Tool::DiscRepacker,
                ..
            }
        }
    ));
}

#[test]
fn cancelled_save_writes_nothing() {
    let mut h = Harness::new(ScriptedRunner::healthy());
    let rom = h.image("game.z64", 64 * MIB);

    let (states, _, report) = h.run(&rom, |_| None);

    assert!(matches!(report.outcome, JobOutcome::Cancelled));
    assert_eq!(states.last(), Some(&JobState::Failed));
    assert!(!states.contains(&JobState::Writing));
    assert_eq!(std::fs::read_dir(h.output.path()).unwrap().count(), 0);
    assert!(h.scratch_is_empty());
}

#[test]
fn unanswered_ticket_keeps_job_waiting() {
    let mut h = Harness::new(ScriptedRunner::healthy());
    let rom = h.image("game.z64", 64 * MIB);
    h.controller.submit(&rom, "04001234 00000001").unwrap();

    let mut states = Vec::new();
    let ticket = h.next_ticket(&mut states);
    std::thread::sleep(Duration::from_millis(300));

    assert!(h.controller.is_running());
    assert!(h.events.try_recv().is_err(), "worker moved on without an answer");
    assert!(!h.scratch_is_empty());

    // A second submission is refused while the first waits.
    let again = h.controller.submit(&rom, "04001234 00000001");
    assert!(matches!(again, Err(InjectError::AlreadyRunning)));

    ticket.choose(h.output.path().join("late.z64"));
    let report = h.finish(&mut states);
    assert!(report.success());
    assert!(h.output.path().join("late.z64").is_file());
}

#[test]
fn controller_accepts_a_new_job_after_finishing() {
    let mut h = Harness::new(ScriptedRunner::healthy());
    let rom = h.image("game.z64", 64 * MIB);

    let first = h.output.path().join("one.z64");
    let (_, _, report) = h.run(&rom, |_| Some(first.clone()));
    assert!(report.success());

    let second = h.output.path().join("two.z64");
    let (_, _, report) = h.run(&rom, |_| Some(second.clone()));
    assert!(report.success());
    assert!(first.is_file() && second.is_file());
}

#[test]
fn invalid_submissions_start_nothing() {
    let mut h = Harness::new(ScriptedRunner::healthy());
    let rom = h.image("game.z64", 64 * MIB);

    assert!(matches!(
        h.controller.submit(Path::new(""), "04001234 00000001"),
        Err(InjectError::InvalidInput(_))
    ));
    assert!(matches!(
        h.controller.submit(&rom, "   \n"),
        Err(InjectError::InvalidInput(_))
    ));
    assert!(matches!(
        h.controller
            .submit(&h.input.path().join("absent.z64"), "04001234 00000001"),
        Err(InjectError::FileUnavailable { .. })
    ));
    let bad = h.image("readme.txt", 10);
    assert!(matches!(
        h.controller.submit(&bad, "04001234 00000001"),
        Err(InjectError::ClassificationFailure(_))
    ));

    assert!(!h.controller.is_running());
    assert!(h.events.try_recv().is_err());
    assert!(h.runner.tools_called().is_empty());
}
