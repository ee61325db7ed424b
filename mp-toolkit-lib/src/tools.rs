//! Locating and running the bundled platform tools.
//!
//! Tools live under `<root>/<os dir>/<binary>` (e.g. `dependencies/win32/wit.exe`).
//! Resolution never falls back to another OS directory or another binary:
//! a missing tool is a hard [`InjectError::ToolNotFound`].

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use mp_toolkit_core::util::format_command_line;
use mp_toolkit_core::{InjectError, Tool};

/// Directory name of the bundled tool tree next to the executable.
pub const TOOLS_DIR_NAME: &str = "dependencies";

/// Poll interval while waiting on a child process with a timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to keep reading stderr once the tool itself has exited.
const STDERR_GRACE: Duration = Duration::from_secs(2);

/// Operating system families with their own tool builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    MacOs,
    Linux,
}

impl OsFamily {
    /// Family of the running process.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    /// Subdirectory of the tool root holding this family's binaries.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Windows => "win32",
            Self::MacOs => "darwin",
            Self::Linux => "linux",
        }
    }

    pub fn executable_suffix(&self) -> &'static str {
        match self {
            Self::Windows => ".exe",
            Self::MacOs | Self::Linux => "",
        }
    }
}

/// Resolves logical tool names to bundled executables.
#[derive(Debug, Clone)]
pub struct ToolLocator {
    root: PathBuf,
    os: OsFamily,
}

impl ToolLocator {
    /// Locator for the running OS rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::for_os(root, OsFamily::current())
    }

    pub fn for_os(root: impl Into<PathBuf>, os: OsFamily) -> Self {
        Self {
            root: root.into(),
            os,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn os(&self) -> OsFamily {
        self.os
    }

    /// Where `tool` is expected to live, whether or not it exists.
    pub fn expected_path(&self, tool: Tool) -> PathBuf {
        self.root.join(self.os.dir_name()).join(format!(
            "{}{}",
            tool.binary_stem(),
            self.os.executable_suffix()
        ))
    }

    /// Absolute path of the bundled executable for `tool`.
    pub fn resolve(&self, tool: Tool) -> Result<PathBuf, InjectError> {
        let path = self.expected_path(tool);
        if !path.is_file() {
            return Err(InjectError::ToolNotFound { tool, path });
        }
        Ok(std::path::absolute(&path).unwrap_or(path))
    }

    /// Build an invocation of `tool` with `args`, resolving the binary first.
    pub fn invocation<I, S>(&self, tool: Tool, args: I) -> Result<ToolInvocation, InjectError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Ok(ToolInvocation {
            tool,
            program: self.resolve(tool)?,
            args: args.into_iter().map(Into::into).collect(),
        })
    }
}

/// Default tool root: `dependencies/` next to the running executable when
/// present, otherwise `dependencies/` under the current directory.
pub fn default_tools_root() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        let exe = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(TOOLS_DIR_NAME);
            if candidate.is_dir() {
                return candidate;
            }
        }
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(TOOLS_DIR_NAME)
}

/// One fully-resolved external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool: Tool,
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    /// Arguments as lossy UTF-8, for logging and tests.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

impl std::fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format_command_line(
            &self.program.to_string_lossy(),
            self.args_lossy(),
        ))
    }
}

/// Runs external tools to completion.
///
/// Implementations must block until the tool exits and map a non-zero exit
/// to [`InjectError::ToolExecutionFailed`].
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), InjectError>;
}

/// Runs tools as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Runner that waits for each tool indefinitely.
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill a tool that runs longer than `timeout` (`None` waits forever).
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<(), InjectError> {
        let tool = invocation.tool;
        log::debug!("running {}: {}", tool, invocation);

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InjectError::ToolNotFound {
                        tool,
                        path: invocation.program.clone(),
                    }
                } else {
                    InjectError::Io(e)
                }
            })?;

        // Drain stderr on its own thread so a chatty tool cannot fill the pipe
        // while we are polling for exit. The thread ends when every holder of
        // the pipe has closed it, which may be later than the tool's own exit.
        let stderr = child.stderr.take();
        let (stderr_tx, stderr_rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf);
            }
            let _ = stderr_tx.send(buf);
        });

        let status = match self.timeout {
            None => child.wait()?,
            Some(limit) => wait_with_deadline(&mut child, limit, tool)?,
        };
        let stderr_text = collect_stderr(&stderr_rx, tool);

        if status.success() {
            log::debug!("{} finished", tool);
            Ok(())
        } else {
            if let Some(last) = stderr_text.lines().rev().find(|l| !l.trim().is_empty()) {
                log::warn!("{} stderr: {}", tool, last.trim());
            }
            Err(InjectError::ToolExecutionFailed {
                tool,
                code: status.code(),
            })
        }
    }
}

/// Stderr of an exited tool. A background process the tool left behind can
/// inherit the pipe and hold it open; after [`STDERR_GRACE`] the drain thread
/// is left to finish on its own and the text is dropped.
fn collect_stderr(rx: &Receiver<String>, tool: Tool) -> String {
    match rx.recv_timeout(STDERR_GRACE) {
        Ok(text) => text,
        Err(_) => {
            log::debug!("{} exited but its stderr is still open, not waiting", tool);
            String::new()
        }
    }
}

fn wait_with_deadline(
    child: &mut std::process::Child,
    limit: Duration,
    tool: Tool,
) -> Result<ExitStatus, InjectError> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            log::warn!("{} exceeded {}s, killing it", tool, limit.as_secs());
            let _ = child.kill();
            let _ = child.wait();
            return Err(InjectError::ToolTimedOut {
                tool,
                seconds: limit.as_secs(),
            });
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
