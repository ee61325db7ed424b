//! Answering save-path requests on the main thread.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use mp_toolkit_lib::SavePathRequest;

use crate::error::CliError;

/// Where the patched image goes once the job asks.
pub(crate) enum SaveTarget {
    /// Path given on the command line; a directory gets the suggested name
    Fixed(PathBuf),
    /// Ask on the terminal
    Terminal,
    /// Native save dialog
    Dialog,
}

impl SaveTarget {
    pub(crate) fn from_args(output: Option<PathBuf>, dialog: bool) -> Result<Self, CliError> {
        match (output, dialog) {
            (Some(path), _) => Ok(Self::Fixed(path)),
            (None, true) if cfg!(feature = "native-dialog") => Ok(Self::Dialog),
            (None, true) => Err(CliError::usage(
                "--dialog needs a build with the native-dialog feature",
            )),
            (None, false) => Ok(Self::Terminal),
        }
    }

    pub(crate) fn is_interactive(&self) -> bool {
        matches!(self, Self::Terminal)
    }

    /// `Ok(None)` means the user declined to save.
    pub(crate) fn choose(&self, request: &SavePathRequest) -> Result<Option<PathBuf>, CliError> {
        match self {
            Self::Fixed(path) => Ok(Some(complete_path(path.clone(), request))),
            Self::Terminal => {
                let cwd = std::env::current_dir()?;
                let stdin = std::io::stdin();
                let mut stderr = std::io::stderr();
                prompt_for_path(request, &mut stdin.lock(), &mut stderr, &cwd)
                    .map_err(|e| CliError::prompt(e.to_string()))
            }
            Self::Dialog => Ok(show_dialog(request)),
        }
    }
}

#[cfg(feature = "native-dialog")]
fn show_dialog(request: &SavePathRequest) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Save patched image")
        .set_file_name(request.suggested_name.as_str())
        .add_filter(request.filter_description.as_str(), &[request.extension.as_str()])
        .save_file()
}

#[cfg(not(feature = "native-dialog"))]
fn show_dialog(_request: &SavePathRequest) -> Option<PathBuf> {
    None
}

/// Ask for a destination on `output`, reading the answer from `input`.
///
/// An empty answer accepts the suggested name in `cwd`; `q` or end of input
/// cancels.
pub(crate) fn prompt_for_path(
    request: &SavePathRequest,
    input: &mut impl BufRead,
    output: &mut impl Write,
    cwd: &Path,
) -> std::io::Result<Option<PathBuf>> {
    write!(
        output,
        "Save patched image as [{}] (q to cancel): ",
        request.suggested_name
    )?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        writeln!(output)?;
        return Ok(None);
    }

    let answer = line.trim();
    if answer.eq_ignore_ascii_case("q") {
        return Ok(None);
    }
    if answer.is_empty() {
        return Ok(Some(cwd.join(&request.suggested_name)));
    }
    Ok(Some(complete_path(cwd.join(answer), request)))
}

/// Fill in the suggested file name for a directory and the extension for a bare name.
fn complete_path(mut path: PathBuf, request: &SavePathRequest) -> PathBuf {
    if path.is_dir() {
        return path.join(&request.suggested_name);
    }
    if path.extension().is_none() {
        path.set_extension(&request.extension);
    }
    path
}
