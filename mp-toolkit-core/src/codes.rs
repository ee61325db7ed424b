use std::io;
use std::path::{Path, PathBuf};

use crate::error::InjectError;

/// Marker line written ahead of the codes in every patch-input file.
pub const PATCH_MARKER: &str = "$MPToolkit";

/// File name of the patch-input file inside a workspace.
pub const PATCH_INPUT_FILE_NAME: &str = "codes.txt";

/// Cheat-code text handed to a job. Never empty once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeList {
    text: String,
}

impl CodeList {
    /// Trim surrounding whitespace and reject text that is left empty.
    pub fn new(text: &str) -> Result<Self, InjectError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(InjectError::invalid_input("no codes to inject"));
        }
        Ok(Self {
            text: trimmed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// Contents of the patch-input file: marker line, then the codes verbatim.
    pub fn patch_input(&self) -> String {
        format!("{}\n{}", PATCH_MARKER, self.text)
    }

    /// Write the patch-input file into `dir` and return its path.
    pub fn write_patch_input(&self, dir: &Path) -> io::Result<PathBuf> {
        let path = dir.join(PATCH_INPUT_FILE_NAME);
        std::fs::write(&path, self.patch_input())?;
        Ok(path)
    }
}
