//! Game image classification.
//!
//! Classification is a pure function of the file extension and the file
//! size. The size cutoffs are fixed: N64 cartridges are small, Wii discs are
//! large and GameCube discs sit in between.

use std::path::{Path, PathBuf};

use crate::container::ContainerKind;
use crate::error::InjectError;

/// `.iso` images strictly larger than this are Wii discs.
pub const WII_ISO_MIN_EXCLUSIVE: u64 = 4 * 1024 * 1024 * 1024;

/// Images strictly smaller than this are N64 ROMs.
pub const N64_ROM_MAX_EXCLUSIVE: u64 = 100 * 1024 * 1024;

/// Extensions accepted as N64 cartridge dumps.
pub const N64_EXTENSIONS: &[&str] = &["z64", "n64", "v64"];

/// Extensions accepted as raw optical disc images.
pub const DISC_EXTENSIONS: &[&str] = &["iso", "gcm"];

/// Every extension the injector accepts, for open-file filters.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["z64", "n64", "v64", "iso", "gcm", "wbfs"];

/// A classified source image. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameImage {
    path: PathBuf,
    size_bytes: u64,
    kind: ContainerKind,
}

impl GameImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// File name without its extension, used to build the suggested output name.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "game".to_string())
    }

    /// Suggested name for the patched artifact, e.g. `game (Modded).wbfs`.
    pub fn suggested_output_name(&self) -> String {
        format!("{} (Modded).{}", self.stem(), self.kind.output_extension())
    }
}

/// Stat `path` and classify it.
///
/// Fails with [`InjectError::FileUnavailable`] when the file cannot be
/// stat'ed and [`InjectError::ClassificationFailure`] when the
/// extension/size pair matches no supported container.
pub fn classify(path: &Path) -> Result<GameImage, InjectError> {
    let metadata =
        std::fs::metadata(path).map_err(|e| InjectError::file_unavailable(path, e))?;
    if !metadata.is_file() {
        return Err(InjectError::file_unavailable(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let kind = classify_parts(extension, metadata.len())?;

    log::debug!(
        "classified {} ({} bytes) as {}",
        path.display(),
        metadata.len(),
        kind.short_name()
    );

    Ok(GameImage {
        path: path.to_path_buf(),
        size_bytes: metadata.len(),
        kind,
    })
}

/// Decide the container kind from an extension (without dot) and a size.
///
/// Rules, in order:
/// 1. `iso` larger than 4 GiB is a Wii disc
/// 2. `wbfs` is a WBFS image
/// 3. anything under 100 MiB is an N64 ROM
/// 4. everything else is a GameCube ISO
///
/// Rules 3 and 4 only apply to extensions of the matching family, so a
/// 200 MiB `.z64` or a 10 MiB `.iso` is rejected instead of being handed
/// to the wrong patcher.
pub fn classify_parts(extension: &str, size_bytes: u64) -> Result<ContainerKind, InjectError> {
    let ext = extension.to_ascii_lowercase();
    let is_n64 = N64_EXTENSIONS.contains(&ext.as_str());
    let is_disc = DISC_EXTENSIONS.contains(&ext.as_str());

    if ext == "iso" && size_bytes > WII_ISO_MIN_EXCLUSIVE {
        return Ok(ContainerKind::WiiDisc);
    }
    if ext == "wbfs" {
        return Ok(ContainerKind::Wbfs);
    }
    if !is_n64 && !is_disc {
        return Err(InjectError::classification(if ext.is_empty() {
            "file has no extension".to_string()
        } else {
            format!("unsupported extension .{}", ext)
        }));
    }

    if size_bytes < N64_ROM_MAX_EXCLUSIVE {
        if is_n64 {
            Ok(ContainerKind::N64Rom)
        } else {
            Err(InjectError::classification(format!(
                ".{} image of {} bytes is too small for a GameCube disc",
                ext, size_bytes
            )))
        }
    } else if is_disc {
        Ok(ContainerKind::GameCubeIso)
    } else {
        Err(InjectError::classification(format!(
            ".{} image of {} bytes is too large for an N64 ROM",
            ext, size_bytes
        )))
    }
}

#[cfg(test)]
#[path = "tests/classify_tests.rs"]
mod tests;
