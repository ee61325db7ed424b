//! Per-format extract → patch → repack pipelines.
//!
//! The variant is picked once from the classified [`ContainerKind`] and
//! drives the whole job. Every step runs one external tool to completion;
//! a failing step returns immediately so later steps never run.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use mp_toolkit_core::{CodeList, ContainerKind, GameImage, InjectError, Tool};

use crate::broker::{SavePathBroker, SavePathRequest};
use crate::job::{JobState, StageTracker};
use crate::tools::{ToolLocator, ToolRunner};
use crate::workspace::TempWorkspace;

/// Workspace subdirectory the disc extractors unpack into.
pub const EXTRACT_DIR: &str = "tmpROM";

/// Workspace subdirectory the Gecko patcher writes its output into.
pub const PATCHED_DOL_DIR: &str = "tmpDOL";

/// Name of the main executable, both inside the disc tree and in the patcher output.
pub const MAIN_DOL: &str = "main.dol";

/// Folder holding the main executable inside an extracted disc tree.
pub const SYSTEM_DIR: &str = "sys";

/// Everything a pipeline needs from the running job.
pub struct PipelineEnv<'a> {
    pub tools: &'a ToolLocator,
    pub runner: &'a dyn ToolRunner,
    pub workspace: &'a TempWorkspace,
    pub broker: &'a mut SavePathBroker,
    pub stages: &'a mut StageTracker,
}

impl PipelineEnv<'_> {
    fn run_tool<I, S>(&self, tool: Tool, args: I) -> Result<(), InjectError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let invocation = self.tools.invocation(tool, args)?;
        self.runner.run(&invocation)
    }
}

/// The three container pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerPipeline {
    /// Patch the ROM directly; no container phase
    N64Rom,
    /// Wii disc or WBFS: wit extract, Gecko patch with --optimize, wit copy to .wbfs
    WiiDisc,
    /// GameCube ISO: pyisotools extract, Gecko patch, pyisotools build to .iso
    GameCubeDisc,
}

impl ContainerPipeline {
    pub fn for_kind(kind: ContainerKind) -> Self {
        match kind {
            ContainerKind::N64Rom => Self::N64Rom,
            ContainerKind::WiiDisc | ContainerKind::Wbfs => Self::WiiDisc,
            ContainerKind::GameCubeIso => Self::GameCubeDisc,
        }
    }

    /// Tools this pipeline invokes, in order.
    pub fn required_tools(&self) -> &'static [Tool] {
        match self {
            Self::N64Rom => &[Tool::GsPatcher],
            Self::WiiDisc => &[Tool::DiscExtractor, Tool::GeckoPatcher, Tool::DiscRepacker],
            Self::GameCubeDisc => &[Tool::IsoExtractor, Tool::GeckoPatcher, Tool::IsoRepacker],
        }
    }

    /// Run the pipeline and deliver the artifact to a user-chosen path.
    pub fn run(
        &self,
        image: &GameImage,
        codes: &CodeList,
        env: &mut PipelineEnv<'_>,
    ) -> Result<PathBuf, InjectError> {
        let codes_file = codes.write_patch_input(env.workspace.root())?;
        let artifact_name = format!("game.{}", image.kind().output_extension());
        let artifact = env.workspace.path(&artifact_name);

        match self {
            Self::N64Rom => patch_rom(image, &codes_file, &artifact, env)?,
            Self::WiiDisc => patch_disc(image, &codes_file, &artifact, &WII_TOOLS, env)?,
            Self::GameCubeDisc => patch_disc(image, &codes_file, &artifact, &GAMECUBE_TOOLS, env)?,
        }

        deliver(image, &artifact, env)
    }
}

/// The tool pair and argument layout of one disc format.
struct DiscTools {
    extractor: Tool,
    repacker: Tool,
    optimize: bool,
    /// (source image, extract dir) -> extractor arguments
    extract_args: fn(&Path, &Path) -> Vec<OsString>,
    /// (extracted tree, artifact) -> repacker arguments
    repack_args: fn(&Path, &Path) -> Vec<OsString>,
}

const WII_TOOLS: DiscTools = DiscTools {
    extractor: Tool::DiscExtractor,
    repacker: Tool::DiscRepacker,
    optimize: true,
    extract_args: wit_extract_args,
    repack_args: wit_copy_args,
};

const GAMECUBE_TOOLS: DiscTools = DiscTools {
    extractor: Tool::IsoExtractor,
    repacker: Tool::IsoRepacker,
    optimize: false,
    extract_args: iso_extract_args,
    repack_args: iso_build_args,
};

fn wit_extract_args(source: &Path, extract_dir: &Path) -> Vec<OsString> {
    vec!["extract".into(), source.into(), extract_dir.into()]
}

fn wit_copy_args(tree: &Path, artifact: &Path) -> Vec<OsString> {
    vec!["copy".into(), tree.into(), dest_arg(artifact)]
}

fn iso_extract_args(source: &Path, extract_dir: &Path) -> Vec<OsString> {
    vec![source.into(), "E".into(), dest_arg(extract_dir)]
}

fn iso_build_args(tree: &Path, artifact: &Path) -> Vec<OsString> {
    vec![tree.into(), "B".into(), dest_arg(artifact)]
}

fn patch_rom(
    image: &GameImage,
    codes_file: &Path,
    artifact: &Path,
    env: &mut PipelineEnv<'_>,
) -> Result<(), InjectError> {
    env.stages.enter(JobState::Patching);
    env.run_tool(
        Tool::GsPatcher,
        [
            codes_file.as_os_str(),
            image.path().as_os_str(),
            artifact.as_os_str(),
        ],
    )?;
    expect_output(Tool::GsPatcher, artifact)
}

fn patch_disc(
    image: &GameImage,
    codes_file: &Path,
    artifact: &Path,
    tools: &DiscTools,
    env: &mut PipelineEnv<'_>,
) -> Result<(), InjectError> {
    env.stages.enter(JobState::Extracting);
    let extract_dir = env.workspace.path(EXTRACT_DIR);
    env.run_tool(tools.extractor, (tools.extract_args)(image.path(), &extract_dir))?;

    let tree = locate_extracted_tree(&extract_dir)?;
    let dol = tree.join(SYSTEM_DIR).join(MAIN_DOL);
    if !dol.is_file() {
        return Err(InjectError::malformed(format!(
            "no {}/{} in extracted folder {}",
            SYSTEM_DIR,
            MAIN_DOL,
            tree.display()
        )));
    }

    env.stages.enter(JobState::Patching);
    let patched_dir = env.workspace.path(PATCHED_DOL_DIR);
    let mut patch_args: Vec<OsString> = vec!["--hooktype=GX".into()];
    if tools.optimize {
        patch_args.push("--optimize".into());
    }
    patch_args.push(dol.clone().into());
    patch_args.push(codes_file.into());
    patch_args.push(dest_arg(&patched_dir));
    env.run_tool(Tool::GeckoPatcher, patch_args)?;

    let patched_dol = patched_dir.join(MAIN_DOL);
    expect_output(Tool::GeckoPatcher, &patched_dol)?;
    std::fs::remove_file(&dol)?;
    move_file(&patched_dol, &dol)?;

    env.stages.enter(JobState::Repacking);
    env.run_tool(tools.repacker, (tools.repack_args)(&tree, artifact))?;
    expect_output(tools.repacker, artifact)
}

/// Ask the foreground for a destination and move the artifact there.
fn deliver(
    image: &GameImage,
    artifact: &Path,
    env: &mut PipelineEnv<'_>,
) -> Result<PathBuf, InjectError> {
    env.stages.enter(JobState::AwaitingSavePath);
    let destination = env.broker.request(SavePathRequest::for_image(image))?;

    env.stages.enter(JobState::Writing);
    move_file(artifact, &destination)?;
    log::info!("wrote {}", destination.display());
    Ok(destination)
}

/// Find the single top-level folder an extractor produced.
pub fn locate_extracted_tree(extract_dir: &Path) -> Result<PathBuf, InjectError> {
    let entries = std::fs::read_dir(extract_dir).map_err(|e| {
        InjectError::malformed(format!(
            "extraction produced no output in {}: {}",
            extract_dir.display(),
            e
        ))
    })?;

    let mut folders = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            folders.push(path);
        }
    }

    match folders.len() {
        1 => Ok(folders.remove(0)),
        n => Err(InjectError::malformed(format!(
            "expected exactly one top-level folder after extraction, found {}",
            n
        ))),
    }
}

fn expect_output(tool: Tool, path: &Path) -> Result<(), InjectError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(InjectError::ToolOutputMissing {
            tool,
            path: path.to_path_buf(),
        })
    }
}

fn dest_arg(path: &Path) -> OsString {
    let mut arg = OsString::from("--dest=");
    arg.push(path.as_os_str());
    arg
}

/// Rename, falling back to a copy when crossing filesystems.
///
/// The copy goes to a `.part` sibling that is renamed over `to` only once
/// complete, so a failed copy never leaves a truncated file at `to`.
fn move_file(from: &Path, to: &Path) -> Result<(), InjectError> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_into_place(from, to, |src, dst| std::fs::copy(src, dst))?;
    std::fs::remove_file(from)?;
    Ok(())
}

fn part_path(to: &Path) -> PathBuf {
    let mut name = to.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    to.with_file_name(name)
}

fn copy_into_place<F>(from: &Path, to: &Path, copy: F) -> Result<(), InjectError>
where
    F: FnOnce(&Path, &Path) -> io::Result<u64>,
{
    let part = part_path(to);
    let result = copy(from, &part).and_then(|_| std::fs::rename(&part, to));
    if let Err(e) = result {
        if let Err(cleanup) = std::fs::remove_file(&part)
            && cleanup.kind() != io::ErrorKind::NotFound
        {
            log::warn!("cannot remove {}: {}", part.display(), cleanup);
        }
        return Err(e.into());
    }
    Ok(())
}
