//! CLI type definitions: command enums and argument structs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mp-toolkit")]
#[command(about = "Inject cheat codes into Mario Party game images", long_about = None)]
pub(crate) struct Cli {
    /// Only show warnings and errors (suppress normal output)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Enable verbose/debug logging (timestamps + debug-level messages)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for the values normally read from settings.toml.
#[derive(Args, Clone, Default)]
pub(crate) struct LocationArgs {
    /// Root of the bundled tool tree (contains win32/, darwin/, linux/)
    #[arg(long)]
    pub tools_dir: Option<PathBuf>,

    /// Directory under which per-job scratch folders are created
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Kill any single tool that runs longer than this many seconds (0 = never)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Args, Clone)]
pub(crate) struct InjectArgs {
    /// Game image (.z64, .n64, .v64, .iso, .gcm or .wbfs)
    pub image: PathBuf,

    /// Read codes from this file
    #[arg(long, value_name = "FILE", conflicts_with = "codes_text")]
    pub codes: Option<PathBuf>,

    /// Pass codes inline
    #[arg(long, value_name = "TEXT")]
    pub codes_text: Option<String>,

    /// Write the patched image here without prompting
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Ask for the destination with a native save dialog
    #[arg(long, conflicts_with = "output")]
    pub dialog: bool,

    #[command(flatten)]
    pub locations: LocationArgs,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Patch codes into a game image
    Inject(InjectArgs),

    /// Show how an image would be handled
    Classify {
        /// Game image to inspect
        image: PathBuf,
    },

    /// List the external tools and where they were found
    Tools {
        /// Root of the bundled tool tree
        #[arg(long)]
        tools_dir: Option<PathBuf>,
    },

    /// Inspect or edit the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show the effective settings and where each value comes from
    Show,

    /// Print the settings file path
    Path,

    /// Store a value in the settings file (an empty value clears it)
    Set {
        /// tools.dir, tools.timeout_secs or workspace.dir
        key: String,
        value: String,
    },
}
