use std::path::PathBuf;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use mp_toolkit_core::Tool;
use mp_toolkit_lib::{SettingsOverrides, ToolLocator};

use crate::error::CliError;

/// List every logical tool with the binary it resolves to.
pub(crate) fn run_tools(tools_dir: Option<PathBuf>) -> Result<(), CliError> {
    let overrides = SettingsOverrides {
        tools_dir,
        ..Default::default()
    };
    let resolved = mp_toolkit_lib::load_settings()?.resolve(&overrides);
    let locator = ToolLocator::new(&resolved.tools_root);

    log::info!(
        "Tool root: {} ({})",
        locator
            .root()
            .display()
            .if_supports_color(Stdout, |t| t.cyan()),
        locator.os().dir_name()
    );
    log::info!("");

    let mut missing = 0;
    for &tool in Tool::all() {
        match locator.resolve(tool) {
            Ok(path) => log::info!(
                "  {:<18} {}",
                tool.logical_name().if_supports_color(Stdout, |t| t.bold()),
                path.display()
            ),
            Err(_) => {
                missing += 1;
                log::info!(
                    "  {:<18} {} (expected {})",
                    tool.logical_name().if_supports_color(Stdout, |t| t.bold()),
                    "missing".if_supports_color(Stdout, |t| t.red()),
                    locator.expected_path(tool).display()
                );
            }
        }
    }

    if missing > 0 {
        log::warn!("{} of {} tools missing", missing, Tool::all().len());
    }
    Ok(())
}
