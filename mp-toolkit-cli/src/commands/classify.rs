use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use mp_toolkit_core::classify;
use mp_toolkit_core::util::format_size;
use mp_toolkit_lib::ContainerPipeline;

/// Print how `image` would be handled without running anything.
pub(crate) fn run_classify(path: &Path) -> Result<(), crate::error::CliError> {
    let image = classify(path)?;
    let pipeline = ContainerPipeline::for_kind(image.kind());
    let tools: Vec<&str> = pipeline
        .required_tools()
        .iter()
        .map(|t| t.logical_name())
        .collect();

    log::info!(
        "{}",
        image.path().display().if_supports_color(Stdout, |t| t.bold())
    );
    log::info!(
        "  Container: {}",
        image
            .kind()
            .display_name()
            .if_supports_color(Stdout, |t| t.cyan())
    );
    log::info!("  Size:      {}", format_size(image.size_bytes()));
    log::info!("  Steps:     {}", tools.join(" -> "));
    log::info!("  Output:    {}", image.suggested_output_name());
    Ok(())
}
