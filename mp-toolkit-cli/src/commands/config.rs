use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use mp_toolkit_lib::{Settings, SettingsOverrides};

use crate::error::CliError;

fn source(from_file: bool) -> &'static str {
    if from_file { "settings file" } else { "default" }
}

/// Show the settings file status and the effective value of every setting.
pub(crate) fn run_config_show() -> Result<(), CliError> {
    let path = mp_toolkit_lib::settings_path();

    log::info!(
        "{}",
        "Toolkit Configuration".if_supports_color(Stdout, |t| t.bold()),
    );
    log::info!("");

    if path.exists() {
        log::info!(
            "  Config file: {} {}",
            path.display().if_supports_color(Stdout, |t| t.cyan()),
            "(exists)".if_supports_color(Stdout, |t| t.green()),
        );
    } else {
        log::info!(
            "  Config file: {} {}",
            path.display().if_supports_color(Stdout, |t| t.cyan()),
            "(not found)".if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    log::info!("");

    let settings: Settings = mp_toolkit_lib::load_settings_from(&path)?;
    let resolved = settings.resolve(&SettingsOverrides::default());

    log::info!(
        "  tools.dir:          {} ({})",
        resolved.tools_root.display(),
        source(settings.tools.dir.is_some())
    );
    log::info!(
        "  tools.timeout_secs: {} ({})",
        resolved
            .tool_timeout
            .map(|d| d.as_secs().to_string())
            .unwrap_or_else(|| "none".to_string()),
        source(settings.tools.timeout_secs.is_some())
    );
    log::info!(
        "  workspace.dir:      {} ({})",
        resolved.scratch_root.display(),
        source(settings.workspace.dir.is_some())
    );

    let rendered = mp_toolkit_lib::render_settings(&settings)?;
    if !rendered.trim().is_empty() {
        log::info!("");
        for line in rendered.lines() {
            log::info!("  {}", line.if_supports_color(Stdout, |t| t.dimmed()));
        }
    }
    Ok(())
}

/// Change one setting and write the file back.
pub(crate) fn run_config_set(key: &str, value: &str) -> Result<(), CliError> {
    let path = mp_toolkit_lib::settings_path();
    let mut settings = mp_toolkit_lib::load_settings_from(&path)?;
    settings.set(key, value)?;
    mp_toolkit_lib::save_settings_to(&path, &settings)?;

    let key = key.if_supports_color(Stdout, |t| t.bold());
    if value.trim().is_empty() {
        log::info!("Cleared {} in {}", key, path.display());
    } else {
        log::info!("Set {} = {} in {}", key, value.trim(), path.display());
    }
    Ok(())
}

/// Print the config file path.
pub(crate) fn run_config_path() {
    println!("{}", mp_toolkit_lib::settings_path().display());
}
