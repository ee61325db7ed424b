use std::io::Read;

use owo_colors::OwoColorize;
use owo_colors::Stream::{Stderr, Stdout};

use mp_toolkit_lib::{InjectorController, JobEvent, JobOutcome, JobReport, SettingsOverrides};

use crate::cli_types::InjectArgs;
use crate::error::CliError;
use crate::prompt::SaveTarget;
use crate::spinner::JobSpinner;

/// Run one injection job to completion.
///
/// Returns `Ok(false)` when the job itself failed; cancelling at the save
/// prompt counts as a normal exit.
pub(crate) fn run_inject(args: InjectArgs, quiet: bool) -> Result<bool, CliError> {
    let target = SaveTarget::from_args(args.output.clone(), args.dialog)?;
    let codes = read_codes(&args, &target)?;

    let settings = mp_toolkit_lib::load_settings()?;
    let resolved = settings.resolve(&SettingsOverrides::from(&args.locations));
    log::debug!(
        "tools: {}, scratch: {}, timeout: {:?}",
        resolved.tools_root.display(),
        resolved.scratch_root.display(),
        resolved.tool_timeout
    );

    let (mut controller, events) = InjectorController::new(resolved.job_resources());
    let job_id = controller.submit(&args.image, &codes)?;
    log::debug!("submitted job {}", job_id);

    let spinner = JobSpinner::new(quiet);
    let mut prompt_error = None;
    let report = loop {
        let event = events
            .recv()
            .map_err(|_| std::io::Error::other("injection worker stopped unexpectedly"))?;
        match event {
            JobEvent::Started { image, kind, .. } => {
                let name = image.file_name().map(|n| n.to_string_lossy().into_owned());
                spinner.set_message(format!(
                    "{} ({})",
                    name.unwrap_or_else(|| image.display().to_string()),
                    kind
                ));
            }
            JobEvent::StateChanged { state, .. } => spinner.set_state(state),
            JobEvent::SavePathRequested(ticket) => {
                let choice = if target.is_interactive() {
                    spinner.suspend(|| target.choose(ticket.request()))
                } else {
                    target.choose(ticket.request())
                };
                match choice {
                    Ok(path) => ticket.answer(path),
                    Err(e) => {
                        ticket.cancel();
                        prompt_error = Some(e);
                    }
                }
            }
            JobEvent::Finished(report) => break report,
        }
    };
    controller.wait();
    spinner.clear();

    if let Some(e) = prompt_error {
        return Err(e);
    }
    Ok(print_report(&report))
}

/// Codes come from `--codes`, `--codes-text`, or stdin, in that order.
fn read_codes(args: &InjectArgs, target: &SaveTarget) -> Result<String, CliError> {
    if let Some(path) = &args.codes {
        return Ok(std::fs::read_to_string(path)?);
    }
    if let Some(text) = &args.codes_text {
        return Ok(text.clone());
    }
    if target.is_interactive() {
        return Err(CliError::usage(
            "codes read from stdin need --output or --dialog, since stdin cannot also answer the save prompt",
        ));
    }
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    Ok(text)
}

fn print_report(report: &JobReport) -> bool {
    if let Some(e) = &report.teardown_error {
        log::warn!("{}", e);
    }

    match &report.outcome {
        JobOutcome::Done { path } => {
            println!(
                "{} {}",
                "\u{2714}".if_supports_color(Stdout, |t| t.green()),
                report.message()
            );
            println!(
                "  Saved to {}",
                path.display().if_supports_color(Stdout, |t| t.cyan())
            );
            true
        }
        JobOutcome::Cancelled => {
            println!(
                "{}",
                report.message().if_supports_color(Stdout, |t| t.yellow())
            );
            true
        }
        JobOutcome::Failed { .. } => {
            eprintln!(
                "{} {}",
                "\u{2718}".if_supports_color(Stderr, |t| t.red()),
                report.message()
            );
            false
        }
    }
}
