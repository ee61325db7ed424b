//! mp-toolkit CLI
//!
//! Command-line frontend for injecting cheat codes into Mario Party images.

mod cli_types;
mod commands;
mod error;
mod prompt;
mod spinner;

use std::io::Write;

use clap::Parser;
use log::LevelFilter;
use owo_colors::OwoColorize;
use owo_colors::Stream::Stderr;

use cli_types::{Cli, Commands, ConfigAction};
use commands::classify::run_classify;
use commands::config::{run_config_path, run_config_set, run_config_show};
use commands::inject::run_inject;
use commands::tools::run_tools;
use error::CliError;

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Inject(args) => run_inject(args, cli.quiet),
        Commands::Classify { image } => run_classify(&image).map(|()| true),
        Commands::Tools { tools_dir } => run_tools(tools_dir).map(|()| true),
        Commands::Config { action } => match action {
            ConfigAction::Show => run_config_show().map(|()| true),
            ConfigAction::Path => {
                run_config_path();
                Ok(true)
            }
            ConfigAction::Set { key, value } => run_config_set(&key, &value).map(|()| true),
        },
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            report_error(&e);
            std::process::exit(1);
        }
    }
}

/// `--verbose` shows debug output with timestamps, `--quiet` only warnings
/// and errors. `RUST_LOG` overrides either.
fn init_logger(verbose: bool, quiet: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if !verbose {
        // Engine progress is shown by the spinner; keep its info lines out of the way.
        builder.filter_module("mp_toolkit_lib", LevelFilter::Warn);
        builder.format(|buf, record| match record.level() {
            log::Level::Info => writeln!(buf, "{}", record.args()),
            level => writeln!(buf, "{}: {}", level.as_str().to_lowercase(), record.args()),
        });
    } else {
        builder.format_timestamp_millis();
    }
    builder.parse_default_env();
    builder.init();
}

fn report_error(e: &CliError) {
    eprintln!("{} {}", "error:".if_supports_color(Stderr, |t| t.red()), e);
}
