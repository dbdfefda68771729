//! Command-line interface for running the TourGuide engine over JSON
//! scenario files.
#![forbid(unsafe_code)]

use std::io::Write;
use std::time::Duration;

use camino::Utf8Path;
use clap::{Parser, Subcommand};
use log::warn;
use serde::Serialize;

mod batch;
mod error;
mod fs;
mod nearest;
mod scenario;

pub use error::CliError;

use batch::{RewardsArgs, TrackArgs};
use nearest::NearestArgs;
use scenario::ScenarioGuide;

const ARG_SCENARIO: &str = "scenario";
const ARG_USER: &str = "user";
const ARG_LIMIT: &str = "limit";
const ARG_REWARD_BUFFER: &str = "reward-buffer";
const ENV_NEAREST_SCENARIO: &str = "TOURGUIDE_CMDS_NEAREST_SCENARIO";
const ENV_NEAREST_USER: &str = "TOURGUIDE_CMDS_NEAREST_USER";
const ENV_REWARDS_SCENARIO: &str = "TOURGUIDE_CMDS_REWARDS_SCENARIO";
const ENV_TRACK_SCENARIO: &str = "TOURGUIDE_CMDS_TRACK_SCENARIO";

/// How long worker pools may take to drain before the command exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Run the TourGuide CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    run_command(cli.command, &mut stdout)
}

fn run_command(command: Command, writer: &mut dyn Write) -> Result<(), CliError> {
    match command {
        Command::Nearest(args) => nearest::run_nearest_with(args, writer),
        Command::Rewards(args) => batch::run_rewards_with(args, writer),
        Command::Track(args) => batch::run_track_with(args, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "tourguide",
    about = "Reward attribution and nearby-attraction queries over scenario files",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the attractions nearest a tourist.
    Nearest(NearestArgs),
    /// Attribute rewards from each tourist's recorded history.
    Rewards(RewardsArgs),
    /// Poll every tourist once and attribute rewards concurrently.
    Track(TrackArgs),
}

fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_json<T: Serialize>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

fn shutdown(guide: &ScenarioGuide) {
    let report = guide.shutdown(SHUTDOWN_GRACE);
    if !report.is_graceful() {
        warn!(
            "worker pools did not drain within {SHUTDOWN_GRACE:?}: {} polling and {} reward workers abandoned",
            report.polling.abandoned, report.rewards.abandoned
        );
    }
}

#[cfg(test)]
mod tests;
