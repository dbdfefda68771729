//! Error types emitted by the TourGuide CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use tourguide_core::RewardConfigError;
use tourguide_dispatch::ServiceError;

/// Errors emitted by the TourGuide CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The scenario path does not exist.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// The scenario path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// The scenario path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening the scenario file failed.
    #[error("failed to open scenario at {path:?}: {source}")]
    OpenScenario {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The scenario JSON could not be decoded.
    #[error("failed to parse scenario JSON at {path:?}: {source}")]
    ParseScenario {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Two scenario tourists share a user name.
    #[error("scenario in {path:?} registers {user_name} more than once")]
    DuplicateTourist {
        path: Utf8PathBuf,
        user_name: String,
    },
    /// The reward buffer override was rejected.
    #[error(transparent)]
    RewardBuffer(#[from] RewardConfigError),
    /// The engine failed while serving the command.
    #[error(transparent)]
    Service(#[from] Box<ServiceError>),
    /// Serialising the command output failed.
    #[error("failed to serialise command output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing the command output failed.
    #[error("failed to write command output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

impl From<ServiceError> for CliError {
    fn from(err: ServiceError) -> Self {
        Self::Service(Box::new(err))
    }
}
