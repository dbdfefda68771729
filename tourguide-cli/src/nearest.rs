//! `nearest` command: the attractions closest to one tourist.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use geo::Coord;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tourguide_core::{DEFAULT_NEAREST_LIMIT, NearbyAttraction};
use tourguide_dispatch::DispatchConfig;

use crate::scenario::{ScenarioGuide, load_scenario};
use crate::{
    ARG_LIMIT, ARG_SCENARIO, ARG_USER, CliError, ENV_NEAREST_SCENARIO, ENV_NEAREST_USER,
    require_existing, shutdown, write_json,
};

/// CLI arguments for the `nearest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Report the attractions nearest a tourist's latest position. \
                 Tourists without a recorded visit are polled once through \
                 the scenario's location source.",
    about = "List the attractions nearest a tourist"
)]
#[ortho_config(prefix = "TOURGUIDE")]
pub(crate) struct NearestArgs {
    /// Path to the JSON scenario file.
    #[arg(long = ARG_SCENARIO, value_name = "path")]
    #[serde(default)]
    pub(crate) scenario: Option<Utf8PathBuf>,
    /// User name of the tourist to query for.
    #[arg(long = ARG_USER, value_name = "name")]
    #[serde(default)]
    pub(crate) user: Option<String>,
    /// Number of attractions to return; zero or less selects the default.
    #[arg(long = ARG_LIMIT, value_name = "count", allow_negative_numbers = true)]
    #[serde(default)]
    pub(crate) limit: Option<i64>,
}

impl NearestArgs {
    pub(crate) fn into_config(self) -> Result<NearestConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        NearestConfig::try_from(merged)
    }
}

/// Resolved `nearest` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NearestConfig {
    pub(crate) scenario: Utf8PathBuf,
    pub(crate) user: String,
    pub(crate) limit: i64,
}

impl TryFrom<NearestArgs> for NearestConfig {
    type Error = CliError;

    fn try_from(args: NearestArgs) -> Result<Self, Self::Error> {
        let scenario = args.scenario.ok_or(CliError::MissingArgument {
            field: ARG_SCENARIO,
            env: ENV_NEAREST_SCENARIO,
        })?;
        let user = args.user.ok_or(CliError::MissingArgument {
            field: ARG_USER,
            env: ENV_NEAREST_USER,
        })?;
        let default_limit = i64::try_from(DEFAULT_NEAREST_LIMIT).unwrap_or(i64::MAX);
        Ok(Self {
            scenario,
            user,
            limit: args.limit.unwrap_or(default_limit),
        })
    }
}

/// JSON document printed by `nearest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct NearestOutput {
    pub(crate) user_name: String,
    pub(crate) location: Coord<f64>,
    pub(crate) attractions: Vec<NearbyAttraction>,
}

pub(crate) fn run_nearest_with(args: NearestArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    require_existing(&config.scenario, ARG_SCENARIO)?;
    let guide = load_scenario(&config.scenario)?
        .into_guide(&config.scenario, DispatchConfig::default())?;
    let output = query(&guide, &config);
    shutdown(&guide);
    write_json(writer, &output?)
}

fn query(guide: &ScenarioGuide, config: &NearestConfig) -> Result<NearestOutput, CliError> {
    let location = guide.user_location(&config.user)?.location;
    let attractions = guide.nearby_attractions(&config.user, config.limit)?;
    Ok(NearestOutput {
        user_name: config.user.clone(),
        location,
        attractions,
    })
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<NearestConfig, CliError> {
    let merged = NearestArgs::merge_from_layers(layers).map_err(CliError::from)?;
    NearestConfig::try_from(merged)
}
