//! `rewards` and `track` commands: one attribution batch over every tourist
//! in a scenario.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tourguide_core::{LocationSample, RewardConfig, RewardRecord, Tourist};
use tourguide_dispatch::{BatchReport, DispatchConfig};

use crate::scenario::{ScenarioGuide, load_scenario};
use crate::{
    ARG_REWARD_BUFFER, ARG_SCENARIO, CliError, ENV_REWARDS_SCENARIO, ENV_TRACK_SCENARIO,
    require_existing, shutdown, write_json,
};

/// CLI arguments for the `rewards` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Attribute rewards from each tourist's recorded history \
                 without polling for new positions.",
    about = "Attribute rewards from recorded histories"
)]
#[ortho_config(prefix = "TOURGUIDE")]
pub(crate) struct RewardsArgs {
    /// Path to the JSON scenario file.
    #[arg(long = ARG_SCENARIO, value_name = "path")]
    #[serde(default)]
    pub(crate) scenario: Option<Utf8PathBuf>,
    /// Reward buffer in statute miles (defaults to 10).
    #[arg(long = ARG_REWARD_BUFFER, value_name = "miles")]
    #[serde(default)]
    pub(crate) reward_buffer: Option<f64>,
}

/// CLI arguments for the `track` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Poll every tourist once through the scenario's location \
                 source, record the new position and attribute rewards, \
                 running one task per tourist on the reward pool.",
    about = "Track every tourist once"
)]
#[ortho_config(prefix = "TOURGUIDE")]
pub(crate) struct TrackArgs {
    /// Path to the JSON scenario file.
    #[arg(long = ARG_SCENARIO, value_name = "path")]
    #[serde(default)]
    pub(crate) scenario: Option<Utf8PathBuf>,
    /// Reward buffer in statute miles (defaults to 10).
    #[arg(long = ARG_REWARD_BUFFER, value_name = "miles")]
    #[serde(default)]
    pub(crate) reward_buffer: Option<f64>,
}

impl RewardsArgs {
    pub(crate) fn into_config(self) -> Result<BatchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        BatchConfig::resolve(merged.scenario, merged.reward_buffer, ENV_REWARDS_SCENARIO)
    }
}

impl TrackArgs {
    pub(crate) fn into_config(self) -> Result<BatchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        BatchConfig::resolve(merged.scenario, merged.reward_buffer, ENV_TRACK_SCENARIO)
    }
}

/// Resolved configuration shared by `rewards` and `track`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BatchConfig {
    pub(crate) scenario: Utf8PathBuf,
    pub(crate) reward: RewardConfig,
}

impl BatchConfig {
    fn resolve(
        scenario_arg: Option<Utf8PathBuf>,
        reward_buffer: Option<f64>,
        env: &'static str,
    ) -> Result<Self, CliError> {
        let scenario = scenario_arg.ok_or(CliError::MissingArgument {
            field: ARG_SCENARIO,
            env,
        })?;
        let reward = reward_buffer
            .map(RewardConfig::new)
            .transpose()?
            .unwrap_or_default();
        Ok(Self { scenario, reward })
    }
}

/// Per-tourist entry printed by `rewards` and `track`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TouristReport {
    pub(crate) user_name: String,
    pub(crate) last_location: Option<LocationSample>,
    pub(crate) total_reward_points: u64,
    pub(crate) rewards: Vec<RewardRecord>,
}

impl From<&Tourist> for TouristReport {
    fn from(tourist: &Tourist) -> Self {
        Self {
            user_name: tourist.user_name().to_owned(),
            last_location: tourist.last_visit(),
            total_reward_points: tourist.total_reward_points(),
            rewards: tourist.rewards(),
        }
    }
}

pub(crate) fn run_rewards_with(args: RewardsArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    run_batch(&config, writer, ScenarioGuide::attribute_all)
}

pub(crate) fn run_track_with(args: TrackArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    run_batch(&config, writer, ScenarioGuide::dispatch_all)
}

fn run_batch<F>(config: &BatchConfig, writer: &mut dyn Write, batch: F) -> Result<(), CliError>
where
    F: FnOnce(&ScenarioGuide) -> Result<BatchReport, tourguide_dispatch::ServiceError>,
{
    require_existing(&config.scenario, ARG_SCENARIO)?;
    let guide = load_scenario(&config.scenario)?
        .into_guide(&config.scenario, DispatchConfig::default())?
        .with_reward_config(config.reward);
    let outcome = batch(&guide);
    shutdown(&guide);
    outcome?;
    let reports: Vec<TouristReport> = guide
        .all_tourists()
        .iter()
        .map(|tourist| TouristReport::from(tourist.as_ref()))
        .collect();
    write_json(writer, &reports)
}

#[cfg(test)]
pub(crate) fn rewards_config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<BatchConfig, CliError> {
    let merged = RewardsArgs::merge_from_layers(layers).map_err(CliError::from)?;
    BatchConfig::resolve(merged.scenario, merged.reward_buffer, ENV_REWARDS_SCENARIO)
}
