//! Focused unit tests covering CLI configuration and scenario loading.

use super::helpers::{MUSEUM, PIER, ScenarioFile, sample_scenario, write_utf8};
use super::*;
use crate::batch::{BatchConfig, RewardsArgs, rewards_config_from_layers_for_test};
use crate::nearest::{NearestArgs, NearestConfig, config_from_layers_for_test};
use crate::scenario::{ScenarioTourist, load_scenario};
use camino::Utf8PathBuf;
use ortho_config::MergeComposer;
use rstest::rstest;
use serde_json::json;
use tempfile::TempDir;
use tourguide_core::{DEFAULT_REWARD_BUFFER_MILES, TouristId, TripPreferences};
use tourguide_dispatch::DispatchConfig;

fn scenario_path() -> Utf8PathBuf {
    Utf8PathBuf::from("scenario.json")
}

#[rstest]
fn nearest_without_scenario_errors() {
    let args = NearestArgs {
        user: Some("ada".to_owned()),
        ..NearestArgs::default()
    };

    let err = NearestConfig::try_from(args).expect_err("missing scenario should error");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_SCENARIO);
            assert_eq!(env, ENV_NEAREST_SCENARIO);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn nearest_without_user_errors() {
    let args = NearestArgs {
        scenario: Some(scenario_path()),
        ..NearestArgs::default()
    };

    let err = NearestConfig::try_from(args).expect_err("missing user should error");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_USER);
            assert_eq!(env, ENV_NEAREST_USER);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn nearest_limit_defaults_to_five() {
    let args = NearestArgs {
        scenario: Some(scenario_path()),
        user: Some("ada".to_owned()),
        limit: None,
    };

    let config = NearestConfig::try_from(args).expect("config should build");
    assert_eq!(config.limit, 5);
}

#[rstest]
fn nearest_layers_honour_precedence() {
    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({ "scenario": "from-file.json", "user": "from-file", "limit": 9 }),
        None,
    );
    composer.push_environment(json!({ "user": "from-env" }));
    composer.push_cli(json!({ "limit": 2 }));

    let config = config_from_layers_for_test(composer.layers()).expect("merged config");
    assert_eq!(config.scenario, Utf8PathBuf::from("from-file.json"));
    assert_eq!(config.user, "from-env");
    assert_eq!(config.limit, 2);
}

#[rstest]
fn invalid_layer_maps_to_configuration_error() {
    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "limit": "many" }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn rewards_layers_apply_reward_buffer() {
    let mut composer = MergeComposer::new();
    composer.push_environment(json!({ "scenario": "env.json", "reward_buffer": 25.0 }));

    let config = rewards_config_from_layers_for_test(composer.layers()).expect("merged config");
    assert_eq!(config.scenario, Utf8PathBuf::from("env.json"));
    assert!((config.reward.reward_buffer_miles() - 25.0).abs() < f64::EPSILON);
}

#[rstest]
fn rewards_default_to_the_standard_buffer() {
    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "scenario": "cli.json" }));

    let config: BatchConfig =
        rewards_config_from_layers_for_test(composer.layers()).expect("merged config");
    assert!(
        (config.reward.reward_buffer_miles() - DEFAULT_REWARD_BUFFER_MILES).abs() < f64::EPSILON
    );
}

#[rstest]
#[case(-1.0)]
#[case(-0.5)]
fn rewards_reject_invalid_buffers(#[case] miles: f64) {
    let args = RewardsArgs {
        scenario: Some(scenario_path()),
        reward_buffer: Some(miles),
    };
    let mut sink = Vec::new();

    let err = batch::run_rewards_with(args, &mut sink).expect_err("invalid buffer");
    match err {
        CliError::RewardBuffer(_) => {}
        other => panic!("expected RewardBuffer, found {other:?}"),
    }
    assert!(sink.is_empty());
}

#[rstest]
fn require_existing_reports_missing_and_non_file_paths() {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 workspace");

    match require_existing(&root.join("absent.json"), ARG_SCENARIO) {
        Err(CliError::MissingSourceFile { field, .. }) => assert_eq!(field, ARG_SCENARIO),
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
    match require_existing(&root, ARG_SCENARIO) {
        Err(CliError::SourcePathNotFile { .. }) => {}
        other => panic!("expected SourcePathNotFile, found {other:?}"),
    }
}

#[rstest]
fn load_scenario_reports_parse_errors() {
    let file = ScenarioFile::new();
    write_utf8(file.path(), b"{ not valid json");

    match load_scenario(file.path()) {
        Err(CliError::ParseScenario { path, .. }) => assert_eq!(path, file.path()),
        other => panic!("expected ParseScenario, found {other:?}"),
    }
}

#[rstest]
fn load_scenario_reports_open_errors() {
    let file = ScenarioFile::new();

    match load_scenario(file.path()) {
        Err(CliError::OpenScenario { path, .. }) => assert_eq!(path, file.path()),
        other => panic!("expected OpenScenario, found {other:?}"),
    }
}

#[rstest]
fn scenario_survives_a_json_round_trip() {
    let file = ScenarioFile::new();
    let scenario = sample_scenario();
    file.write(&scenario);

    let loaded = load_scenario(file.path()).expect("scenario loads");
    assert_eq!(loaded, scenario);
}

#[rstest]
fn duplicate_user_names_are_rejected() {
    let mut scenario = sample_scenario();
    scenario.tourists.push(ScenarioTourist {
        id: TouristId(9),
        user_name: "ada".to_owned(),
        phone_number: String::new(),
        email: String::new(),
        preferences: TripPreferences::default(),
        history: Vec::new(),
        next_locations: Vec::new(),
    });

    match scenario.into_guide(&scenario_path(), DispatchConfig::default()) {
        Err(CliError::DuplicateTourist { user_name, .. }) => assert_eq!(user_name, "ada"),
        other => panic!("expected DuplicateTourist, found {other:?}"),
    }
}

#[rstest]
fn scenario_points_table_applies_overrides() {
    let guide = sample_scenario()
        .into_guide(&scenario_path(), DispatchConfig::default())
        .expect("guide builds");
    guide.attribute_all().expect("attribution succeeds");

    let ada: Vec<_> = guide
        .rewards("ada")
        .expect("ada registered")
        .iter()
        .map(|record| (record.attraction.id, record.points))
        .collect();
    assert_eq!(ada, vec![(MUSEUM, 100), (PIER, 10)]);
    assert!(guide.shutdown(SHUTDOWN_GRACE).is_graceful());
}

#[rstest]
fn scenario_contact_details_reach_the_tourist() {
    let guide = sample_scenario()
        .into_guide(&scenario_path(), DispatchConfig::default())
        .expect("guide builds");

    let ada = guide.tourist("ada").expect("ada registered");
    assert_eq!(ada.phone_number(), "000");
    assert_eq!(ada.email(), "ada@tourguide.test");
    assert_eq!(ada.preferences().number_of_adults, 2);
    assert_eq!(ada.preferences().trip_duration_days, 3);

    let grace = guide.tourist("grace").expect("grace registered");
    assert!(grace.email().is_empty());
    assert_eq!(grace.preferences(), TripPreferences::default());
    assert!(guide.shutdown(SHUTDOWN_GRACE).is_graceful());
}

#[rstest]
fn tourist_entries_default_missing_contact_fields() {
    let entry: ScenarioTourist = serde_json::from_value(json!({
        "id": 4,
        "user_name": "lin",
    }))
    .expect("minimal tourist decodes");

    assert!(entry.phone_number.is_empty());
    assert_eq!(entry.preferences, TripPreferences::default());
}

#[rstest]
fn exhausted_location_script_fails_the_poll() {
    let guide = sample_scenario()
        .into_guide(&scenario_path(), DispatchConfig::default())
        .expect("guide builds");
    guide.track_location("grace").expect("first poll is scripted");

    let err = guide
        .track_location("grace")
        .expect_err("second poll has no script");
    assert!(matches!(
        err,
        tourguide_dispatch::ServiceError::Task(tourguide_dispatch::TaskError::Location { .. })
    ));
    assert!(guide.shutdown(SHUTDOWN_GRACE).is_graceful());
}
