//! Loading simulator configurations and scenarios from disk.

use std::io::Write;
use std::path::Path;

use hubmotion_common::config::{ConfigError, ConfigLoader};
use hubmotion_sim::{Action, Scenario, ScenarioRunner, SimConfig, SimError};
use tempfile::NamedTempFile;

use super::support::ARM;

fn write_temp(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn demo_config_is_valid() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/arm.toml");
    let config = SimConfig::load(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.axes.len(), 2);
    assert!(!config.scenario.steps.is_empty());
    assert!(ScenarioRunner::from_config(&config).is_ok());
}

#[test]
fn demo_scenario_file_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/stall.toml");
    let scenario = Scenario::load(&path).unwrap();
    assert_eq!(scenario.steps.len(), 3);
    assert_eq!(scenario.steps[1].action, Action::ResetAngle { angle: 0 });
}

#[test]
fn missing_file_reported() {
    let result = SimConfig::load(Path::new("/nonexistent/sim.toml"));
    assert!(matches!(result, Err(ConfigError::FileNotFound)));
}

#[test]
fn malformed_file_reported() {
    let file = write_temp("[shared\nservice_name = ");
    assert!(matches!(
        SimConfig::load(file.path()),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn config_round_trips_through_disk() {
    let file = write_temp(ARM);
    let config = SimConfig::load(file.path()).unwrap();
    assert_eq!(config.shared.service_name, "test");
    assert_eq!(config.sim.battery_mv, 8000);
    assert_eq!(config.axes[0].name, "arm");
}

#[test]
fn invalid_override_fails_runner_construction() {
    let file = write_temp(&format!("{ARM}\n[axes.overrides]\npid_kp = -1\n"));
    let config = SimConfig::load(file.path()).unwrap();
    assert!(matches!(
        ScenarioRunner::from_config(&config),
        Err(SimError::Config(ConfigError::ValidationError(_)))
    ));
}

#[test]
fn separate_scenario_replaces_inline_one() {
    let config_file = write_temp(&format!(
        "{ARM}\n[[scenario.steps]]\nat_ms = 0\naxis = \"arm\"\naction = {{ command = \"run\", speed = 100 }}\n"
    ));
    let scenario_file = write_temp(
        "[[steps]]\nat_ms = 10\naxis = \"arm\"\naction = { command = \"track_target\", target = 30 }\n",
    );

    let mut config = SimConfig::load(config_file.path()).unwrap();
    config.scenario = Scenario::load(scenario_file.path()).unwrap();
    assert_eq!(config.scenario.steps.len(), 1);
    assert_eq!(config.scenario.steps[0].action, Action::TrackTarget { target: 30 });
    assert!(config.validate().is_ok());
}
