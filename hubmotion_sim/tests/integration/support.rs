//! Shared fixtures: configurations and run helpers.

use hubmotion_sim::{ScenarioRunner, SimConfig};

/// One Technic M angular arm on port 0, 1° encoder, no scenario.
pub const ARM: &str = r#"
[shared]
service_name = "test"

[sim]
battery_mv = 8000

[[axes]]
name = "arm"
port = 0
motor = "technic_m_angular"
"#;

pub fn config(text: &str) -> SimConfig {
    toml::from_str(text).expect("test config parses")
}

pub fn runner(text: &str) -> ScenarioRunner {
    ScenarioRunner::from_config(&config(text)).expect("runner builds")
}

/// Step until `done` holds, at most `max` periods. Returns the periods
/// used, or `None` on timeout.
pub fn run_until<F>(runner: &mut ScenarioRunner, max: u64, mut done: F) -> Option<u64>
where
    F: FnMut(&ScenarioRunner) -> bool,
{
    for i in 0..max {
        runner.step();
        if done(runner) {
            return Some(i + 1);
        }
    }
    None
}

pub fn run_for(runner: &mut ScenarioRunner, periods: u64) {
    for _ in 0..periods {
        runner.step();
    }
}
