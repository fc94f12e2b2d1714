//! Scripted scenarios end to end.

use hubmotion_control::{AxisStatus, ServoState};
use hubmotion_sim::runner::RunStats;

use super::support::{ARM, run_until, runner};

#[test]
fn steps_fire_in_time_order() {
    // Listed out of order on purpose.
    let mut r = runner(&format!(
        r#"{ARM}
[[scenario.steps]]
at_ms = 500
axis = "arm"
action = {{ command = "stop", then = "brake" }}

[[scenario.steps]]
at_ms = 0
axis = "arm"
action = {{ command = "run", speed = 300 }}
"#
    ));
    let arm = r.system().find("arm").unwrap();

    r.step();
    assert_eq!(
        r.system().servo_state(arm).unwrap(),
        ServoState::RunTime { foreground: false }
    );

    for _ in 0..100 {
        r.step();
    }
    assert_eq!(r.system().servo_state(arm).unwrap(), ServoState::Braking);
    assert_eq!(
        r.stats(),
        RunStats {
            periods: 101,
            commands_applied: 2,
            commands_rejected: 0,
            tick_errors: 0,
        }
    );
}

#[test]
fn rejected_command_does_not_stop_the_run() {
    let mut r = runner(&format!(
        r#"{ARM}
[[scenario.steps]]
at_ms = 0
axis = "arm"
action = {{ command = "run_time", speed = 300, time_ms = -5 }}

[[scenario.steps]]
at_ms = 5
axis = "arm"
action = {{ command = "run_angle", speed = 400, angle = 60, then = "hold" }}
"#
    ));
    let arm = r.system().find("arm").unwrap();
    let used = run_until(&mut r, 800, |r| r.is_finished());
    assert!(used.is_some());

    let stats = r.stats();
    assert_eq!(stats.commands_rejected, 1);
    assert_eq!(stats.commands_applied, 1);
    let status = r.system().status(arm).unwrap();
    assert!(status.contains(AxisStatus::DONE | AxisStatus::HOLDING));
    assert!((r.system().angle(arm).unwrap() - 60_000).abs() <= 10_000);
}

#[test]
fn disconnect_step_errors_the_axis() {
    let mut r = runner(&format!(
        r#"{ARM}
[[scenario.steps]]
at_ms = 0
axis = "arm"
action = {{ command = "run", speed = 300 }}

[[scenario.steps]]
at_ms = 200
axis = "arm"
action = {{ command = "disconnect" }}
"#
    ));
    let arm = r.system().find("arm").unwrap();
    for _ in 0..60 {
        r.step();
    }
    let status = r.system().status(arm).unwrap();
    assert!(status.contains(AxisStatus::ERRORED));
    assert!(r.stats().tick_errors >= 1);
}

#[test]
fn telemetry_frames_are_json_lines() {
    let mut r = runner(&format!(
        r#"{ARM}
[[scenario.steps]]
at_ms = 0
axis = "arm"
action = {{ command = "run_target", speed = 500, target = 45 }}
"#
    ));

    let mut lines = Vec::new();
    r.run_for(100, 25, |frame| {
        lines.push(serde_json::to_string(frame).unwrap());
        Ok(())
    })
    .unwrap();

    assert_eq!(lines.len(), 4);
    let last: serde_json::Value = serde_json::from_str(&lines[3]).unwrap();
    assert_eq!(last["period"], 100);
    assert_eq!(last["time_ms"], 500);
    assert_eq!(last["axes"][0]["name"], "arm");
    assert!(last["axes"][0]["angle"].as_i64().unwrap() > 0);
}
