//! Servo behavior on the simulated plant.

use hubmotion_common::error::MotionError;
use hubmotion_common::hal::driver::Clock;
use hubmotion_control::{AfterStop, ServoState};
use hubmotion_sim::hub::Output;

use super::support::{ARM, run_for, run_until, runner};

#[test]
fn run_target_settles_and_holds() {
    let mut r = runner(ARM);
    let arm = r.system().find("arm").unwrap();
    r.system_mut()
        .run_target(arm, 500_000, 90_000, AfterStop::Hold, true)
        .unwrap();
    assert!(!r.system().is_done(arm).unwrap());

    let used = run_until(&mut r, 800, |r| r.system().is_done(arm).unwrap());
    assert!(used.is_some(), "target not reached in 4 s");

    let sys = r.system();
    assert_eq!(sys.servo_state(arm).unwrap(), ServoState::TrackTarget);
    assert!((sys.angle(arm).unwrap() - 90_000).abs() <= 10_000);

    // Still holding a second later.
    run_for(&mut r, 200);
    let angle = r.system().angle(arm).unwrap();
    assert!((angle - 90_000).abs() <= 10_000, "drifted to {angle}");
}

#[test]
fn run_until_stalled_finds_the_end_stop() {
    let mut r = runner(&format!("{ARM}\n[[sim.plants]]\nport = 0\nupper_stop_deg = 45\n"));
    let arm = r.system().find("arm").unwrap();
    r.system_mut()
        .run_until_stalled(arm, 300_000, AfterStop::Coast)
        .unwrap();

    let used = run_until(&mut r, 1000, |r| r.system().is_done(arm).unwrap());
    assert!(used.is_some(), "stall not detected");

    let sys = r.system();
    assert_eq!(sys.servo_state(arm).unwrap(), ServoState::Coasting);
    let angle = sys.angle(arm).unwrap();
    assert!((40_000..=45_000).contains(&angle), "angle = {angle}");
    assert_eq!(sys.hub().output(0), Some(Output::Coast));
}

#[test]
fn track_target_resists_a_load() {
    let mut r = runner(&format!("{ARM}\n[[sim.plants]]\nport = 0\nload_mnm = 30\n"));
    let arm = r.system().find("arm").unwrap();
    r.system_mut().track_target(arm, 0).unwrap();

    run_for(&mut r, 400);
    let angle = r.system().angle(arm).unwrap();
    assert!(angle.abs() <= 10_000, "pushed to {angle}");
    assert!(r.system().telemetry(arm).unwrap().voltage_mv < 0);
}

#[test]
fn run_reverses_without_stopping_first() {
    let mut r = runner(ARM);
    let arm = r.system().find("arm").unwrap();
    r.system_mut().run(arm, 500_000).unwrap();
    run_for(&mut r, 200);
    assert!(r.system().speed(arm).unwrap() > 300_000);

    r.system_mut().run(arm, -500_000).unwrap();
    run_for(&mut r, 200);
    let speed = r.system().speed(arm).unwrap();
    assert!(speed < -300_000, "speed = {speed}");
}

#[test]
fn unplugged_motor_errors_and_recovers() {
    let mut r = runner(ARM);
    let arm = r.system().find("arm").unwrap();
    r.system_mut().run(arm, 300_000).unwrap();
    run_for(&mut r, 50);

    r.system_mut().hub_mut().disconnect(0).unwrap();
    run_for(&mut r, 10);
    assert_eq!(r.system().servo_state(arm).unwrap(), ServoState::Errored);
    assert!(r.stats().tick_errors >= 1);
    assert_eq!(r.system().hub().output(0), Some(Output::Coast));

    // Commands fail while unplugged and leave the axis errored.
    assert!(matches!(
        r.system_mut().run(arm, 300_000),
        Err(MotionError::NoDevice(_))
    ));

    r.system_mut().hub_mut().reconnect(0).unwrap();
    r.system_mut().run(arm, 300_000).unwrap();
    assert_eq!(
        r.system().servo_state(arm).unwrap(),
        ServoState::RunTime { foreground: false }
    );
    run_for(&mut r, 200);
    assert!(r.system().speed(arm).unwrap() > 0);
}

#[test]
fn motion_across_the_tick_wrap() {
    let mut r = runner(&ARM.replace("battery_mv = 8000", "battery_mv = 8000\nstart_ticks = 4294965000"));
    let arm = r.system().find("arm").unwrap();
    r.system_mut()
        .run_target(arm, 500_000, 180_000, AfterStop::Brake, false)
        .unwrap();

    let used = run_until(&mut r, 1000, |r| r.system().is_done(arm).unwrap());
    assert!(used.is_some());
    assert!(r.system().hub().now_ticks() < 100_000, "clock did not wrap");
    assert_eq!(r.system().servo_state(arm).unwrap(), ServoState::Braking);
    assert!((r.system().angle(arm).unwrap() - 180_000).abs() <= 10_000);
}

#[test]
fn dc_axis_is_open_loop_only() {
    let mut r = runner(&format!(
        "{ARM}\n[[axes]]\nname = \"train\"\nport = 1\nmotor = \"dc_only\"\nmax_voltage_mv = 6000\n"
    ));
    let train = r.system().find("train").unwrap();

    r.system_mut().set_voltage(train, 4000).unwrap();
    assert_eq!(r.system().hub().output(1), Some(Output::Duty(5000)));

    r.system_mut().set_voltage(train, 7000).unwrap();
    assert_eq!(r.system().hub().voltage(1), Some(6000));

    assert!(matches!(
        r.system_mut().run(train, 100_000),
        Err(MotionError::NotSupported(_))
    ));
    r.system_mut().stop(train, AfterStop::Brake).unwrap();
    assert_eq!(r.system().hub().output(1), Some(Output::Duty(0)));
}
