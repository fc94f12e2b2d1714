//! Servo commands issued through a `MotionSystem`.

use hubmotion_common::error::MotionError;
use hubmotion_common::motor::{Direction, MotorKind};
use hubmotion_control::control::controller::AfterStop;
use hubmotion_control::servo::ServoState;
use hubmotion_control::system::{AxisId, AxisStatus, MotionSystem};

use super::support::TestHub;

fn system_with_arm(hub: TestHub) -> (MotionSystem<TestHub>, AxisId) {
    let mut system = MotionSystem::new(hub);
    let arm = system
        .add_axis("arm", 0, MotorKind::TechnicMAngular, Direction::Clockwise, None)
        .unwrap();
    // Feedback from the (static) encoder instead of the observer.
    let mut settings = system.settings(arm).unwrap();
    settings.use_estimated_rate = false;
    system.set_settings(arm, settings).unwrap();
    (system, arm)
}

fn run_periods(system: &mut MotionSystem<TestHub>, periods: usize) {
    for _ in 0..periods {
        system.hub_mut().advance();
        system.tick().unwrap();
    }
}

#[test]
fn run_angle_is_relative_to_live_reference() {
    let (mut system, arm) = system_with_arm(TestHub::new());
    system.run_target(arm, 500_000, 90_000, AfterStop::Hold, true).unwrap();

    system.hub_mut().ticks = 200;
    system.run_angle(arm, 500_000, 90_000, AfterStop::Hold, true).unwrap();

    let snap = system.trajectory_snapshot(arm).unwrap().unwrap();
    // The encoder never moved, but the reference had.
    assert!(snap.th0 > 0);
    assert_eq!(snap.th3, snap.th0 + 90_000);
    assert_eq!(system.servo_state(arm).unwrap(), ServoState::RunAngle { foreground: true });
}

#[test]
fn replacing_a_command_keeps_reference_speed() {
    let (mut system, arm) = system_with_arm(TestHub::new());
    system.run(arm, 500_000).unwrap();
    let first = system.trajectory_snapshot(arm).unwrap().unwrap();

    system.hub_mut().ticks = 300;
    system.run(arm, -500_000).unwrap();
    let second = system.trajectory_snapshot(arm).unwrap().unwrap();

    assert_eq!(second.t0, 300);
    assert_eq!(second.w0 as i64, first.a0 as i64 * 300 / 10_000);
    assert!(second.a0 < 0);
}

#[test]
fn run_until_stalled_coasts_against_blocked_shaft() {
    let (mut system, arm) = system_with_arm(TestHub::new());
    system.run_until_stalled(arm, 300_000, AfterStop::Coast).unwrap();
    assert!(!system.is_done(arm).unwrap());

    for _ in 0..400 {
        system.hub_mut().advance();
        system.tick().unwrap();
        if system.is_done(arm).unwrap() {
            break;
        }
    }

    assert!(system.is_done(arm).unwrap());
    assert_eq!(system.servo_state(arm).unwrap(), ServoState::Coasting);
    assert_eq!(system.hub().duties[0], None);
}

#[test]
fn time_command_with_hold_tracks_afterwards() {
    let (mut system, arm) = system_with_arm(TestHub::new());
    system.run_time(arm, 200_000, 50, AfterStop::Hold, true).unwrap();
    system.hub_mut().positions[0] = 4_000;
    run_periods(&mut system, 40);

    assert_eq!(system.servo_state(arm).unwrap(), ServoState::TrackTarget);
    let status = system.status(arm).unwrap();
    assert!(status.contains(AxisStatus::HOLDING | AxisStatus::DONE));
    // Holds where the shaft was when the command completed.
    assert_eq!(system.trajectory_snapshot(arm).unwrap().unwrap().th0, 4_000);
}

#[test]
fn encoder_fault_is_isolated_to_its_axis() {
    let (mut system, arm) = system_with_arm(TestHub::new());
    let wrist = system
        .add_axis("wrist", 2, MotorKind::TechnicSAngular, Direction::Counterclockwise, None)
        .unwrap();
    system.run(arm, 300_000).unwrap();
    system.run(wrist, 300_000).unwrap();
    // Counterclockwise axis drives negative duty for a forward command.
    assert!(system.hub().duties[2].is_some_and(|d| d < 0));

    system.hub_mut().faulty[0] = true;
    system.hub_mut().advance();
    let err = system.tick().unwrap_err();
    assert!(matches!(err, MotionError::NoDevice(_)));

    assert_eq!(system.servo_state(arm).unwrap(), ServoState::Errored);
    assert_eq!(system.hub().duties[0], None);
    assert_eq!(
        system.servo_state(wrist).unwrap(),
        ServoState::RunTime { foreground: false }
    );

    // Errored axes stay quiet until a new command succeeds.
    system.hub_mut().advance();
    system.tick().unwrap();
    system.hub_mut().faulty[0] = false;
    system.run_target(arm, 300_000, 45_000, AfterStop::Brake, false).unwrap();
    assert_eq!(system.servo_state(arm).unwrap(), ServoState::RunAngle { foreground: false });
}

#[test]
fn invalid_commands_leave_axis_untouched() {
    let (mut system, arm) = system_with_arm(TestHub::new());
    system.track_target(arm, 10_000).unwrap();
    let before = system.trajectory_snapshot(arm).unwrap();

    assert!(matches!(
        system.run_time(arm, 300_000, -1, AfterStop::Coast, true),
        Err(MotionError::InvalidArgument(_))
    ));
    assert!(matches!(
        system.run_target(arm, 0, 90_000, AfterStop::Coast, true),
        Err(MotionError::InvalidArgument(_))
    ));
    assert_eq!(system.servo_state(arm).unwrap(), ServoState::TrackTarget);
    assert_eq!(system.trajectory_snapshot(arm).unwrap(), before);
}

#[test]
fn run_time_longer_than_half_an_hour_is_rejected() {
    let (mut system, arm) = system_with_arm(TestHub::new());
    system.track_target(arm, 0).unwrap();
    let before = system.trajectory_snapshot(arm).unwrap();

    // 429_496_730 ms would wrap to 4 ticks.
    for duration_ms in [30 * 60 * 1000 + 1, 429_496_730, i32::MAX] {
        assert!(
            matches!(
                system.run_time(arm, 300_000, duration_ms, AfterStop::Coast, true),
                Err(MotionError::InvalidArgument(_))
            ),
            "duration {duration_ms}"
        );
    }
    assert_eq!(system.servo_state(arm).unwrap(), ServoState::TrackTarget);
    assert_eq!(system.trajectory_snapshot(arm).unwrap(), before);

    system.run_time(arm, 300_000, 30 * 60 * 1000, AfterStop::Coast, true).unwrap();
    let snap = system.trajectory_snapshot(arm).unwrap().unwrap();
    assert_eq!(snap.t3, 18_000_000);
}

#[test]
fn extreme_angle_commands_are_rejected() {
    let (mut system, arm) = system_with_arm(TestHub::new());
    system.track_target(arm, 0).unwrap();
    let before = system.trajectory_snapshot(arm).unwrap();

    for (speed, angle) in [
        (300_000, i64::MAX),
        (300_000, i64::MIN),
        (-300_000, i64::MIN),
        (300_000, 100_000_000_000_000_000),
    ] {
        assert!(
            matches!(
                system.run_angle(arm, speed, angle, AfterStop::Hold, true),
                Err(MotionError::InvalidArgument(_))
            ),
            "speed {speed}, angle {angle}"
        );
    }
    assert!(matches!(
        system.run_target(arm, 300_000, i64::MAX, AfterStop::Hold, true),
        Err(MotionError::InvalidArgument(_))
    ));
    assert_eq!(system.trajectory_snapshot(arm).unwrap(), before);

    // Lowest speed reverses and is capped by the speed limit.
    system.run_angle(arm, i32::MIN, 90_000, AfterStop::Hold, true).unwrap();
    let snap = system.trajectory_snapshot(arm).unwrap().unwrap();
    assert_eq!(snap.th3, -90_000);
}

#[test]
fn stall_time_setting_is_bounded() {
    let (mut system, arm) = system_with_arm(TestHub::new());
    let mut settings = system.settings(arm).unwrap();
    assert!(settings.set_stall_tolerances(5, 429_496_730).is_err());

    settings.stall_time = u32::MAX;
    assert!(matches!(
        system.set_settings(arm, settings),
        Err(MotionError::InvalidArgument(_))
    ));
}

#[test]
fn commands_work_across_tick_wrap() {
    let (mut system, arm) = system_with_arm(TestHub::starting_at(u32::MAX - 1_000));
    system.run_time(arm, 300_000, 200, AfterStop::Brake, false).unwrap();
    run_periods(&mut system, 80);

    assert!(system.is_done(arm).unwrap());
    assert_eq!(system.servo_state(arm).unwrap(), ServoState::Braking);
    assert_eq!(system.hub().duties[0], Some(0));
}
