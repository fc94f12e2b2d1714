//! Regression values for the trajectory planner through the public API.

use hubmotion_common::error::MotionError;
use hubmotion_control::trajectory::{MotionCommand, Trajectory};

const DEG: i32 = 1000;

fn oracle_command(time_start: u32, position_start: i64, distance: i64) -> MotionCommand {
    MotionCommand {
        time_start,
        position_start,
        position_end: Some(position_start + distance),
        speed_start: 0,
        speed_target: 1000 * DEG,
        speed_max: 1000 * DEG,
        acceleration: 2000 * DEG,
        deceleration: 2000 * DEG,
        duration: None,
        continue_running: false,
    }
}

#[test]
fn oracle_is_independent_of_start_time_and_position() {
    // 27 rotations + 280 deg.
    let distance = 10_000_000;
    for (t0, th0) in [(0, 0), (u32::MAX - 50_000, -123_456), (1 << 31, 7_200_000)] {
        let trj = Trajectory::new_angle_command(&oracle_command(t0, th0, distance)).unwrap();
        assert_eq!(trj.t0(), t0);
        assert_eq!(trj.th0(), th0);
        assert_eq!((trj.t1(), trj.t2(), trj.t3()), (5_000, 100_000, 105_000));
        assert_eq!((trj.th1(), trj.th2(), trj.th3()), (250_000, 9_750_000, 10_000_000));
        assert_eq!(trj.w1_mdeg_per_tick(), 100);
        assert_eq!((trj.a0(), trj.a2()), (2000, -2000));
    }
}

#[test]
fn oracle_backward_is_mirrored() {
    let fwd = Trajectory::new_angle_command(&oracle_command(0, 0, 10_000_000)).unwrap();
    let bwd = Trajectory::new_angle_command(&oracle_command(0, 0, -10_000_000)).unwrap();
    assert_eq!((bwd.t1(), bwd.t2(), bwd.t3()), (fwd.t1(), fwd.t2(), fwd.t3()));
    assert_eq!(bwd.th3(), -fwd.th3());
    assert_eq!(bwd.w1(), -fwd.w1());
    assert_eq!(bwd.a0(), -2000);
    assert_eq!(bwd.a2(), 2000);
}

#[test]
fn oracle_reference_across_wrap() {
    let t0 = u32::MAX - 50_000;
    let mut trj = Trajectory::new_angle_command(&oracle_command(t0, 0, 10_000_000)).unwrap();
    let cruise = trj.get_reference(t0.wrapping_add(60_000));
    assert_eq!(cruise.speed, 1000 * DEG);
    assert_eq!(cruise.position, 250_000 + 55_000 * 100);
    let end = trj.get_reference(t0.wrapping_add(105_000));
    assert_eq!(end.position, 10_000_000);
    assert!(trj.is_finished(t0.wrapping_add(105_000)));
}

#[test]
fn zero_distance_yields_stationary_profile() {
    let trj = Trajectory::new_angle_command(&oracle_command(777, 45_000, 0)).unwrap();
    assert_eq!(trj, Trajectory::stationary(777, 45_000));
    assert_eq!(trj.duration(), Some(0));
}

#[test]
fn invalid_commands_rejected_before_synthesis() {
    let mut cmd = oracle_command(0, 0, 90_000);
    cmd.speed_target = 0;
    assert!(matches!(Trajectory::new_angle_command(&cmd), Err(MotionError::InvalidArgument(_))));

    let mut cmd = oracle_command(0, 0, 90_000);
    cmd.acceleration = 999;
    assert!(matches!(Trajectory::new_angle_command(&cmd), Err(MotionError::InvalidArgument(_))));

    let mut cmd = oracle_command(0, 0, 0);
    cmd.position_end = None;
    cmd.duration = Some(u32::MAX);
    assert!(matches!(Trajectory::new_time_command(&cmd), Err(MotionError::InvalidArgument(_))));
}

#[test]
fn snapshot_reports_absolute_positions() {
    let trj = Trajectory::new_angle_command(&oracle_command(0, 1_000, 10_000_000)).unwrap();
    let json = serde_json::to_value(trj.snapshot()).unwrap();
    assert_eq!(json["th0"], 1_000);
    assert_eq!(json["th3"], 10_001_000);
    assert_eq!(json["w1"], 1_000_000);
    assert_eq!(json["forever"], false);
}
