//! Property tests for the trajectory planner.
//!
//! Sign consistency of sampled references for time and angle profiles, and
//! reachability of the cruise speed for unbounded commands.

use hubmotion_control::trajectory::{MotionCommand, Trajectory, TrajectoryReference};
use proptest::prelude::*;

/// Sampling interval: one control period.
const STEP: u32 = 50;

/// Start time just before the tick counter wraps.
const T0: u32 = u32::MAX - 100_000;

/// Speeds above this produce clearly signed position steps per sample.
const SPEED_MIN_FOR_SIGN: i32 = 10_000;

fn angle_command(
    distance: i64,
    speed: i32,
    acceleration: i32,
    deceleration: i32,
    speed_start: i32,
    continue_running: bool,
) -> MotionCommand {
    MotionCommand {
        time_start: T0,
        position_start: 1_000_000,
        position_end: Some(1_000_000 + distance),
        speed_start,
        speed_target: speed,
        speed_max: 1_000_000,
        acceleration,
        deceleration,
        duration: None,
        continue_running,
    }
}

fn time_command(
    duration: u32,
    speed: i32,
    acceleration: i32,
    deceleration: i32,
    speed_start: i32,
    continue_running: bool,
) -> MotionCommand {
    MotionCommand {
        time_start: T0,
        position_start: -500_000,
        position_end: None,
        speed_start,
        speed_target: speed,
        speed_max: 1_000_000,
        acceleration,
        deceleration,
        duration: Some(duration),
        continue_running,
    }
}

fn sample(trajectory: &mut Trajectory) -> Vec<TrajectoryReference> {
    let end = trajectory.t3() as u32 + 4 * STEP;
    (0..=end / STEP)
        .map(|k| trajectory.get_reference(T0.wrapping_add(k * STEP)))
        .collect()
}

/// Between adjacent samples that keep the sign of speed and acceleration,
/// position moves with the speed and speed moves with the acceleration.
fn check_signs(samples: &[TrajectoryReference]) -> Result<(), TestCaseError> {
    for pair in samples.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.speed.signum() != b.speed.signum()
            || a.acceleration.signum() != b.acceleration.signum()
        {
            continue;
        }

        if a.speed.abs() >= SPEED_MIN_FOR_SIGN && b.speed.abs() >= SPEED_MIN_FOR_SIGN {
            prop_assert_eq!(
                (b.position - a.position).signum(),
                a.speed.signum() as i64,
                "from {:?} to {:?}",
                a,
                b
            );
        }

        let dw = b.speed - a.speed;
        if a.acceleration == 0 {
            prop_assert_eq!(dw, 0);
        } else {
            prop_assert!(dw * a.acceleration.signum() >= 0, "dw = {} at {:?}", dw, a);
        }
    }
    Ok(())
}

fn distance_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![-3_600_000i64..=-1_000, 1_000i64..=3_600_000]
}

fn signed_speed_strategy() -> impl Strategy<Value = i32> {
    prop_oneof![-1_500_000i32..=-50_000, 50_000i32..=1_500_000]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn angle_profile_signs_consistent(
        distance in distance_strategy(),
        speed in 50_000i32..=1_500_000,
        acceleration in 500_000i32..=5_000_000,
        deceleration in 500_000i32..=5_000_000,
    ) {
        let cmd = angle_command(distance, speed, acceleration, deceleration, 0, false);
        let mut trajectory = Trajectory::new_angle_command(&cmd).unwrap();
        let samples = sample(&mut trajectory);
        check_signs(&samples)?;

        let last = samples[samples.len() - 1];
        prop_assert_eq!(last.position, 1_000_000 + distance);
        prop_assert_eq!(last.speed, 0);
    }

    /// Angle profiles entered while already moving, either way, that stop
    /// at or run through the target.
    #[test]
    fn moving_start_angle_profile_signs_consistent(
        distance in distance_strategy(),
        speed in 50_000i32..=1_500_000,
        speed_start in -1_500_000i32..=1_500_000,
        acceleration in 500_000i32..=5_000_000,
        deceleration in 500_000i32..=5_000_000,
        continue_running in any::<bool>(),
    ) {
        let cmd = angle_command(distance, speed, acceleration, deceleration, speed_start, continue_running);
        let mut trajectory = Trajectory::new_angle_command(&cmd).unwrap();
        let samples = sample(&mut trajectory);
        check_signs(&samples)?;

        let last = samples[samples.len() - 1];
        prop_assert_eq!(last.acceleration, 0);
        if continue_running {
            prop_assert_eq!(last.speed.signum() as i64, distance.signum());
            prop_assert!((last.position - 1_000_000 - distance) * distance.signum() > 0);
        } else {
            prop_assert_eq!(last.position, 1_000_000 + distance);
            prop_assert_eq!(last.speed, 0);
        }
    }

    /// Time profiles: trapezoids, triangles, starts that slow down or
    /// reverse, and profiles that keep running at the end.
    #[test]
    fn time_profile_signs_consistent(
        duration in 100u32..=60_000,
        speed in signed_speed_strategy(),
        speed_start in -1_500_000i32..=1_500_000,
        acceleration in 500_000i32..=5_000_000,
        deceleration in 500_000i32..=5_000_000,
        continue_running in any::<bool>(),
    ) {
        let cmd = time_command(duration, speed, acceleration, deceleration, speed_start, continue_running);
        let mut trajectory = Trajectory::new_time_command(&cmd).unwrap();
        prop_assert!(!trajectory.is_forever());
        prop_assert_eq!(trajectory.t3() as u32, duration);

        let samples = sample(&mut trajectory);
        check_signs(&samples)?;

        let last = samples[samples.len() - 1];
        prop_assert_eq!(last.acceleration, 0);
        if !continue_running {
            prop_assert_eq!(last.speed, 0);
        }
    }

    /// An unbounded command holds the capped target speed from `t1` on.
    #[test]
    fn forever_reaches_capped_target(
        speed_target in -2_000_000i32..=2_000_000,
        speed_start in -1_000_000i32..=1_000_000,
        speed_max in 100_000i32..=1_500_000,
        acceleration in 1_000i32..=20_000_000,
    ) {
        let cmd = MotionCommand {
            time_start: T0,
            position_start: 0,
            position_end: None,
            speed_start,
            speed_target,
            speed_max,
            acceleration,
            deceleration: acceleration,
            duration: None,
            continue_running: true,
        };
        let mut trajectory = Trajectory::new_time_command(&cmd).unwrap();
        prop_assert!(trajectory.is_forever());

        let w_max = speed_max / 100;
        let expected = (speed_target / 100).clamp(-w_max, w_max) * 100;
        let t1 = trajectory.t1() as u32;

        for dt in [t1, t1 + 1, t1 + 10_000, t1 + 1_000_000, t1 + 100_000_000] {
            let r = trajectory.get_reference(T0.wrapping_add(dt));
            prop_assert_eq!(r.speed, expected);
            prop_assert_eq!(r.acceleration, 0);
        }
    }

    /// Walking a settled unbounded profile across the wrap keeps its speed.
    #[test]
    fn forever_survives_wraparound(speed_target in -1_000_000i32..=1_000_000) {
        let cmd = MotionCommand {
            time_start: 0,
            position_start: 0,
            position_end: None,
            speed_start: speed_target,
            speed_target,
            speed_max: 1_000_000,
            acceleration: 2_000_000,
            deceleration: 2_000_000,
            duration: None,
            continue_running: true,
        };
        let mut trajectory = Trajectory::new_time_command(&cmd).unwrap();
        let expected = trajectory.get_reference(0).speed;

        let mut time = 0u32;
        for _ in 0..40 {
            time = time.wrapping_add(1 << 28);
            let r = trajectory.get_reference(time);
            prop_assert_eq!(r.speed, expected);
        }
        prop_assert_eq!(trajectory.t1(), 0);
        prop_assert_eq!(trajectory.t2(), 0);
        prop_assert_eq!(trajectory.t3(), 0);
    }
}
