//! Servo control tick benchmark.
//!
//! Measures one full control period (encoder read, observer update,
//! controller update, voltage write) for a single axis and for a fully
//! populated hub against an in-memory hub with a moving shaft.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use hubmotion_common::consts::{CONTROL_LOOP_TICKS, MAX_AXES};
use hubmotion_common::error::HalError;
use hubmotion_common::hal::driver::{BatteryModel, Clock, EncoderDriver, FixedBattery, MotorDriver};
use hubmotion_common::motor::{Direction, MotorKind};
use hubmotion_control::control::controller::AfterStop;
use hubmotion_control::servo::Servo;
use hubmotion_control::system::MotionSystem;

/// Hub whose shafts advance a fixed step per tick.
#[derive(Debug)]
struct BenchHub {
    positions: [i64; MAX_AXES],
    battery: FixedBattery,
    ticks: u32,
}

impl BenchHub {
    fn new() -> Self {
        Self {
            positions: [0; MAX_AXES],
            battery: FixedBattery { voltage_mv: 8000 },
            ticks: 0,
        }
    }

    fn advance(&mut self) {
        self.ticks = self.ticks.wrapping_add(CONTROL_LOOP_TICKS);
        for p in &mut self.positions {
            *p += 1500;
        }
    }
}

impl EncoderDriver for BenchHub {
    fn position(&self, channel: u8) -> Result<i64, HalError> {
        self.positions
            .get(channel as usize)
            .copied()
            .ok_or(HalError::UnknownChannel(channel))
    }

    fn speed(&self, _channel: u8) -> Result<i32, HalError> {
        Ok(300_000)
    }
}

impl MotorDriver for BenchHub {
    fn coast(&mut self, _channel: u8) -> Result<(), HalError> {
        Ok(())
    }

    fn set_duty_cycle(&mut self, _channel: u8, _duty: i32) -> Result<(), HalError> {
        Ok(())
    }
}

impl BatteryModel for BenchHub {
    fn voltage_to_duty(&self, voltage_mv: i32) -> i32 {
        self.battery.voltage_to_duty(voltage_mv)
    }
}

impl Clock for BenchHub {
    fn now_ms(&self) -> u32 {
        self.ticks / 10
    }

    fn now_us(&self) -> u32 {
        self.ticks.wrapping_mul(100)
    }

    fn now_ticks(&self) -> u32 {
        self.ticks
    }
}

fn bench_servo_tick(c: &mut Criterion) {
    let mut hub = BenchHub::new();
    let Ok(mut servo) = Servo::new(0, MotorKind::TechnicMAngular, Direction::Clockwise) else {
        return;
    };
    if servo.run(&mut hub, 300_000).is_err() {
        return;
    }

    c.bench_function("servo_tick", |b| {
        b.iter(|| {
            hub.advance();
            servo.tick(&mut hub)
        })
    });
}

fn bench_servo_command(c: &mut Criterion) {
    let mut hub = BenchHub::new();
    let Ok(mut servo) = Servo::new(0, MotorKind::TechnicMAngular, Direction::Clockwise) else {
        return;
    };
    let mut target = 0i64;

    c.bench_function("servo_run_target", |b| {
        b.iter(|| {
            target = 90_000 - target;
            servo.run_target(&mut hub, 500_000, target, AfterStop::Hold, false)
        })
    });
}

fn bench_system_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("system_tick");

    for axes in [1usize, 3, MAX_AXES] {
        let mut system = MotionSystem::new(BenchHub::new());
        for ch in 0..axes {
            let name = format!("axis{ch}");
            let Ok(id) = system.add_axis(
                &name,
                ch as u8,
                MotorKind::TechnicLAngular,
                Direction::Clockwise,
                None,
            ) else {
                return;
            };
            if system.run(id, 300_000).is_err() {
                return;
            }
        }

        group.bench_with_input(BenchmarkId::new("axes", axes), &axes, |b, _| {
            b.iter(|| {
                system.hub_mut().advance();
                system.tick()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_servo_tick, bench_servo_command, bench_system_tick);
criterion_main!(benches);
