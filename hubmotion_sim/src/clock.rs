//! Host clock and real-time pacing.
//!
//! [`MonotonicClock`] exposes `CLOCK_MONOTONIC` through the [`Clock`] trait,
//! counted from the moment it was created. [`Pacer`] uses any [`Clock`] to
//! hold a loop to one control period per iteration.

use std::cell::Cell;
use std::time::Duration;

use hubmotion_common::consts::{CONTROL_LOOP_TICKS, US_PER_TICK, ticks_since};
use hubmotion_common::hal::driver::Clock;
use nix::sys::time::TimeSpec;
use nix::time::{ClockId, clock_gettime};
use tracing::warn;

fn timespec_ns(ts: &TimeSpec) -> u64 {
    ts.tv_sec() as u64 * 1_000_000_000 + ts.tv_nsec() as u64
}

/// `CLOCK_MONOTONIC` since construction.
#[derive(Debug)]
pub struct MonotonicClock {
    epoch_ns: u64,
    /// Last successful reading, returned if the clock ever fails.
    last_ns: Cell<u64>,
}

impl MonotonicClock {
    pub fn new() -> nix::Result<Self> {
        let now = clock_gettime(ClockId::CLOCK_MONOTONIC)?;
        Ok(Self {
            epoch_ns: timespec_ns(&now),
            last_ns: Cell::new(0),
        })
    }

    fn elapsed_ns(&self) -> u64 {
        match clock_gettime(ClockId::CLOCK_MONOTONIC) {
            Ok(ts) => {
                let ns = timespec_ns(&ts).saturating_sub(self.epoch_ns);
                self.last_ns.set(ns);
                ns
            }
            Err(e) => {
                warn!("clock_gettime: {e}");
                self.last_ns.get()
            }
        }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u32 {
        (self.elapsed_ns() / 1_000_000) as u32
    }

    fn now_us(&self) -> u32 {
        (self.elapsed_ns() / 1_000) as u32
    }

    fn now_ticks(&self) -> u32 {
        (self.elapsed_ns() / (US_PER_TICK as u64 * 1_000)) as u32
    }
}

/// Sleeps out the remainder of each control period.
#[derive(Debug)]
pub struct Pacer<C: Clock> {
    clock: C,
    next: u32,
    overruns: u64,
}

impl<C: Clock> Pacer<C> {
    pub fn new(clock: C) -> Self {
        let next = clock.now_ticks().wrapping_add(CONTROL_LOOP_TICKS);
        Self {
            clock,
            next,
            overruns: 0,
        }
    }

    /// Periods that finished after their deadline.
    #[inline]
    pub const fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Block until the end of the current period.
    ///
    /// An overrun restarts the schedule from now instead of bursting to
    /// catch up.
    pub fn wait(&mut self) {
        let remaining = ticks_since(self.next, self.clock.now_ticks());
        if remaining > 0 {
            std::thread::sleep(Duration::from_micros(remaining as u64 * US_PER_TICK as u64));
            self.next = self.next.wrapping_add(CONTROL_LOOP_TICKS);
        } else {
            self.overruns += 1;
            if self.overruns <= 10 || self.overruns % 1000 == 0 {
                warn!("Timing violation #{}: {} ticks late", self.overruns, -remaining);
            }
            self.next = self.clock.now_ticks().wrapping_add(CONTROL_LOOP_TICKS);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
