//! Tachometer counters shared between an edge interrupt and the control
//! tick.
//!
//! The interrupt side only adds edges and stores the latest rate; the tick
//! side only loads. Both words are independent atomics, so a reader may see
//! a count and a rate from adjacent edges, which the controller tolerates.

use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

/// Position counter of one rotation sensor.
#[derive(Debug, Default)]
pub struct TachoCounter {
    /// Edges since reset, signed by direction.
    count: AtomicI64,
    /// Latest speed measurement [mdeg/s].
    rate: AtomicI32,
}

impl TachoCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
            rate: AtomicI32::new(0),
        }
    }

    /// Interrupt side: record `edges` (negative when turning backwards).
    #[inline]
    pub fn add(&self, edges: i64) {
        self.count.fetch_add(edges, Ordering::Release);
    }

    /// Interrupt side: publish the latest speed [mdeg/s].
    #[inline]
    pub fn set_rate(&self, rate: i32) {
        self.rate.store(rate, Ordering::Release);
    }

    /// Restart counting from `count`, at rest.
    pub fn reset(&self, count: i64) {
        self.count.store(count, Ordering::Release);
        self.rate.store(0, Ordering::Release);
    }

    #[inline]
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn rate(&self) -> i32 {
        self.rate.load(Ordering::Acquire)
    }

    /// Position [mdeg] for a sensor with `mdeg_per_count` resolution.
    #[inline]
    pub fn position(&self, mdeg_per_count: i64) -> i64 {
        self.count().saturating_mul(mdeg_per_count)
    }
}
