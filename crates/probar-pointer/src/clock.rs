//! Clocks that pace movement steps.
//!
//! Movement is paced by elapsed real time, not by a fixed number of steps.
//! [`TokioClock`] reads tokio's monotonic clock (so `tokio::time::pause`
//! makes it deterministic), and [`ManualClock`] advances by a fixed amount on
//! every tick for fully scripted tests.

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Monotonic time source with a scheduler yield point
#[async_trait]
pub trait Clock: Send + Sync + fmt::Debug {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;

    /// Yield to the scheduler so pending host work (and time) can progress
    async fn tick(&self);
}

/// Real-time clock backed by tokio's timer
#[derive(Debug)]
pub struct TokioClock {
    origin: tokio::time::Instant,
    tick_interval: Duration,
}

impl TokioClock {
    /// Clock whose ticks sleep for `tick_interval`
    #[must_use]
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            tick_interval,
        }
    }

    /// Sleep duration of one tick
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        self.tick_interval
    }
}

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn tick(&self) {
        if self.tick_interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.tick_interval).await;
        }
    }
}

/// Scripted clock for deterministic tests
///
/// Time only moves on [`ManualClock::advance`] or on a tick, which adds the
/// configured step.
#[derive(Debug)]
pub struct ManualClock {
    current_ms: AtomicU64,
    step_ms: AtomicU64,
    ticks: AtomicU64,
}

impl ManualClock {
    /// Clock starting at zero that advances `step` per tick
    #[must_use]
    pub fn new(step: Duration) -> Self {
        Self {
            current_ms: AtomicU64::new(0),
            step_ms: AtomicU64::new(step.as_millis() as u64),
            ticks: AtomicU64::new(0),
        }
    }

    /// Move time forward without ticking
    pub fn advance(&self, by: Duration) {
        self.current_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Change the per-tick step
    pub fn set_step(&self, step: Duration) {
        self.step_ms.store(step.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of ticks taken so far
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.current_ms.load(Ordering::SeqCst))
    }

    async fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        let step = self.step_ms.load(Ordering::SeqCst);
        self.current_ms.fetch_add(step, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }
}
