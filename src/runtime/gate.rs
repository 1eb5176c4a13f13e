//! gate.rs
//! Drive enable condition consumed from the external autonomous-system state machine.
//!
//! The controller only steps while the reported state is `AS_DRIVING` and a warm-up
//! period has elapsed since entering it. Leaving the driving state restarts the warm-up.

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

/// Autonomous-system state value meaning "driving".
pub const AS_DRIVING: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Not driving: no step, no output.
    Closed,
    /// Driving, warm-up still running.
    WarmingUp,
    Open,
}

#[derive(Debug)]
pub struct DriveGate {
    state: AtomicI32,
    warmup_ticks: u32,
    counter: AtomicU32,
}

impl DriveGate {
    pub fn new(warmup_ticks: u32) -> Self {
        Self {
            state: AtomicI32::new(0),
            warmup_ticks,
            counter: AtomicU32::new(0),
        }
    }

    /// Warm-up of `warmup_s` seconds at loop frequency `freq_hz`.
    pub fn with_warmup(warmup_s: f64, freq_hz: f64) -> Self {
        Self::new((warmup_s * freq_hz).max(0.0).round() as u32)
    }

    /// Gate that is always open (no state machine on the bus).
    pub fn always_open() -> Self {
        let gate = Self::new(0);
        gate.set_state(AS_DRIVING);
        gate
    }

    /// Writer side: latest state reading.
    pub fn set_state(&self, state: i32) {
        self.state.store(state, Ordering::Release);
    }

    pub fn state(&self) -> i32 {
        self.state.load(Ordering::Acquire)
    }

    /// Stepper side: called once per tick.
    pub fn tick(&self) -> GateDecision {
        if self.state() != AS_DRIVING {
            // warm-up restarts on every entry into driving
            self.counter.store(0, Ordering::Relaxed);
            return GateDecision::Closed;
        }

        let elapsed = self.counter.load(Ordering::Relaxed);
        if elapsed < self.warmup_ticks {
            self.counter.store(elapsed + 1, Ordering::Relaxed);
            GateDecision::WarmingUp
        } else {
            GateDecision::Open
        }
    }
}
