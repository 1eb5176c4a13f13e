//! rate_limit.rs
//! Bounds the per-step change of the torque request.

/// Per-step slew limiter; `max_step = torque_rate_limit * dt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiter {
    max_step: Option<f64>,
}

impl RateLimiter {
    /// `rate` in torque units per second, `None` disables limiting.
    pub fn new(rate: Option<f64>, dt: f64) -> Self {
        Self {
            max_step: rate.map(|r| r * dt),
        }
    }

    #[inline]
    pub fn max_step(&self) -> Option<f64> {
        self.max_step
    }

    /// Moves from `previous` towards `target` by at most `max_step`.
    #[inline]
    pub fn limit(&self, previous: f64, target: f64) -> f64 {
        match self.max_step {
            Some(step) => previous + (target - previous).clamp(-step, step),
            None => target,
        }
    }
}
