//! state.rs
//! Mutable controller state shared between writer contexts and the stepper.
//!
//! Lives behind the controller's single `parking_lot::Mutex`; nothing outside
//! `control` ever holds a reference to it.

use serde::Serialize;

use crate::control::{
    command::ActuatorCommand,
    config::SpeedSource,
};

#[derive(Debug, Clone)]
pub struct ControlState {
    // Inputs (last write wins)
    pub(crate) ground_speed: f64,
    pub(crate) left_wheel_speed: f64,
    pub(crate) right_wheel_speed: f64,
    pub(crate) speed_request: f64,
    pub(crate) stop_requested: bool,

    // Persisted across steps
    pub(crate) integral_error: f64,
    pub(crate) previous_torque: f64,

    // Latest output
    pub(crate) command: ActuatorCommand,

    pub(crate) steps: u64,
    pub(crate) held_steps: u64,
    // true while non-finite inputs hold the output; one warning per episode
    pub(crate) holding: bool,
}

impl Default for ControlState {
    /// No request received yet: request 0, which is a stop.
    fn default() -> Self {
        Self {
            ground_speed: 0.0,
            left_wheel_speed: 0.0,
            right_wheel_speed: 0.0,
            speed_request: 0.0,
            stop_requested: true,
            integral_error: 0.0,
            previous_torque: 0.0,
            command: ActuatorCommand::default(),
            steps: 0,
            held_steps: 0,
            holding: false,
        }
    }
}

impl ControlState {
    /// Measured speed according to the configured source (m/s).
    pub fn speed_reading(&self, source: SpeedSource) -> f64 {
        match source {
            SpeedSource::Ground => self.ground_speed,
            SpeedSource::Wheels => (self.left_wheel_speed + self.right_wheel_speed) / 2.0,
        }
    }

    pub(crate) fn set_speed_request(&mut self, request: f64) {
        self.speed_request = request;
        self.stop_requested = request <= 0.0;
    }

    /// Clears integral, rate-limit memory and the latest command; inputs are kept.
    pub(crate) fn reset_dynamics(&mut self) {
        self.integral_error = 0.0;
        self.previous_torque = 0.0;
        self.command = ActuatorCommand::default();
        self.holding = false;
    }

    pub(crate) fn snapshot(&self, source: SpeedSource) -> ControlSnapshot {
        ControlSnapshot {
            speed_reading: self.speed_reading(source),
            speed_request: self.speed_request,
            stop_requested: self.stop_requested,
            integral_error: self.integral_error,
            previous_torque: self.previous_torque,
            command: self.command,
            steps: self.steps,
            held_steps: self.held_steps,
        }
    }
}

/// Consistent copy of the controller state, taken under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlSnapshot {
    pub speed_reading: f64,
    pub speed_request: f64,
    pub stop_requested: bool,
    pub integral_error: f64,
    /// Rate-limited torque before the regen cutoff (cNm).
    pub previous_torque: f64,
    pub command: ActuatorCommand,
    pub steps: u64,
    /// Steps that held the previous command because of a non-finite input.
    pub held_steps: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_flag_follows_request() {
        let mut s = ControlState::default();
        s.set_speed_request(3.0);
        assert!(!s.stop_requested);
        s.set_speed_request(0.0);
        assert!(s.stop_requested);
        s.set_speed_request(-1.0);
        assert!(s.stop_requested);
    }

    #[test]
    fn fresh_state_is_a_stop() {
        let s = ControlState::default();
        assert_eq!(s.speed_request, 0.0);
        assert!(s.stop_requested);
    }

    #[test]
    fn wheel_source_averages_both_sides() {
        let s = ControlState {
            ground_speed: 9.0,
            left_wheel_speed: 5.0,
            right_wheel_speed: 4.0,
            ..Default::default()
        };
        assert_eq!(s.speed_reading(SpeedSource::Wheels), 4.5);
        assert_eq!(s.speed_reading(SpeedSource::Ground), 9.0);
    }
}
