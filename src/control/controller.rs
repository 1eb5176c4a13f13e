//! controller.rs
//! Longitudinal speed controller: shared state accessors plus the periodic step.
//!
//! Writers (telemetry / request handlers) and the single stepper share one
//! `Controller` through `Arc`. Every accessor is a short critical section on one
//! `parking_lot::Mutex<ControlState>`, so the stepper always sees whole-field values
//! and `stop_requested` always matches the request it was derived from.

use log::{trace, warn};
use parking_lot::Mutex;

use crate::control::{
    arbitration::{torque_command, DriveMode},
    command::ActuatorCommand,
    config::ControllerConfig,
    law::calculate_torque,
    rate_limit::RateLimiter,
    state::{ControlSnapshot, ControlState},
};

pub struct Controller {
    config: ControllerConfig,
    rate_limiter: RateLimiter,
    state: Mutex<ControlState>,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        let rate_limiter = RateLimiter::new(config.torque_rate_limit(), config.dt());
        Self {
            config,
            rate_limiter,
            state: Mutex::new(ControlState::default()),
        }
    }

    #[inline]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Writer side
    // ------------------------------------------------------------------------

    /// Ground speed reading (m/s).
    pub fn set_speed_reading(&self, speed: f64) {
        self.state.lock().ground_speed = speed;
    }

    pub fn set_left_wheel_speed(&self, speed: f64) {
        self.state.lock().left_wheel_speed = speed;
    }

    pub fn set_right_wheel_speed(&self, speed: f64) {
        self.state.lock().right_wheel_speed = speed;
    }

    /// Desired ground speed (m/s); `<= 0` requests a stop.
    pub fn set_speed_request(&self, speed: f64) {
        self.state.lock().set_speed_request(speed);
    }

    // ------------------------------------------------------------------------
    // Stepper side
    // ------------------------------------------------------------------------

    /// Runs one control period and returns the new actuator command.
    ///
    /// A non-finite speed reading or request holds the previous command without
    /// advancing the integral or the rate-limit memory.
    pub fn step(&self) -> ActuatorCommand {
        let mut s = self.state.lock();
        s.steps += 1;

        let speed_reading = s.speed_reading(self.config.speed_source());
        let speed_request = s.speed_request;

        if !speed_reading.is_finite() || !speed_request.is_finite() {
            return Self::hold(&mut s, speed_reading, speed_request);
        }

        let mode = DriveMode::select(s.stop_requested, self.config.brake().is_some());

        let command = match (mode, self.config.brake()) {
            (DriveMode::Brake, Some(brake)) => ActuatorCommand::brake(brake.duty_cycle_ns),
            _ => {
                let speed_error = speed_request - speed_reading;
                let mut integral = s.integral_error;
                let torque = calculate_torque(&self.config, &mut integral, speed_error, speed_reading);
                let limited = self.rate_limiter.limit(s.previous_torque, torque);

                if !limited.is_finite() {
                    return Self::hold(&mut s, speed_reading, speed_request);
                }

                s.integral_error = integral;
                s.previous_torque = limited;
                torque_command(limited, speed_reading, self.config.distribution())
            }
        };

        s.holding = false;
        s.command = command;

        trace!(
            "step #{}: reading={:.3} request={:.3} mode={:?} torque=({}, {}) brake={}",
            s.steps,
            speed_reading,
            speed_request,
            mode,
            command.torque_left,
            command.torque_right,
            command.brake_duty_cycle_ns,
        );

        command
    }

    fn hold(s: &mut ControlState, speed_reading: f64, speed_request: f64) -> ActuatorCommand {
        s.held_steps += 1;
        if !s.holding {
            warn!(
                "non-finite input (reading={}, request={}); holding previous command",
                speed_reading, speed_request
            );
            s.holding = true;
        }
        s.command
    }

    // ------------------------------------------------------------------------
    // Consumer / diagnostics
    // ------------------------------------------------------------------------

    /// Latest command computed by `step` (released command before the first step).
    pub fn command(&self) -> ActuatorCommand {
        self.state.lock().command
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        self.state.lock().snapshot(self.config.speed_source())
    }

    /// Drops integral and rate-limit memory and releases the command.
    pub fn reset(&self) {
        self.state.lock().reset_dynamics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::config::{BrakeParams, ControllerParams, SpeedSource};

    fn controller(params: ControllerParams) -> Controller {
        Controller::new(ControllerConfig::new(params).unwrap())
    }

    #[test]
    fn first_command_is_released() {
        let c = controller(ControllerParams::default());
        assert_eq!(c.command(), ActuatorCommand::default());
    }

    #[test]
    fn wheel_speeds_feed_the_reading() {
        let c = controller(ControllerParams::default()
            .with_speed_source(SpeedSource::Wheels)
            .with_torque_rate_limit(0.0)
            .with_ki(0.0));
        c.set_speed_request(10.0);
        c.set_left_wheel_speed(5.0);
        c.set_right_wheel_speed(4.0);
        let cmd = c.step();
        assert!(cmd.torque_left > 0);
        assert!(cmd.torque_right > 0);
        assert_eq!(c.snapshot().speed_reading, 4.5);
    }

    #[test]
    fn nan_reading_holds_previous_command() {
        let c = controller(ControllerParams::default().with_torque_rate_limit(0.0));
        c.set_speed_request(10.0);
        c.set_speed_reading(5.0);
        let before = c.step();
        let integral = c.snapshot().integral_error;

        c.set_speed_reading(f64::NAN);
        assert_eq!(c.step(), before);
        c.set_speed_reading(f64::INFINITY);
        assert_eq!(c.step(), before);

        let snap = c.snapshot();
        assert_eq!(snap.held_steps, 2);
        assert_eq!(snap.integral_error, integral);
    }

    #[test]
    fn fresh_controller_brakes_until_a_request_arrives() {
        let c = controller(ControllerParams::default()
            .with_brake(Some(BrakeParams::default()))
            .with_torque_rate_limit(0.0));
        c.set_speed_reading(10.0);

        assert_eq!(c.step(), ActuatorCommand::brake(50_000));
        let snap = c.snapshot();
        assert!(snap.stop_requested);
        assert_eq!(snap.previous_torque, 0.0);
    }

    #[test]
    fn brake_branch_leaves_dynamics_untouched() {
        let c = controller(ControllerParams::default().with_brake(Some(BrakeParams::default())));
        c.set_speed_request(8.0);
        c.set_speed_reading(6.0);
        for _ in 0..20 {
            c.step();
        }
        let before = c.snapshot();

        c.set_speed_request(0.0);
        let cmd = c.step();
        assert_eq!(cmd, ActuatorCommand::brake(50_000));

        let after = c.snapshot();
        assert_eq!(after.integral_error, before.integral_error);
        assert_eq!(after.previous_torque, before.previous_torque);
    }

    #[test]
    fn reset_releases_command() {
        let c = controller(ControllerParams::default());
        c.set_speed_request(10.0);
        c.set_speed_reading(5.0);
        c.step();
        c.reset();
        let snap = c.snapshot();
        assert_eq!(snap.command, ActuatorCommand::default());
        assert_eq!(snap.previous_torque, 0.0);
        assert_eq!(snap.speed_request, 10.0);
    }
}
