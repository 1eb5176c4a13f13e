//! command.rs
//! Actuator command produced by every controller step.

use serde::Serialize;

/// Output of one controller step: per-wheel torque request plus friction brake demand.
///
/// Overwritten wholesale on every step. Torque is in centi-Newton-metres, negative
/// values request regenerative braking. `brake_duty_cycle_ns` is the PWM duty cycle of
/// the friction brake actuator, `0` meaning released.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActuatorCommand {
    pub torque_left: i32,
    pub torque_right: i32,
    pub brake_duty_cycle_ns: u32,
}

impl ActuatorCommand {
    /// Torque-only command with the brake released.
    pub fn torque(torque_left: i32, torque_right: i32) -> Self {
        Self {
            torque_left,
            torque_right,
            brake_duty_cycle_ns: 0,
        }
    }

    /// Brake-only command: both torque channels at zero.
    pub fn brake(duty_cycle_ns: u32) -> Self {
        Self {
            torque_left: 0,
            torque_right: 0,
            brake_duty_cycle_ns: duty_cycle_ns,
        }
    }

    #[inline]
    pub fn is_braking(&self) -> bool {
        self.brake_duty_cycle_ns > 0
    }
}
