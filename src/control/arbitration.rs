//! arbitration.rs
//! Torque vs. friction brake arbitration, low-speed regen cutoff and left/right distribution.

use crate::control::{
    command::ActuatorCommand,
    config::Distribution,
    law::REGEN_CUTOFF_SPEED_MS,
};

/// Mutually exclusive actuator modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    Torque,
    Brake,
}

impl DriveMode {
    /// Brake mode only when a stop is requested and brake arbitration is configured.
    pub fn select(stop_requested: bool, brake_available: bool) -> Self {
        if stop_requested && brake_available {
            DriveMode::Brake
        } else {
            DriveMode::Torque
        }
    }
}

/// Regenerative braking is ineffective near standstill: force negative torque to zero.
#[inline]
pub fn regen_cutoff(torque: f64, speed_reading: f64) -> f64 {
    if speed_reading < REGEN_CUTOFF_SPEED_MS && torque < 0.0 {
        0.0
    } else {
        torque
    }
}

/// Splits the scalar torque over both channels, truncating toward zero.
#[inline]
pub fn distribute(torque: f64, distribution: Distribution) -> (i32, i32) {
    let per_side = match distribution {
        Distribution::Even => torque * 0.5,
        Distribution::Unsplit => torque,
    };
    // `as` saturates at the i32 bounds
    let t = per_side as i32;
    (t, t)
}

/// Torque-mode command from the rate-limited torque request.
pub fn torque_command(torque: f64, speed_reading: f64, distribution: Distribution) -> ActuatorCommand {
    let (left, right) = distribute(regen_cutoff(torque, speed_reading), distribution);
    ActuatorCommand::torque(left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_only_affects_negative_torque_at_low_speed() {
        assert_eq!(regen_cutoff(-50.0, 1.0), 0.0);
        assert_eq!(regen_cutoff(50.0, 1.0), 50.0);
        assert_eq!(regen_cutoff(-50.0, 2.0), -50.0);
        assert_eq!(regen_cutoff(-50.0, REGEN_CUTOFF_SPEED_MS), -50.0);
    }

    #[test]
    fn distribution_truncates_toward_zero() {
        assert_eq!(distribute(101.0, Distribution::Even), (50, 50));
        assert_eq!(distribute(-101.0, Distribution::Even), (-50, -50));
        assert_eq!(distribute(-101.9, Distribution::Unsplit), (-101, -101));
    }

    #[test]
    fn brake_mode_requires_brake_config() {
        assert_eq!(DriveMode::select(true, true), DriveMode::Brake);
        assert_eq!(DriveMode::select(true, false), DriveMode::Torque);
        assert_eq!(DriveMode::select(false, true), DriveMode::Torque);
    }
}
