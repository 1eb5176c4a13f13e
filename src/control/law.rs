//! law.rs
//! PI control law with deadband-gated anti-windup and optional resistance feed-forward.
//!
//! Pipeline per step:
//!   speed_error → integrate (only while |error| < deadband) → clamp integral
//!   → kp * error + ki * integral (+ feed-forward) → output clamp

use crate::control::config::{ControllerConfig, FeedForwardParams, IntegralClamp, OutputClamp};

/// Below this measured speed regenerative braking is cut (5 km/h).
pub const REGEN_CUTOFF_SPEED_MS: f64 = 5.0 / 3.6;

/// Newton-metres to actuator torque units (cNm).
const TORQUE_UNITS_PER_NM: f64 = 100.0;

/// Computes the clamped torque request (cNm) and advances `integral_error`.
pub fn calculate_torque(
    cfg: &ControllerConfig,
    integral_error: &mut f64,
    speed_error: f64,
    speed_reading: f64,
) -> f64 {
    integrate(cfg, integral_error, speed_error);

    let mut torque = speed_error * cfg.kp() + *integral_error * cfg.ki();

    if let Some(ff) = cfg.feed_forward() {
        torque += feed_forward_torque(ff, speed_error, speed_reading);
    }

    clamp_output(cfg, torque)
}

/// Anti-windup: accumulate only inside the deadband, then bound the integral.
pub fn integrate(cfg: &ControllerConfig, integral_error: &mut f64, speed_error: f64) {
    if speed_error.abs() < cfg.error_deadband() {
        *integral_error += speed_error * cfg.dt();
    }

    let upper = match cfg.integral_clamp() {
        IntegralClamp::Accumulator => cfg.i_limit(),
        // bound the feedback term ki * integral, not the accumulator
        IntegralClamp::Feedback if cfg.ki() > 0.0 => cfg.i_limit() / cfg.ki(),
        IntegralClamp::Feedback => cfg.i_limit(),
    };

    *integral_error = integral_error.clamp(0.0, upper);
}

pub fn clamp_output(cfg: &ControllerConfig, torque: f64) -> f64 {
    let limit = cfg.torque_limit();
    match cfg.output_clamp() {
        OutputClamp::UpperOnly => torque.min(limit),
        OutputClamp::Symmetric => torque.clamp(-limit, limit),
    }
}

/// Torque (cNm) needed to hold speed against rolling resistance and aerodynamic drag.
///
/// Rolling resistance is only compensated while accelerating (`speed_error > 0`).
pub fn feed_forward_torque(ff: &FeedForwardParams, speed_error: f64, speed_reading: f64) -> f64 {
    let rolling_n = if speed_error > 0.0 { ff.rolling_force_n() } else { 0.0 };
    let drag_n = 0.5 * ff.air_density_kgm3 * ff.drag_area_m2 * speed_reading * speed_reading.abs();

    (rolling_n + drag_n) * ff.wheel_radius_m / ff.gear_ratio * TORQUE_UNITS_PER_NM
}
