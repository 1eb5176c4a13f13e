//! config.rs
//! Controller parameters and the validated, immutable controller configuration.
//!
//! `ControllerParams` is the raw, deserialisable form (TOML `[controller]` section or
//! builder calls). `ControllerConfig` can only be obtained through
//! `ControllerConfig::new`, so a controller is never built from an invalid parameter set.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Legal actuator torque range upper bound (cNm).
pub const MAX_TORQUE_LIMIT: f64 = 2400.0;

/// Standard gravity, used by the rolling resistance term.
const GRAVITY_MS2: f64 = 9.81;

/// Errors rejected at construction time.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("sample interval dt must be finite and > 0, got {0}")]
    NonPositiveDt(f64),

    #[error("torque limit {0} not between 0 - 2400")]
    TorqueLimitOutOfRange(f64),

    #[error("parameter `{name}` must be {expected}, got {value}")]
    InvalidParameter {
        name: &'static str,
        expected: &'static str,
        value: f64,
    },
}

/// Where the measured speed comes from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedSource {
    /// Single ground speed reading.
    #[default]
    Ground,
    /// Mean of the left and right wheel speed readings.
    Wheels,
}

/// Output clamp policy applied to the PI result.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputClamp {
    /// Only `torque <= torque_limit`; negative torque is unbounded.
    UpperOnly,
    /// `-torque_limit <= torque <= torque_limit`.
    #[default]
    Symmetric,
}

/// What the integral clamp bounds.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegralClamp {
    /// Raw accumulated error is kept in `[0, i_limit]`.
    #[default]
    Accumulator,
    /// Integral feedback `integral * ki` is kept in `[0, i_limit]`.
    Feedback,
}

/// How the scalar torque is mapped onto the left/right channels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Half of the torque per side.
    #[default]
    Even,
    /// Full torque on both sides.
    Unsplit,
}

/// Friction brake arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrakeParams {
    /// Duty cycle commanded while a stop is requested (ns).
    pub duty_cycle_ns: u32,
}

impl Default for BrakeParams {
    fn default() -> Self {
        Self { duty_cycle_ns: 50_000 }
    }
}

/// Vehicle constants for the feed-forward resistance model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedForwardParams {
    pub mass_kg: f64,
    pub wheel_radius_m: f64,
    pub gear_ratio: f64,
    pub rolling_resistance: f64,
    /// Drag coefficient times frontal area (m²).
    pub drag_area_m2: f64,
    pub air_density_kgm3: f64,
}

impl Default for FeedForwardParams {
    fn default() -> Self {
        Self {
            mass_kg: 217.4,
            wheel_radius_m: 0.22,
            gear_ratio: 16.0,
            rolling_resistance: 0.015,
            drag_area_m2: 1.1,
            air_density_kgm3: 1.225,
        }
    }
}

impl FeedForwardParams {
    /// Rolling resistance force while accelerating (N).
    pub fn rolling_force_n(&self) -> f64 {
        self.rolling_resistance * self.mass_kg * GRAVITY_MS2
    }
}

/// Raw controller parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerParams {
    /// Control loop period (s).
    pub dt: f64,
    pub kp: f64,
    /// Integral gain, `0` disables the integral term.
    pub ki: f64,
    /// Output (torque) limit (cNm), must lie in `0..=2400`.
    pub torque_limit: f64,
    /// Integral limit, see `integral_clamp`.
    pub i_limit: f64,
    /// Max torque change per second (cNm/s), `0` disables rate limiting.
    pub torque_rate_limit: f64,
    /// Integrate only while `|speed_error|` is below this value (m/s).
    pub error_deadband: f64,
    pub speed_source: SpeedSource,
    pub output_clamp: OutputClamp,
    pub integral_clamp: IntegralClamp,
    pub distribution: Distribution,
    /// Stop/brake arbitration, enabled by the presence of a `[brake]` section.
    pub brake: Option<BrakeParams>,
    /// Resistance feed-forward, enabled by the presence of a `[feed_forward]` section.
    pub feed_forward: Option<FeedForwardParams>,
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self {
            dt: 0.01,
            kp: 300.0,
            ki: 5.0,
            torque_limit: MAX_TORQUE_LIMIT,
            i_limit: 500.0,
            torque_rate_limit: 100.0,
            error_deadband: 5.0,
            speed_source: SpeedSource::Ground,
            output_clamp: OutputClamp::Symmetric,
            integral_clamp: IntegralClamp::Accumulator,
            distribution: Distribution::Even,
            brake: None,
            feed_forward: None,
        }
    }
}

impl ControllerParams {
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn with_kp(mut self, kp: f64) -> Self {
        self.kp = kp;
        self
    }

    pub fn with_ki(mut self, ki: f64) -> Self {
        self.ki = ki;
        self
    }

    pub fn with_torque_limit(mut self, limit: f64) -> Self {
        self.torque_limit = limit;
        self
    }

    pub fn with_i_limit(mut self, limit: f64) -> Self {
        self.i_limit = limit;
        self
    }

    pub fn with_torque_rate_limit(mut self, rate: f64) -> Self {
        self.torque_rate_limit = rate;
        self
    }

    pub fn with_error_deadband(mut self, deadband: f64) -> Self {
        self.error_deadband = deadband;
        self
    }

    pub fn with_speed_source(mut self, source: SpeedSource) -> Self {
        self.speed_source = source;
        self
    }

    pub fn with_output_clamp(mut self, clamp: OutputClamp) -> Self {
        self.output_clamp = clamp;
        self
    }

    pub fn with_integral_clamp(mut self, clamp: IntegralClamp) -> Self {
        self.integral_clamp = clamp;
        self
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_brake(mut self, brake: Option<BrakeParams>) -> Self {
        self.brake = brake;
        self
    }

    pub fn with_feed_forward(mut self, ff: Option<FeedForwardParams>) -> Self {
        self.feed_forward = ff;
        self
    }
}

/// Validated controller configuration; immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    params: ControllerParams,
}

impl ControllerConfig {
    /// Validate `params` and freeze them.
    pub fn new(params: ControllerParams) -> Result<Self, ConfigError> {
        if !params.dt.is_finite() || params.dt <= 0.0 {
            return Err(ConfigError::NonPositiveDt(params.dt));
        }
        if !(0.0..=MAX_TORQUE_LIMIT).contains(&params.torque_limit) {
            return Err(ConfigError::TorqueLimitOutOfRange(params.torque_limit));
        }

        finite("kp", params.kp)?;
        non_negative("ki", params.ki)?;
        non_negative("i_limit", params.i_limit)?;
        non_negative("torque_rate_limit", params.torque_rate_limit)?;
        positive("error_deadband", params.error_deadband)?;

        if let Some(brake) = &params.brake {
            if brake.duty_cycle_ns == 0 {
                return Err(ConfigError::InvalidParameter {
                    name: "brake.duty_cycle_ns",
                    expected: "> 0",
                    value: 0.0,
                });
            }
        }

        if let Some(ff) = &params.feed_forward {
            positive("feed_forward.mass_kg", ff.mass_kg)?;
            positive("feed_forward.wheel_radius_m", ff.wheel_radius_m)?;
            positive("feed_forward.gear_ratio", ff.gear_ratio)?;
            non_negative("feed_forward.rolling_resistance", ff.rolling_resistance)?;
            non_negative("feed_forward.drag_area_m2", ff.drag_area_m2)?;
            non_negative("feed_forward.air_density_kgm3", ff.air_density_kgm3)?;
        }

        Ok(Self { params })
    }

    #[inline]
    pub fn dt(&self) -> f64 {
        self.params.dt
    }

    /// Loop frequency implied by `dt` (Hz).
    pub fn frequency_hz(&self) -> f64 {
        1.0 / self.params.dt
    }

    #[inline]
    pub fn kp(&self) -> f64 {
        self.params.kp
    }

    #[inline]
    pub fn ki(&self) -> f64 {
        self.params.ki
    }

    #[inline]
    pub fn torque_limit(&self) -> f64 {
        self.params.torque_limit
    }

    #[inline]
    pub fn i_limit(&self) -> f64 {
        self.params.i_limit
    }

    /// Rate limit, `None` when disabled.
    pub fn torque_rate_limit(&self) -> Option<f64> {
        (self.params.torque_rate_limit > 0.0).then_some(self.params.torque_rate_limit)
    }

    #[inline]
    pub fn error_deadband(&self) -> f64 {
        self.params.error_deadband
    }

    #[inline]
    pub fn speed_source(&self) -> SpeedSource {
        self.params.speed_source
    }

    #[inline]
    pub fn output_clamp(&self) -> OutputClamp {
        self.params.output_clamp
    }

    #[inline]
    pub fn integral_clamp(&self) -> IntegralClamp {
        self.params.integral_clamp
    }

    #[inline]
    pub fn distribution(&self) -> Distribution {
        self.params.distribution
    }

    pub fn brake(&self) -> Option<&BrakeParams> {
        self.params.brake.as_ref()
    }

    pub fn feed_forward(&self) -> Option<&FeedForwardParams> {
        self.params.feed_forward.as_ref()
    }
}

/// Proportional gain derived from the vehicle model (cNm per m/s of speed error).
pub fn model_p_gain(mass_kg: f64, wheel_radius_m: f64, gear_ratio: f64) -> f64 {
    mass_kg * wheel_radius_m / gear_ratio * 100.0
}

fn finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter { name, expected: "finite", value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter { name, expected: "finite and >= 0", value })
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter { name, expected: "finite and > 0", value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ControllerConfig::new(ControllerParams::default()).unwrap();
        assert_eq!(cfg.torque_rate_limit(), Some(100.0));
        assert!((cfg.frequency_hz() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_dt() {
        for dt in [0.0, -0.01, f64::NAN, f64::INFINITY] {
            let err = ControllerConfig::new(ControllerParams::default().with_dt(dt)).unwrap_err();
            assert!(matches!(err, ConfigError::NonPositiveDt(_)));
        }
    }

    #[test]
    fn rejects_torque_limit_outside_actuator_range() {
        for limit in [-1.0, 2400.5, f64::NAN] {
            let err = ControllerConfig::new(ControllerParams::default().with_torque_limit(limit))
                .unwrap_err();
            assert!(matches!(err, ConfigError::TorqueLimitOutOfRange(_)));
        }
        assert!(ControllerConfig::new(ControllerParams::default().with_torque_limit(0.0)).is_ok());
        assert!(ControllerConfig::new(ControllerParams::default().with_torque_limit(2400.0)).is_ok());
    }

    #[test]
    fn zero_rate_limit_disables_limiter() {
        let cfg = ControllerConfig::new(ControllerParams::default().with_torque_rate_limit(0.0)).unwrap();
        assert_eq!(cfg.torque_rate_limit(), None);
    }

    #[test]
    fn rejects_zero_brake_duty() {
        let params = ControllerParams::default().with_brake(Some(BrakeParams { duty_cycle_ns: 0 }));
        assert!(matches!(
            ControllerConfig::new(params),
            Err(ConfigError::InvalidParameter { name: "brake.duty_cycle_ns", .. })
        ));
    }

    #[test]
    fn model_gain_matches_vehicle_constants() {
        let kp = model_p_gain(217.4, 0.22, 16.0);
        assert!((kp - 298.925).abs() < 1e-6);
    }

    #[test]
    fn parses_toml_section() {
        let text = r#"
            dt = 0.02
            kp = 150.0
            ki = 0.0
            torque_limit = 1200.0
            output_clamp = "upper_only"
            distribution = "unsplit"
            speed_source = "wheels"

            [brake]
            duty_cycle_ns = 40000
        "#;
        let params: ControllerParams = toml::from_str(text).unwrap();
        assert_eq!(params.output_clamp, OutputClamp::UpperOnly);
        assert_eq!(params.distribution, Distribution::Unsplit);
        assert_eq!(params.speed_source, SpeedSource::Wheels);
        assert_eq!(params.brake, Some(BrakeParams { duty_cycle_ns: 40_000 }));
        // unspecified fields fall back to defaults
        assert_eq!(params.i_limit, 500.0);
        assert!(ControllerConfig::new(params).is_ok());
    }
}
