//! Parameter file loading.
//!
//! One TOML file carries both the controller parameters (`[controller]`, with optional
//! `[controller.brake]` / `[controller.feed_forward]`) and the runtime settings
//! (`[runtime]`). Missing keys fall back to defaults.

use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};
use thiserror::Error;

use crate::control::{ConfigError, ControllerConfig, ControllerParams};

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("cannot read parameter file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid parameter file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid runtime parameter `{name}`: {reason}")]
    Runtime {
        name: &'static str,
        reason: &'static str,
    },
    #[error(transparent)]
    Controller(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeParams {
    /// Time spent in the driving state before the stepper engages (s).
    pub warmup_s: f64,
    /// Step + publish budget per period (µs).
    pub deadline_us: u64,
    /// Run length of the binaries (s).
    pub duration_s: u64,
    pub inbound_capacity: usize,
    pub outbound_capacity: usize,
    pub events_csv: String,
    pub summary_csv: String,
    /// Without an AS state source the gate is held open.
    pub require_as_state: bool,
}

impl Default for RuntimeParams {
    fn default() -> Self {
        Self {
            warmup_s: 2.0,
            deadline_us: 2_000,
            duration_s: 30,
            inbound_capacity: 1024,
            outbound_capacity: 1024,
            events_csv: "data/logs/events.csv".to_string(),
            summary_csv: "data/metrics_summary.csv".to_string(),
            require_as_state: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub controller: ControllerParams,
    pub runtime: RuntimeParams,
}

impl Params {
    pub fn from_toml(text: &str) -> Result<Self, ParamsError> {
        let params: Params = toml::from_str(text)?;
        params.validate_runtime()?;
        Ok(params)
    }

    /// Validated controller configuration for these parameters.
    pub fn controller_config(&self) -> Result<ControllerConfig, ParamsError> {
        Ok(ControllerConfig::new(self.controller.clone())?)
    }

    fn validate_runtime(&self) -> Result<(), ParamsError> {
        let rt = &self.runtime;
        if !rt.warmup_s.is_finite() || rt.warmup_s < 0.0 {
            return Err(ParamsError::Runtime { name: "warmup_s", reason: "must be finite and >= 0" });
        }
        if rt.deadline_us == 0 {
            return Err(ParamsError::Runtime { name: "deadline_us", reason: "must be > 0" });
        }
        if rt.inbound_capacity == 0 || rt.outbound_capacity == 0 {
            return Err(ParamsError::Runtime { name: "capacity", reason: "channel capacity must be > 0" });
        }
        Ok(())
    }
}

pub fn load(path: impl AsRef<Path>) -> Result<Params, ParamsError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ParamsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Params::from_toml(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::config::BrakeParams;

    #[test]
    fn empty_file_is_all_defaults() {
        let p = Params::from_toml("").unwrap();
        assert_eq!(p, Params::default());
        assert!(p.controller_config().is_ok());
    }

    #[test]
    fn nested_sections() {
        let p = Params::from_toml(
            r#"
            [controller]
            kp = 120.0

            [controller.brake]
            duty_cycle_ns = 30000

            [runtime]
            warmup_s = 0.5
            require_as_state = false
            "#,
        )
        .unwrap();
        assert_eq!(p.controller.kp, 120.0);
        assert_eq!(p.controller.brake, Some(BrakeParams { duty_cycle_ns: 30_000 }));
        assert_eq!(p.runtime.warmup_s, 0.5);
        assert!(!p.runtime.require_as_state);
    }

    #[test]
    fn invalid_controller_surfaces_config_error() {
        let p = Params::from_toml("[controller]\ntorque_limit = 3000.0\n").unwrap();
        assert!(matches!(
            p.controller_config(),
            Err(ParamsError::Controller(ConfigError::TorqueLimitOutOfRange(_)))
        ));
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(
            Params::from_toml("[runtime]\ninbound_capacity = 0\n"),
            Err(ParamsError::Runtime { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(load("/nonexistent/params.toml"), Err(ParamsError::Io { .. })));
    }
}
