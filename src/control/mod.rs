// Control core: longitudinal speed controller
// PI law with anti-windup, rate limiting, regen cutoff and torque/brake arbitration.
pub mod config;
pub mod state;
pub mod law;
pub mod rate_limit;
pub mod arbitration;
pub mod command;
pub mod controller;

pub use command::ActuatorCommand;
pub use config::{ConfigError, ControllerConfig, ControllerParams};
pub use controller::Controller;
