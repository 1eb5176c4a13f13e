//! Longitudinal speed control for an autonomous vehicle.
//!
//! - `control`: PI speed law, clamps, rate limiting, stop/brake arbitration, torque split
//! - `transport`: stamped bus messages, inbound filtering, command publishing
//! - `runtime`: drive gate, threaded and tokio execution contexts, drive-log replay
//! - `utils`: parameter loading, metrics, event recording, summary export

pub mod control;
pub mod transport;
pub mod runtime;
pub mod utils;
