// Runtime: execution contexts around the controller
// - gate: drive enable condition from the AS state machine
// - stepper / writer: threaded contexts (spin_sleep pacing, max-priority stepper)
// - async_loop: tokio contexts
// - replay: drive-log producer for the inbound channel
pub mod gate;
pub mod stepper;
pub mod writer;
pub mod async_loop;
pub mod replay;
