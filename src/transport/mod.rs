// Transport: in-process stand-in for the vehicle bus
// Stamped envelopes in, actuator requests out; the controller never sees envelopes.
pub mod message;
pub mod receiver;
pub mod publisher;
