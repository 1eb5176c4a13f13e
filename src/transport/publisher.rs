//! publisher.rs
//! Sends each step's actuator command onto the outbound bus.
//! - dual torque request plus one standard torque request per wheel
//! - brake request only when the duty cycle changes (the brake proxy cannot take a stream)
//! - non-blocking try_send; full queue counts as a drop, the stepper never waits

use crossbeam::channel::{Sender, TrySendError};
use log::debug;
use std::sync::Arc;

use crate::control::ActuatorCommand;
use crate::transport::message::{stamps, Envelope, Message};
use crate::utils::metrics::{EventRecorder, Event};

/// Result of publishing one command.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishOutcome {
    pub sent: u32,
    pub dropped: u32,
    pub brake_sent: bool,
    /// Outbound side is gone; the caller should stop.
    pub disconnected: bool,
}

pub struct CommandPublisher {
    tx: Sender<Envelope>,
    last_brake_duty_ns: u32,
    event_recorder: Arc<EventRecorder>,
}

impl CommandPublisher {
    pub fn new(tx: Sender<Envelope>, event_recorder: Arc<EventRecorder>) -> Self {
        Self {
            tx,
            last_brake_duty_ns: 0,
            event_recorder,
        }
    }

    pub fn publish(&mut self, command: &ActuatorCommand) -> PublishOutcome {
        let mut outcome = PublishOutcome::default();

        self.send(
            stamps::TORQUE_REQUEST_DUAL,
            Message::TorqueRequestDual {
                torque_left: command.torque_left,
                torque_right: command.torque_right,
            },
            &mut outcome,
        );

        if command.brake_duty_cycle_ns != self.last_brake_duty_ns {
            let enqueued = self.send(
                stamps::BRAKE_REQUEST,
                Message::PulseWidthModulationRequest {
                    duty_cycle_ns: command.brake_duty_cycle_ns,
                },
                &mut outcome,
            );
            if enqueued {
                self.last_brake_duty_ns = command.brake_duty_cycle_ns;
                outcome.brake_sent = true;
            }
        }

        self.send(
            stamps::TORQUE_REQUEST_LEFT,
            Message::TorqueRequest { torque: command.torque_left },
            &mut outcome,
        );
        self.send(
            stamps::TORQUE_REQUEST_RIGHT,
            Message::TorqueRequest { torque: command.torque_right },
            &mut outcome,
        );

        outcome
    }

    fn send(&self, stamp: u16, message: Message, outcome: &mut PublishOutcome) -> bool {
        let name = message.name();
        let enqueued = match self.tx.try_send(Envelope::new(stamp, message)) {
            Ok(()) => {
                outcome.sent += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                outcome.dropped += 1;
                debug!("[Publisher] outbound queue full, dropped {}", name);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                outcome.disconnected = true;
                false
            }
        };

        self.event_recorder.record(Event::CommandSent {
            stamp,
            ts_ns: self.event_recorder.now_ns(),
            message: name,
            enqueued,
        });

        enqueued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::bounded;

    #[test]
    fn brake_only_sent_on_change() {
        let (tx, rx) = bounded(64);
        let mut p = CommandPublisher::new(tx, Arc::new(EventRecorder::new()));

        let out = p.publish(&ActuatorCommand::torque(10, 10));
        assert_eq!(out.sent, 3);
        assert!(!out.brake_sent);

        let out = p.publish(&ActuatorCommand::brake(50_000));
        assert!(out.brake_sent);
        assert_eq!(out.sent, 4);

        let out = p.publish(&ActuatorCommand::brake(50_000));
        assert!(!out.brake_sent);

        let out = p.publish(&ActuatorCommand::torque(0, 0));
        assert!(out.brake_sent);

        let brakes: Vec<u32> = rx
            .try_iter()
            .filter_map(|e| match e.message {
                Message::PulseWidthModulationRequest { duty_cycle_ns } => Some(duty_cycle_ns),
                _ => None,
            })
            .collect();
        assert_eq!(brakes, vec![50_000, 0]);
    }

    #[test]
    fn per_wheel_requests_carry_stamps() {
        let (tx, rx) = bounded(8);
        let mut p = CommandPublisher::new(tx, Arc::new(EventRecorder::new()));
        p.publish(&ActuatorCommand::torque(-7, 9));

        let stamped: Vec<(u16, Message)> = rx.try_iter().map(|e| (e.sender_stamp, e.message)).collect();
        assert_eq!(
            stamped,
            vec![
                (stamps::TORQUE_REQUEST_DUAL, Message::TorqueRequestDual { torque_left: -7, torque_right: 9 }),
                (stamps::TORQUE_REQUEST_LEFT, Message::TorqueRequest { torque: -7 }),
                (stamps::TORQUE_REQUEST_RIGHT, Message::TorqueRequest { torque: 9 }),
            ]
        );
    }

    #[test]
    fn full_queue_counts_drops() {
        let (tx, _rx) = bounded(1);
        let mut p = CommandPublisher::new(tx, Arc::new(EventRecorder::new()));
        let out = p.publish(&ActuatorCommand::torque(1, 1));
        assert_eq!(out.sent, 1);
        assert_eq!(out.dropped, 2);
        assert!(!out.disconnected);
    }

    #[test]
    fn closed_bus_reports_disconnect() {
        let (tx, rx) = bounded(4);
        drop(rx);
        let mut p = CommandPublisher::new(tx, Arc::new(EventRecorder::new()));
        assert!(p.publish(&ActuatorCommand::torque(1, 1)).disconnected);
    }
}
