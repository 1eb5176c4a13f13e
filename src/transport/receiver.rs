//! receiver.rs
//! Writer context: filters inbound envelopes by sender stamp and forwards values to the
//! controller setters and the drive gate.
//! - one handler per inbound channel; several may run concurrently on the same controller
//! - never blocks beyond the controller's short critical sections

use crossbeam::channel::Receiver;
use dashmap::DashMap;
use log::debug;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::control::Controller;
use crate::runtime::gate::DriveGate;
use crate::transport::message::{stamps, Envelope, Message, WheelSide};
use crate::utils::metrics::{EventRecorder, Event};

/// Accepted / ignored envelope counts per sender stamp.
#[derive(Clone, Default)]
pub struct InboundStats {
    accepted: Arc<DashMap<u16, AtomicU64>>,
    ignored: Arc<DashMap<u16, AtomicU64>>,
}

impl InboundStats {
    fn bump(map: &DashMap<u16, AtomicU64>, stamp: u16) {
        map.entry(stamp)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn accepted(&self, stamp: u16) -> u64 {
        self.accepted.get(&stamp).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }

    pub fn ignored(&self, stamp: u16) -> u64 {
        self.ignored.get(&stamp).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }

    pub fn total_accepted(&self) -> u64 {
        self.accepted.iter().map(|r| r.value().load(Ordering::Relaxed)).sum()
    }

    pub fn total_ignored(&self) -> u64 {
        self.ignored.iter().map(|r| r.value().load(Ordering::Relaxed)).sum()
    }
}

#[derive(Clone)]
pub struct InboundHandler {
    controller: Arc<Controller>,
    gate: Arc<DriveGate>,
    stats: InboundStats,
    event_recorder: Arc<EventRecorder>,
}

impl InboundHandler {
    pub fn new(
        controller: Arc<Controller>,
        gate: Arc<DriveGate>,
        stats: InboundStats,
        event_recorder: Arc<EventRecorder>,
    ) -> Self {
        Self {
            controller,
            gate,
            stats,
            event_recorder,
        }
    }

    /// Applies one envelope; returns whether it was accepted.
    pub fn handle(&self, envelope: Envelope) -> bool {
        let value = match (envelope.sender_stamp, envelope.message) {
            (stamps::GROUND_SPEED_READING, Message::GroundSpeedReading { ground_speed }) => {
                self.controller.set_speed_reading(ground_speed);
                debug!("GroundSpeedReading: {}", ground_speed);
                Some(ground_speed)
            }
            (stamps::GROUND_SPEED_REQUEST, Message::GroundSpeedRequest { ground_speed }) => {
                self.controller.set_speed_request(ground_speed);
                debug!("Groundspeed request: {}", ground_speed);
                Some(ground_speed)
            }
            (stamps::WHEEL_SPEED_LEFT, Message::WheelSpeedReading { side: WheelSide::Left, speed }) => {
                self.controller.set_left_wheel_speed(speed);
                Some(speed)
            }
            (stamps::WHEEL_SPEED_RIGHT, Message::WheelSpeedReading { side: WheelSide::Right, speed }) => {
                self.controller.set_right_wheel_speed(speed);
                Some(speed)
            }
            (stamps::AS_STATE, Message::SwitchStateReading { state }) => {
                self.gate.set_state(state);
                debug!("AS state: {}", state);
                Some(state as f64)
            }
            _ => None,
        };

        let ts_ns = self.event_recorder.now_ns();
        match value {
            Some(value) => {
                InboundStats::bump(&self.stats.accepted, envelope.sender_stamp);
                self.event_recorder.record(Event::InboundAccepted {
                    stamp: envelope.sender_stamp,
                    ts_ns,
                    message: envelope.message.name(),
                    value,
                });
                true
            }
            None => {
                InboundStats::bump(&self.stats.ignored, envelope.sender_stamp);
                self.event_recorder.record(Event::InboundIgnored {
                    stamp: envelope.sender_stamp,
                    ts_ns,
                    message: envelope.message.name(),
                });
                false
            }
        }
    }

    /// Drains `rx` until every sender is dropped.
    pub fn run(&self, rx: Receiver<Envelope>) {
        while let Ok(envelope) = rx.recv() {
            self.handle(envelope);
        }
        debug!("inbound channel closed; writer exiting");
    }
}
