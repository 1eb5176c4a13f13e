//! message.rs
//! Typed messages exchanged with the vehicle bus, wrapped in a stamped envelope.

use std::time::Instant;

/// Sender stamps of the deployed vehicle network.
pub mod stamps {
    // inbound
    pub const GROUND_SPEED_READING: u16 = 3000;
    pub const GROUND_SPEED_REQUEST: u16 = 2201;
    pub const AS_STATE: u16 = 2101;
    // local defaults, not assigned on the deployed network; match them to the bus configuration
    pub const WHEEL_SPEED_LEFT: u16 = 1903;
    pub const WHEEL_SPEED_RIGHT: u16 = 1904;

    // outbound
    pub const TORQUE_REQUEST_DUAL: u16 = 2101;
    pub const TORQUE_REQUEST_LEFT: u16 = 2102;
    pub const TORQUE_REQUEST_RIGHT: u16 = 2103;
    pub const BRAKE_REQUEST: u16 = 2150;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    GroundSpeedReading { ground_speed: f64 },
    GroundSpeedRequest { ground_speed: f64 },
    WheelSpeedReading { side: WheelSide, speed: f64 },
    /// Autonomous-system state from the external state machine.
    SwitchStateReading { state: i32 },
    TorqueRequestDual { torque_left: i32, torque_right: i32 },
    TorqueRequest { torque: i32 },
    PulseWidthModulationRequest { duty_cycle_ns: u32 },
}

impl Message {
    pub fn name(&self) -> &'static str {
        match self {
            Message::GroundSpeedReading { .. } => "GroundSpeedReading",
            Message::GroundSpeedRequest { .. } => "GroundSpeedRequest",
            Message::WheelSpeedReading { .. } => "WheelSpeedReading",
            Message::SwitchStateReading { .. } => "SwitchStateReading",
            Message::TorqueRequestDual { .. } => "TorqueRequestDual",
            Message::TorqueRequest { .. } => "TorqueRequest",
            Message::PulseWidthModulationRequest { .. } => "PulseWidthModulationRequest",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    pub sender_stamp: u16,
    pub sent_at: Instant,
    pub message: Message,
}

impl Envelope {
    pub fn new(sender_stamp: u16, message: Message) -> Self {
        Self {
            sender_stamp,
            sent_at: Instant::now(),
            message,
        }
    }
}
