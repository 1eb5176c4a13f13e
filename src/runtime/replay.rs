//! replay.rs
//! Drive-log replay: reads `t_s,stamp,kind,value` rows and pushes them onto an inbound
//! channel at their recorded offsets from replay start.
//!
//! `kind` is one of `ground_speed_reading`, `ground_speed_request`,
//! `wheel_speed_left`, `wheel_speed_right`, `switch_state`.

use crossbeam::channel::Sender;
use log::{debug, info};
use serde::Deserialize;
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::{
    io,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};
use thiserror::Error;

use crate::transport::message::{Envelope, Message, WheelSide};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("cannot read drive log: {0}")]
    Io(#[from] io::Error),
    #[error("malformed drive log row: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: unknown kind '{kind}'")]
    UnknownKind { row: usize, kind: String },
    #[error("row {row}: timestamp {t_s} goes backwards or is not finite")]
    BadTimestamp { row: usize, t_s: f64 },
}

#[derive(Debug, Deserialize)]
struct ReplayRow {
    t_s: f64,
    stamp: u16,
    kind: String,
    value: f64,
}

/// One parsed drive-log entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayEntry {
    pub offset: Duration,
    pub sender_stamp: u16,
    pub message: Message,
}

fn to_message(kind: &str, value: f64) -> Option<Message> {
    match kind {
        "ground_speed_reading" => Some(Message::GroundSpeedReading { ground_speed: value }),
        "ground_speed_request" => Some(Message::GroundSpeedRequest { ground_speed: value }),
        "wheel_speed_left" => Some(Message::WheelSpeedReading { side: WheelSide::Left, speed: value }),
        "wheel_speed_right" => Some(Message::WheelSpeedReading { side: WheelSide::Right, speed: value }),
        "switch_state" => Some(Message::SwitchStateReading { state: value as i32 }),
        _ => None,
    }
}

/// Parses a drive log from any reader; rows must be in time order.
pub fn parse_replay<R: io::Read>(reader: R) -> Result<Vec<ReplayEntry>, ReplayError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut entries = Vec::new();
    let mut last_t = 0.0;

    for (i, row) in rdr.deserialize::<ReplayRow>().enumerate() {
        let row = row?;
        let line = i + 2;
        let bad_timestamp = || ReplayError::BadTimestamp { row: line, t_s: row.t_s };
        if row.t_s < last_t {
            return Err(bad_timestamp());
        }
        // rejects NaN, infinities and values beyond Duration's range
        let offset = Duration::try_from_secs_f64(row.t_s).map_err(|_| bad_timestamp())?;
        last_t = row.t_s;

        let message = to_message(&row.kind, row.value).ok_or_else(|| ReplayError::UnknownKind {
            row: line,
            kind: row.kind.clone(),
        })?;

        entries.push(ReplayEntry {
            offset,
            sender_stamp: row.stamp,
            message,
        });
    }

    Ok(entries)
}

pub fn load_replay(path: impl AsRef<Path>) -> Result<Vec<ReplayEntry>, ReplayError> {
    let file = std::fs::File::open(path.as_ref())?;
    parse_replay(io::BufReader::new(file))
}

/// Sends entries at their offsets; returns how many were delivered.
/// Stops early when `running` clears or the receiver is gone.
pub fn replay(entries: &[ReplayEntry], tx: &Sender<Envelope>, running: &Arc<AtomicBool>) -> usize {
    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
    let start = Instant::now();
    let mut delivered = 0;

    for entry in entries {
        if !running.load(Ordering::Acquire) {
            break;
        }
        let due = start + entry.offset;
        let now = Instant::now();
        if now < due {
            sleeper.sleep(due - now);
        }
        if tx.send(Envelope::new(entry.sender_stamp, entry.message)).is_err() {
            debug!("[Replay] inbound channel closed");
            break;
        }
        delivered += 1;
    }

    info!("[Replay] delivered {} of {} entries", delivered, entries.len());
    delivered
}
