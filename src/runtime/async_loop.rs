//! async_loop.rs
//! Tokio variant of the runtime: writer tasks over `tokio::sync::mpsc`, stepper on a
//! `tokio::time::interval` that skips missed ticks instead of bursting.
//!
//! Same controller, same gate and publisher as the threaded runtime; only the
//! scheduling differs.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use log::{debug, warn};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

use crate::runtime::stepper::{Stepper, TickOutcome};
use crate::transport::{message::Envelope, receiver::InboundHandler};

/// Drains one inbound channel until all senders are dropped.
pub async fn async_writer(handler: InboundHandler, mut rx: mpsc::Receiver<Envelope>) {
    while let Some(envelope) = rx.recv().await {
        handler.handle(envelope);
    }
    debug!("async writer exited");
}

/// Steps every `period` until `running` clears or the outbound bus disconnects.
pub async fn async_stepper(mut stepper: Stepper, period: Duration, running: Arc<AtomicBool>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    while running.load(Ordering::Acquire) {
        ticker.tick().await;
        if stepper.tick() == TickOutcome::Disconnected {
            warn!("[AsyncStepper] outbound bus disconnected; stopping");
            break;
        }
    }
    debug!("async stepper exited");
}

/// Spawns one writer task per inbound channel plus the stepper task.
/// Tasks are detached; the caller controls shutdown via `running` and channel drop.
pub fn spawn_async_loop(
    handler: InboundHandler,
    inbound: Vec<mpsc::Receiver<Envelope>>,
    stepper: Stepper,
    period: Duration,
    running: Arc<AtomicBool>,
) -> (Vec<JoinHandle<()>>, JoinHandle<()>) {
    let writers = inbound
        .into_iter()
        .map(|rx| tokio::spawn(async_writer(handler.clone(), rx)))
        .collect();
    let stepper = tokio::spawn(async_stepper(stepper, period, running));
    (writers, stepper)
}
