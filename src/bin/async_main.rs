//! Async runtime variant of the longitudinal controller (async_main binary).
//!
//! Same controller, gate and publisher as the threaded binary; writer and stepper run
//! as tokio tasks (stepper on an interval that skips missed ticks). The drive log is
//! replayed by an async task, outbound requests are drained by a blocking thread.
//!
//! Usage: `async_main [params.toml] [drive_log.csv] [--verbose]`

use std::{
    process::ExitCode,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use env_logger::Env;
use log::{debug, error, info};
use tokio::{
    sync::mpsc,
    time::{sleep_until, Duration, Instant},
};

use longitudinal_ctrl::{
    control::Controller,
    runtime::{
        async_loop::spawn_async_loop,
        gate::DriveGate,
        replay::{load_replay, ReplayEntry},
        stepper::Stepper,
    },
    transport::{
        message::Envelope,
        publisher::CommandPublisher,
        receiver::{InboundHandler, InboundStats},
    },
    utils::{
        export::run_exports,
        metrics::{shared_metrics, EventRecorder},
        params,
    },
};

/// Feeds drive-log entries onto the inbound channel at their offsets.
async fn async_replay(entries: Vec<ReplayEntry>, tx: mpsc::Sender<Envelope>, running: Arc<AtomicBool>) -> usize {
    let start = Instant::now();
    let mut delivered = 0;
    for entry in entries {
        if !running.load(Ordering::Acquire) {
            break;
        }
        sleep_until(start + entry.offset).await;
        if tx.send(Envelope::new(entry.sender_stamp, entry.message)).await.is_err() {
            break;
        }
        delivered += 1;
    }
    delivered
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    let mut positional = args.iter().filter(|a| !a.starts_with('-'));
    let params_path = positional.next().map(String::as_str).unwrap_or("params/longitudinal.toml");
    let log_path = positional.next().map(String::as_str).unwrap_or("data/drive_replay.csv");
    if positional.next().is_some() {
        eprintln!("usage: async_main [params.toml] [drive_log.csv] [--verbose]");
        return ExitCode::from(1);
    }

    env_logger::Builder::from_env(Env::default().default_filter_or(if verbose { "debug" } else { "info" }))
        .init();
    info!("=== ASYNC LONGITUDINAL CONTROL START ===");

    let params = match params::load(params_path) {
        Ok(p) => p,
        Err(e @ params::ParamsError::Io { .. }) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };
    let config = match params.controller_config() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };
    let entries = match load_replay(log_path) {
        Ok(e) => e,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };
    let rt = params.runtime;

    // Shared state: metrics, event recorder, controller, gate
    let running = Arc::new(AtomicBool::new(true));
    let metrics = shared_metrics();
    let event_recorder = Arc::new(EventRecorder::new());
    let exporter = event_recorder.start_exporter(rt.events_csv.clone(), running.clone());

    let period = Duration::from_secs_f64(config.dt());
    let gate = Arc::new(if rt.require_as_state {
        DriveGate::with_warmup(rt.warmup_s, config.frequency_hz())
    } else {
        DriveGate::always_open()
    });
    let controller = Arc::new(Controller::new(config));
    let inbound_stats = InboundStats::default();

    let (tx_in, rx_in) = mpsc::channel::<Envelope>(rt.inbound_capacity);
    let (tx_out, rx_out) = crossbeam::channel::bounded::<Envelope>(rt.outbound_capacity);

    let handler = InboundHandler::new(
        controller.clone(),
        gate.clone(),
        inbound_stats.clone(),
        event_recorder.clone(),
    );
    let stepper = Stepper::new(
        controller.clone(),
        gate,
        CommandPublisher::new(tx_out, event_recorder.clone()),
        running.clone(),
        metrics.clone(),
        event_recorder.clone(),
        rt.deadline_us,
    );
    let (writers, stepper) = spawn_async_loop(handler, vec![rx_in], stepper, period, running.clone());

    // Blocking bus sink: drains outbound requests
    let sink = thread::spawn(move || {
        let mut received = 0u64;
        while let Ok(envelope) = rx_out.recv() {
            received += 1;
            debug!("[Bus] {} from {}", envelope.message.name(), envelope.sender_stamp);
        }
        received
    });

    let mut replay_task = tokio::spawn(async_replay(entries, tx_in, running.clone()));
    let delivered = tokio::select! {
        res = &mut replay_task => res.unwrap_or(0),
        _ = tokio::time::sleep(Duration::from_secs(rt.duration_s)) => {
            info!("[AsyncMain] duration elapsed before the drive log ended");
            replay_task.abort();
            0
        }
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    running.store(false, Ordering::Release);
    let _ = stepper.await;
    for w in writers {
        let _ = w.await;
    }
    let received = tokio::task::spawn_blocking(move || {
        let received = sink.join().unwrap_or(0);
        let _ = exporter.join();
        received
    })
    .await
    .unwrap_or(0);

    run_exports(&metrics, &inbound_stats, &rt.summary_csv);

    let snap = controller.snapshot();
    info!(
        "[AsyncMain] replayed={} steps={} held={} outbound={}",
        delivered, snap.steps, snap.held_steps, received
    );
    info!("=== ASYNC LONGITUDINAL CONTROL FINISHED ===");
    ExitCode::SUCCESS
}
