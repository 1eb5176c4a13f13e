//! # Longitudinal controller entry point (threaded runtime)
//!
//! Wires the controller into its execution contexts:
//! - **Replay:** drive log → bounded inbound channel (stands in for the vehicle bus).
//! - **Writer:** filters stamped envelopes → controller setters / drive gate.
//! - **Stepper:** max-priority thread, spin_sleep paced at `dt`, steps and publishes.
//! - **Bus sink:** drains outbound requests (dual torque, per-wheel torque, brake).
//!
//! ## Usage
//! `longitudinal_ctrl [params.toml] [drive_log.csv] [--verbose]`
//!
//! ## Outputs
//! - `runtime.events_csv`: event trace (nanosecond timestamps).
//! - `runtime.summary_csv`: end-of-run summary.
//!
//! Exit codes: 1 usage / I/O, 2 invalid configuration.

use std::{
    process::ExitCode,
    sync::{Arc, atomic::{AtomicBool, Ordering}},
    thread,
    time::{Duration, Instant},
};
use crossbeam::channel::bounded;
use env_logger::Env;
use log::{debug, error, info};

use longitudinal_ctrl::{
    control::Controller,
    runtime::{
        gate::DriveGate,
        replay::{load_replay, replay},
        stepper::{spawn_stepper, Stepper},
        writer::spawn_writer,
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

const DEFAULT_PARAMS: &str = "params/longitudinal.toml";
const DEFAULT_DRIVE_LOG: &str = "data/drive_replay.csv";

struct Args {
    params: String,
    drive_log: String,
    verbose: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut positional = Vec::new();
    let mut verbose = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--verbose" | "-v" => verbose = true,
            flag if flag.starts_with('-') => return Err(format!("unknown option '{}'", flag)),
            _ => positional.push(arg),
        }
    }
    if positional.len() > 2 {
        return Err("too many arguments".to_string());
    }
    let mut positional = positional.into_iter();
    Ok(Args {
        params: positional.next().unwrap_or_else(|| DEFAULT_PARAMS.to_string()),
        drive_log: positional.next().unwrap_or_else(|| DEFAULT_DRIVE_LOG.to_string()),
        verbose,
    })
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!("usage: longitudinal_ctrl [params.toml] [drive_log.csv] [--verbose]");
            return ExitCode::from(1);
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }))
        .init();
    info!("=== LONGITUDINAL CONTROL START ===");

    let params = match params::load(&args.params) {
        Ok(p) => p,
        Err(params::ParamsError::Io { path, source }) => {
            error!("cannot read parameter file {}: {}", path, source);
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
    let entries = match load_replay(&args.drive_log) {
        Ok(e) => e,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };

    let rt = params.runtime;
    info!(
        "[Main] dt={} s ({:.0} Hz), kp={}, ki={}, torque_limit={}, brake={}, replay rows={}",
        config.dt(),
        config.frequency_hz(),
        config.kp(),
        config.ki(),
        config.torque_limit(),
        config.brake().is_some(),
        entries.len()
    );

    // ========================================================================
    // Shared state
    // ========================================================================
    let running = Arc::new(AtomicBool::new(true));
    let metrics = shared_metrics();
    let event_recorder = Arc::new(EventRecorder::new());
    let exporter = event_recorder.start_exporter(rt.events_csv.clone(), running.clone());

    let gate = Arc::new(if rt.require_as_state {
        DriveGate::with_warmup(rt.warmup_s, config.frequency_hz())
    } else {
        DriveGate::always_open()
    });
    let controller = Arc::new(Controller::new(config));
    let inbound_stats = InboundStats::default();

    let (tx_in, rx_in) = bounded::<Envelope>(rt.inbound_capacity);
    let (tx_out, rx_out) = bounded::<Envelope>(rt.outbound_capacity);

    // ========================================================================
    // Execution contexts
    // ========================================================================
    let handler = InboundHandler::new(
        controller.clone(),
        gate.clone(),
        inbound_stats.clone(),
        event_recorder.clone(),
    );
    let writer = match spawn_writer("bus", handler, rx_in) {
        Ok(h) => h,
        Err(e) => {
            error!("failed to spawn writer: {}", e);
            return ExitCode::from(1);
        }
    };

    let stepper = Stepper::new(
        controller.clone(),
        gate,
        CommandPublisher::new(tx_out, event_recorder.clone()),
        running.clone(),
        metrics.clone(),
        event_recorder.clone(),
        rt.deadline_us,
    );
    let stepper = match spawn_stepper(stepper) {
        Ok(h) => h,
        Err(e) => {
            error!("failed to spawn stepper: {}", e);
            running.store(false, Ordering::Release);
            return ExitCode::from(1);
        }
    };

    let sink = thread::spawn(move || {
        let mut received = 0u64;
        while let Ok(envelope) = rx_out.recv() {
            received += 1;
            debug!("[Bus] {} from {}", envelope.message.name(), envelope.sender_stamp);
        }
        received
    });

    let replay_handle = {
        let running = running.clone();
        thread::spawn(move || replay(&entries, &tx_in, &running))
    };

    // ========================================================================
    // Run until the drive log is exhausted or the duration elapses
    // ========================================================================
    let started = Instant::now();
    let limit = Duration::from_secs(rt.duration_s);
    while !replay_handle.is_finished() && started.elapsed() < limit {
        thread::sleep(Duration::from_millis(100));
    }
    // let the last values settle through a few periods
    thread::sleep(Duration::from_millis(200));

    info!("[Main] Shutting down after {:.1} s", started.elapsed().as_secs_f64());
    running.store(false, Ordering::Release);

    let delivered = replay_handle.join().unwrap_or(0);
    let _ = writer.join();
    let _ = stepper.join();
    let received = sink.join().unwrap_or(0);
    let _ = exporter.join();

    run_exports(&metrics, &inbound_stats, &rt.summary_csv);

    let snap = controller.snapshot();
    info!(
        "[Main] replayed={} steps={} held={} outbound={} last_command=({}, {}, brake {})",
        delivered,
        snap.steps,
        snap.held_steps,
        received,
        snap.command.torque_left,
        snap.command.torque_right,
        snap.command.brake_duty_cycle_ns
    );
    info!("=== LONGITUDINAL CONTROL FINISHED ===");
    ExitCode::SUCCESS
}
