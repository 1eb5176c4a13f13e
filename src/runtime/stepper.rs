//! stepper.rs
//! Periodic stepper context: the only caller of `Controller::step`.
//! - release every `dt` with spin_sleep pacing, thread spawned at max OS priority
//! - drive gate consulted each tick; leaving the open state resets the controller and
//!   publishes one released command
//! - step + publish must finish within `deadline_us`, misses are counted and logged

use spin_sleep::{SpinSleeper, SpinStrategy};
use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use log::{debug, info, warn};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use crate::control::{ActuatorCommand, Controller};
use crate::runtime::gate::{DriveGate, GateDecision};
use crate::transport::publisher::CommandPublisher;
use crate::utils::metrics::{
    lock_metrics, push_capped_u64, Event, EventRecorder, SharedMetrics,
};

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Gated(GateDecision),
    /// Gate just closed; controller reset and released command published.
    Released,
    Stepped(ActuatorCommand),
    /// Outbound bus is gone.
    Disconnected,
}

pub struct Stepper {
    controller: Arc<Controller>,
    gate: Arc<DriveGate>,
    publisher: CommandPublisher,
    running: Arc<AtomicBool>,
    metrics: SharedMetrics,
    event_recorder: Arc<EventRecorder>,
    deadline_us: u64,
    was_open: bool,
}

impl Stepper {
    pub fn new(
        controller: Arc<Controller>,
        gate: Arc<DriveGate>,
        publisher: CommandPublisher,
        running: Arc<AtomicBool>,
        metrics: SharedMetrics,
        event_recorder: Arc<EventRecorder>,
        deadline_us: u64,
    ) -> Self {
        Self {
            controller,
            gate,
            publisher,
            running,
            metrics,
            event_recorder,
            deadline_us,
            was_open: false,
        }
    }

    /// One period's work, without pacing.
    pub fn tick(&mut self) -> TickOutcome {
        let decision = self.gate.tick();

        if decision != GateDecision::Open {
            let ts_ns = self.event_recorder.now_ns();
            self.event_recorder.record(Event::StepGated {
                ts_ns,
                warming_up: decision == GateDecision::WarmingUp,
            });
            lock_metrics(&self.metrics).gated_ticks += 1;

            if self.was_open {
                self.was_open = false;
                self.controller.reset();
                info!("[Stepper] drive gate closed; controller reset");
                let outcome = self.publisher.publish(&ActuatorCommand::default());
                self.account_publish(outcome.sent, outcome.dropped);
                if outcome.disconnected {
                    return TickOutcome::Disconnected;
                }
                return TickOutcome::Released;
            }
            return TickOutcome::Gated(decision);
        }

        if !self.was_open {
            info!("[Stepper] drive gate open");
            self.was_open = true;
        }

        let start = Instant::now();
        let command = self.controller.step();
        let outcome = self.publisher.publish(&command);
        let exec_us = start.elapsed().as_micros() as u64;

        let snap = self.controller.snapshot();
        self.event_recorder.record(Event::StepComplete {
            step: snap.steps,
            ts_ns: self.event_recorder.now_ns(),
            speed_reading: snap.speed_reading,
            speed_request: snap.speed_request,
            command,
            exec_us,
        });

        {
            let mut m = lock_metrics(&self.metrics);
            m.record_command(snap.speed_reading, snap.speed_request, &command);
            push_capped_u64(&mut m.step_exec_us, exec_us);
            m.held_steps = snap.held_steps;
            if exec_us > self.deadline_us {
                m.deadline_miss += 1;
            }
        }
        self.account_publish(outcome.sent, outcome.dropped);

        if exec_us > self.deadline_us {
            warn!(
                "[Stepper] step #{} took {} µs (deadline {} µs)",
                snap.steps, exec_us, self.deadline_us
            );
        }

        if outcome.disconnected {
            TickOutcome::Disconnected
        } else {
            TickOutcome::Stepped(command)
        }
    }

    fn account_publish(&self, sent: u32, dropped: u32) {
        let mut m = lock_metrics(&self.metrics);
        m.sent += sent as u64;
        m.send_drops += dropped as u64;
    }

    /// Paced loop; returns when `running` clears or the outbound bus disconnects.
    pub fn run(mut self) {
        let period = Duration::from_secs_f64(self.controller.config().dt());
        let period_us = period.as_micros() as u64;
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);

        let mut next_release = Instant::now() + period;
        let mut last_tick = Instant::now();

        while self.running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now < next_release {
                sleeper.sleep(next_release - now);
            } else {
                lock_metrics(&self.metrics).deadline_miss += 1;
                debug!("[Stepper] release late by {:?}", now - next_release);
            }

            let release = Instant::now();
            let jitter_us = (release.duration_since(last_tick).as_micros() as u64).abs_diff(period_us);
            last_tick = release;
            push_capped_u64(&mut lock_metrics(&self.metrics).jitter_us, jitter_us);

            if self.tick() == TickOutcome::Disconnected {
                warn!("[Stepper] outbound bus disconnected; stopping");
                break;
            }

            next_release += period;
            // missed periods are skipped, never replayed in a burst
            let now = Instant::now();
            while next_release < now {
                next_release += period;
            }
        }

        debug!("[Stepper] stopped.");
    }
}

/// Spawns the stepper on its own thread at maximum OS priority.
pub fn spawn_stepper(stepper: Stepper) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stepper".to_string())
        .spawn_with_priority(ThreadPriority::Max, move |priority| {
            if let Err(e) = priority {
                // unprivileged runs keep the default priority
                debug!("[Stepper] could not raise priority: {:?}", e);
            }
            stepper.run();
        })
}
