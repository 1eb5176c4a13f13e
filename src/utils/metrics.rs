//! Metrics collection and event recording for the control loop.
//!
//! Two independent paths:
//! - **EventRecorder:** Lock-free queue (16K capacity) → background CSV export (nanosecond precision).
//! - **Metrics:** Shared mutex buffer for run summaries (bounded to 1000 points per metric).
//!
//! Event tracing captures: inbound envelope → controller step → outbound command.

use std::{
    sync::{Arc, Mutex, MutexGuard, atomic::{AtomicBool, Ordering}},
    collections::VecDeque,
    fs::{create_dir_all, File},
    path::Path,
    io::{BufWriter, Write},
    thread,
    time::{Instant, Duration},
};
use crossbeam_queue::ArrayQueue;
use log::error;

use crate::control::ActuatorCommand;

/// Event lifecycle: inbound value through outbound command.
#[derive(Debug, Clone)]
pub enum Event {
    /// Inbound envelope forwarded to the controller or the drive gate.
    InboundAccepted {
        stamp: u16,
        ts_ns: u64,
        message: &'static str,
        value: f64,
    },
    /// Inbound envelope dropped by the stamp filter.
    InboundIgnored {
        stamp: u16,
        ts_ns: u64,
        message: &'static str,
    },
    /// Controller step finished.
    StepComplete {
        step: u64,
        ts_ns: u64,
        speed_reading: f64,
        speed_request: f64,
        command: ActuatorCommand,
        exec_us: u64,
    },
    /// Tick skipped because the drive gate was not open.
    StepGated {
        ts_ns: u64,
        warming_up: bool,
    },
    /// Outbound envelope handed to the bus (or dropped).
    CommandSent {
        stamp: u16,
        ts_ns: u64,
        message: &'static str,
        enqueued: bool,
    },
}

impl Event {
    /// Converts event to CSV row format: component,event,ts_ns,field1,field2,field3,field4
    pub fn to_csv_row(&self) -> String {
        match self {
            Event::InboundAccepted { stamp, ts_ns, message, value } => {
                format!("writer,InboundAccepted,{},{},{},{},", ts_ns, stamp, message, value)
            }
            Event::InboundIgnored { stamp, ts_ns, message } => {
                format!("writer,InboundIgnored,{},{},{},,", ts_ns, stamp, message)
            }
            Event::StepComplete { step, ts_ns, speed_reading, speed_request, command, exec_us } => {
                format!(
                    "stepper,StepComplete,{},{},reading={:.3};request={:.3},torque={}/{};brake={},{}",
                    ts_ns,
                    step,
                    speed_reading,
                    speed_request,
                    command.torque_left,
                    command.torque_right,
                    command.brake_duty_cycle_ns,
                    exec_us
                )
            }
            Event::StepGated { ts_ns, warming_up } => {
                format!("stepper,StepGated,{},{},,,", ts_ns, warming_up)
            }
            Event::CommandSent { stamp, ts_ns, message, enqueued } => {
                format!("publisher,CommandSent,{},{},{},{},", ts_ns, stamp, message, enqueued)
            }
        }
    }
}

const EVENT_QUEUE_CAPACITY: usize = 16_384;

/// Non-blocking event recorder with background CSV export.
///
/// `record()` appends to a lock-free queue and returns immediately; events are
/// dropped silently when the queue is full so no control context ever blocks on it.
pub struct EventRecorder {
    queue: Arc<ArrayQueue<Event>>,
    run_start: Instant,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(EVENT_QUEUE_CAPACITY)),
            run_start: Instant::now(),
        }
    }

    #[inline]
    pub fn record(&self, event: Event) {
        let _ = self.queue.push(event);
    }

    /// Nanosecond timestamp since recorder creation.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.run_start.elapsed().as_nanos() as u64
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pops the oldest pending event (tests and in-process consumers).
    pub fn pop(&self) -> Option<Event> {
        self.queue.pop()
    }

    /// Spawns background thread draining queue → CSV file.
    /// Exits once `running` is cleared and the queue is drained.
    pub fn start_exporter(
        &self,
        output_csv: String,
        running: Arc<AtomicBool>,
    ) -> thread::JoinHandle<()> {
        let queue = self.queue.clone();

        thread::spawn(move || {
            if let Some(dir) = Path::new(&output_csv).parent().filter(|d| !d.as_os_str().is_empty()) {
                if let Err(e) = create_dir_all(dir) {
                    error!("Failed to create log directory {:?}: {}", dir, e);
                }
            }
            let file = match File::create(&output_csv) {
                Ok(f) => f,
                Err(e) => {
                    error!("Failed to create event CSV {}: {}", output_csv, e);
                    return;
                }
            };
            let mut writer = BufWriter::new(file);
            let _ = writeln!(writer, "component,event,ts_ns,field1,field2,field3,field4");

            loop {
                match queue.pop() {
                    Some(event) => {
                        let _ = writeln!(writer, "{}", event.to_csv_row());
                    }
                    None => {
                        if !running.load(Ordering::Acquire) && queue.is_empty() {
                            break;
                        }
                        thread::sleep(Duration::from_millis(10));
                    }
                }
            }

            let _ = writer.flush();
        })
    }
}

impl Clone for EventRecorder {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            run_start: self.run_start,
        }
    }
}

/// Run metrics: input/output histories, timing, deadline misses.
#[derive(Default, Clone)]
pub struct Metrics {
    /// Inputs seen by the stepper (last 1000 steps)
    pub speed_reading: VecDeque<f64>,
    pub speed_request: VecDeque<f64>,

    /// Outputs (last 1000 commands)
    pub torque_left: VecDeque<f64>,
    pub torque_right: VecDeque<f64>,
    pub brake_duty: VecDeque<f64>,

    /// Timing (microseconds)
    pub step_exec_us: VecDeque<u64>,
    pub jitter_us: VecDeque<u64>,

    pub deadline_miss: u64,
    pub total_steps: u64,
    pub gated_ticks: u64,
    pub held_steps: u64,
    pub sent: u64,
    pub send_drops: u64,
}

impl Metrics {
    pub fn record_command(&mut self, reading: f64, request: f64, command: &ActuatorCommand) {
        push_capped(&mut self.speed_reading, reading);
        push_capped(&mut self.speed_request, request);
        push_capped(&mut self.torque_left, command.torque_left as f64);
        push_capped(&mut self.torque_right, command.torque_right as f64);
        push_capped(&mut self.brake_duty, command.brake_duty_cycle_ns as f64);
        self.total_steps += 1;
    }
}

pub type SharedMetrics = Arc<Mutex<Metrics>>;

pub fn shared_metrics() -> SharedMetrics {
    Arc::new(Mutex::new(Metrics::default()))
}

/// Locks metrics, recovering the guard if a panicking thread poisoned it.
pub fn lock_metrics(metrics: &SharedMetrics) -> MutexGuard<'_, Metrics> {
    match metrics.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub const MAX_POINTS: usize = 1_000;

/// Appends value to metrics buffer; removes oldest if at capacity (FIFO).
#[inline]
pub fn push_capped(buf: &mut VecDeque<f64>, val: f64) {
    if buf.len() >= MAX_POINTS {
        buf.pop_front();
    }
    buf.push_back(val);
}

/// Appends u64 value to metrics buffer; removes oldest if at capacity.
#[inline]
pub fn push_capped_u64(buf: &mut VecDeque<u64>, val: u64) {
    if buf.len() >= MAX_POINTS {
        buf.pop_front();
    }
    buf.push_back(val);
}
