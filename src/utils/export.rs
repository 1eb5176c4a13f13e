//! End-of-run summary export.
//!
//! `metric,value,description` rows: step counts, deadline misses, timing and
//! command statistics (mean / max via `average`), inbound accept/ignore totals.

use average::{Max, Mean, Min};
use std::{
    collections::VecDeque,
    fs::{create_dir_all, write},
    io,
    path::Path,
};
use log::{error, info};

use crate::transport::receiver::InboundStats;
use crate::utils::metrics::{lock_metrics, SharedMetrics};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

pub fn calculate_stats<I>(data: I) -> Option<Stats>
where
    I: IntoIterator<Item = f64> + Clone,
{
    let mean: Mean = data.clone().into_iter().collect();
    if mean.is_empty() {
        return None;
    }
    let min: Min = data.clone().into_iter().collect();
    let max: Max = data.into_iter().collect();
    Some(Stats {
        min: min.min(),
        max: max.max(),
        mean: mean.mean(),
        count: mean.len() as usize,
    })
}

fn stats_f64(data: &VecDeque<f64>) -> Option<Stats> {
    calculate_stats(data.iter().copied())
}

fn stats_u64(data: &VecDeque<u64>) -> Option<Stats> {
    calculate_stats(data.iter().map(|&x| x as f64))
}

fn push_stats(csv: &mut String, prefix: &str, unit: &str, stats: Option<Stats>) {
    if let Some(s) = stats {
        csv.push_str(&format!("{prefix}_min,{:.2},Minimum {unit}\n", s.min));
        csv.push_str(&format!("{prefix}_max,{:.2},Maximum {unit}\n", s.max));
        csv.push_str(&format!("{prefix}_avg,{:.2},Average {unit}\n", s.mean));
    }
}

/// Builds the summary CSV text.
pub fn summary_csv(metrics: &SharedMetrics, inbound: &InboundStats) -> String {
    let m = lock_metrics(metrics);
    let mut csv = String::from("metric,value,description\n");

    csv.push_str(&format!("total_steps,{},Controller steps executed\n", m.total_steps));
    csv.push_str(&format!("gated_ticks,{},Ticks skipped by the drive gate\n", m.gated_ticks));
    csv.push_str(&format!("held_steps,{},Steps that held the previous command\n", m.held_steps));
    csv.push_str(&format!("deadline_misses,{},Late releases and over-budget steps\n", m.deadline_miss));
    csv.push_str(&format!("sent,{},Outbound envelopes enqueued\n", m.sent));
    csv.push_str(&format!("send_drops,{},Outbound envelopes dropped\n", m.send_drops));
    csv.push_str(&format!("inbound_accepted,{},Inbound envelopes applied\n", inbound.total_accepted()));
    csv.push_str(&format!("inbound_ignored,{},Inbound envelopes with foreign stamps\n", inbound.total_ignored()));

    push_stats(&mut csv, "step_exec_us", "step execution time", stats_u64(&m.step_exec_us));
    push_stats(&mut csv, "jitter_us", "release jitter", stats_u64(&m.jitter_us));
    push_stats(&mut csv, "speed_reading", "speed reading", stats_f64(&m.speed_reading));
    push_stats(&mut csv, "speed_request", "speed request", stats_f64(&m.speed_request));
    push_stats(&mut csv, "torque_left", "left torque command", stats_f64(&m.torque_left));
    push_stats(&mut csv, "torque_right", "right torque command", stats_f64(&m.torque_right));

    csv
}

pub fn export_summary(
    metrics: &SharedMetrics,
    inbound: &InboundStats,
    path: impl AsRef<Path>,
) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        create_dir_all(dir)?;
    }
    write(path, summary_csv(metrics, inbound))
}

/// Writes the summary and logs the outcome; never fails the run.
pub fn run_exports(metrics: &SharedMetrics, inbound: &InboundStats, path: &str) {
    match export_summary(metrics, inbound, path) {
        Ok(()) => info!("Summary metrics exported to: {}", path),
        Err(e) => error!("Failed to export metrics to {}: {}", path, e),
    }
}
