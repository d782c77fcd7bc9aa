//! Periodic utilization sampling.
//!
//! The sampler owns a dedicated thread that sweeps a [`ResourceProbe`] every
//! period, turns the raw counters into a [`NewMeasurement`] and hands it to a
//! [`MeasurementSink`] (normally the store writer queue).
//!
//! CPU utilization is derived from tick deltas between consecutive sweeps,
//! so the first sweep only establishes a baseline. Per core,
//! `delta_active / delta_total * 100`, summed over cores (a fully loaded
//! 4-core device reads 400). A sweep without a readable battery produces no
//! measurement at all; every other missing value degrades to zero or an
//! empty string.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::probe::{BatteryReading, CoreTicks, MemoryReading, PlatformSnapshot, ResourceProbe};
use crate::store::NewMeasurement;
use crate::store::writer::WriterHandle;
use crate::timestamp::{MonotonicClock, format_stored};

/// Granularity at which a sleeping sampler notices `stop()`.
const STOP_POLL: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// JSON blobs stored alongside each measurement
// ---------------------------------------------------------------------------

/// One element of the `cpu_info` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuCoreInfo {
    pub cpu: usize,
    pub usage: f64,
    pub cpu_all_freqs: String,
    pub cpu_all_governs: String,
    pub cpu_cur_freq: i64,
    pub cpu_cur_govern: String,
    pub cpu_max_freq: i64,
    pub cpu_min_freq: i64,
}

/// The `gpu_info` object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuInfo {
    pub gpu_busy: f64,
    pub gpu_cur_clock: i64,
    pub gpu_govern: String,
    pub gpu_freq_tab: String,
    pub gpu_max_clock: i64,
    pub gpu_min_clock: i64,
}

// ---------------------------------------------------------------------------
// Derived metrics
// ---------------------------------------------------------------------------

/// Utilization of one core between two readings, in percent.
///
/// Zero when no ticks elapsed or the counters went backwards (core hotplug).
pub fn core_utilization(prev: CoreTicks, cur: CoreTicks) -> f64 {
    let (Some(d_active), Some(d_total)) = (
        cur.active.checked_sub(prev.active),
        cur.total.checked_sub(prev.total),
    ) else {
        return 0.0;
    };
    if d_total == 0 {
        return 0.0;
    }
    (d_active as f64 / d_total as f64) * 100.0
}

/// Percentage of memory in use.
pub fn memory_utilization(mem: Option<MemoryReading>) -> f64 {
    match mem {
        Some(m) if m.total > 0 => (1.0 - m.available as f64 / m.total as f64) * 100.0,
        _ => 0.0,
    }
}

/// Parse a percentage-formatted field such as `"37 %"` or `"12%"`.
/// Non-finite values (`nan`, `inf`) are rejected.
pub fn parse_percent(raw: &str) -> Option<f64> {
    raw.split('%')
        .next()?
        .trim()
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
}

/// The stored columns are `NOT NULL` and SQLite binds NaN as NULL.
fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Battery charge in percent, or `None` if the reading is incomplete.
pub fn battery_percent(battery: &BatteryReading) -> Option<f64> {
    let level = battery.level?;
    let scale = battery.scale?;
    if scale == 0 {
        return None;
    }
    Some((level * 100) as f64 / scale as f64)
}

// ---------------------------------------------------------------------------
// Per-iteration state
// ---------------------------------------------------------------------------

/// Tick baseline carried from one sweep to the next.
#[derive(Debug, Default)]
pub struct SamplerState {
    baseline: Option<BTreeMap<usize, CoreTicks>>,
}

impl SamplerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a baseline has been captured yet.
    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// Fold one sweep into the state and build its measurement.
    ///
    /// Returns `None` on the first sweep and whenever the battery is unreadable.
    pub fn step(&mut self, snap: &PlatformSnapshot, time: NaiveDateTime) -> Option<NewMeasurement> {
        let Some(baseline) = self.baseline.as_mut() else {
            self.baseline = Some(snap.cores.iter().map(|c| (c.cpu, c.ticks)).collect());
            return None;
        };

        let mut cpu_util = 0.0;
        let mut cores = Vec::with_capacity(snap.cores.len());
        for core in &snap.cores {
            let usage = baseline
                .get(&core.cpu)
                .map_or(0.0, |prev| core_utilization(*prev, core.ticks));
            baseline.insert(core.cpu, core.ticks);
            cpu_util += usage;
            cores.push(CpuCoreInfo {
                cpu: core.cpu,
                usage,
                cpu_all_freqs: core.freq.available_freqs.clone().unwrap_or_default(),
                cpu_all_governs: core.freq.available_governors.clone().unwrap_or_default(),
                cpu_cur_freq: core.freq.cur_freq.unwrap_or(0),
                cpu_cur_govern: core.freq.governor.clone().unwrap_or_default(),
                cpu_max_freq: core.freq.max_freq.unwrap_or(0),
                cpu_min_freq: core.freq.min_freq.unwrap_or(0),
            });
        }

        let gpu_busy = snap.gpu.busy.as_deref().and_then(parse_percent);
        let gpu = GpuInfo {
            gpu_busy: gpu_busy.unwrap_or(0.0),
            gpu_cur_clock: snap.gpu.cur_clock.unwrap_or(0),
            gpu_govern: snap.gpu.governor.clone().unwrap_or_default(),
            gpu_freq_tab: snap.gpu.freq_table.clone().unwrap_or_default(),
            gpu_max_clock: snap.gpu.max_clock.unwrap_or(0),
            gpu_min_clock: snap.gpu.min_clock.unwrap_or(0),
        };

        let Some(battery_state) = battery_percent(&snap.battery) else {
            log::debug!("battery unreadable; sample skipped");
            return None;
        };

        Some(NewMeasurement {
            time: format_stored(time),
            cpu_util: finite_or_zero(cpu_util),
            mem_util: finite_or_zero(memory_utilization(snap.memory)),
            gpu_util: gpu.gpu_busy,
            battery_state,
            power_consumption: finite_or_zero(snap.battery.power_watts.unwrap_or(0.0)),
            gpu_info: serde_json::to_string(&gpu).unwrap_or_default(),
            cpu_info: serde_json::to_string(&cores).unwrap_or_default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Sampling thread
// ---------------------------------------------------------------------------

/// Destination for finished measurements.
pub trait MeasurementSink: Send + 'static {
    /// Hand off a measurement without blocking. `false` means the sink is gone.
    fn submit(&self, m: NewMeasurement) -> bool;
}

impl MeasurementSink for WriterHandle {
    fn submit(&self, m: NewMeasurement) -> bool {
        self.submit_measurement(m)
    }
}

/// Background sampler. Stopped on drop.
pub struct UtilizationSampler {
    running: Arc<AtomicBool>,
    emitted: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl UtilizationSampler {
    /// Spawn the sampling thread.
    pub fn start<P, S>(probe: P, sink: S, period: Duration) -> std::io::Result<Self>
    where
        P: ResourceProbe + 'static,
        S: MeasurementSink,
    {
        let running = Arc::new(AtomicBool::new(true));
        let emitted = Arc::new(AtomicU64::new(0));
        let thread = {
            let running = Arc::clone(&running);
            let emitted = Arc::clone(&emitted);
            std::thread::Builder::new()
                .name("fedmon-sampler".to_string())
                .spawn(move || sample_loop(probe, sink, period, &running, &emitted))?
        };
        log::info!("sampler started ({}ms period)", period.as_millis());
        Ok(Self {
            running,
            emitted,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some() && self.running.load(Ordering::SeqCst)
    }

    /// Measurements handed to the sink so far.
    pub fn samples_emitted(&self) -> u64 {
        self.emitted.load(Ordering::SeqCst)
    }

    /// Ask the loop to stop and wait for it. The iteration in flight, if any,
    /// still completes. Returns the number of measurements emitted.
    pub fn stop(&mut self) -> u64 {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("sampler thread panicked");
            }
            log::info!("sampler stopped after {} samples", self.samples_emitted());
        }
        self.samples_emitted()
    }
}

impl Drop for UtilizationSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sample_loop<P: ResourceProbe, S: MeasurementSink>(
    mut probe: P,
    sink: S,
    period: Duration,
    running: &AtomicBool,
    emitted: &AtomicU64,
) {
    let mut state = SamplerState::new();
    let mut clock = MonotonicClock::new();

    while running.load(Ordering::SeqCst) {
        let snapshot = probe.read();
        let time = clock.now();
        if let Some(m) = state.step(&snapshot, time) {
            if !sink.submit(m) {
                log::warn!("measurement sink closed; sampler exiting");
                running.store(false, Ordering::SeqCst);
                break;
            }
            emitted.fetch_add(1, Ordering::SeqCst);
        }

        let deadline = Instant::now() + period;
        while running.load(Ordering::SeqCst) {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            std::thread::sleep(left.min(STOP_POLL));
        }
    }
}
