//! CPU and RAM utilization trackers that enrich a report.
//!
//! Platform sampling is an external concern: callers supply a [`CpuProbe`]
//! and a [`MemoryProbe`] that read the host's counters. The trackers turn raw
//! readings into compacted [`TelemetrySeries`] and write their transport forms
//! into the report at the end of the run.

use crate::series::{TelemetryPoint, TelemetrySeries};
use tr_common::Report;
use tracing::{debug, trace};

/// Default precision for CPU series, in percentage points.
pub const DEFAULT_CPU_PRECISION: f64 = 7.0;

/// Default precision for RAM series, in percentage points.
pub const DEFAULT_RAM_PRECISION: f64 = 1.0;

/// Cumulative tick counters for one logical core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    /// Ticks spent doing work (user + nice + system + irq).
    pub busy: u64,
    /// All ticks including idle.
    pub total: u64,
}

/// Point-in-time memory reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

/// Reads per-core CPU counters.
pub trait CpuProbe {
    /// Current counters for every logical core, or `None` when unavailable.
    fn cpu_times(&mut self) -> Option<Vec<CpuTimes>>;
}

/// Reads system memory usage.
pub trait MemoryProbe {
    fn memory(&mut self) -> Option<MemoryStats>;
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Tracks average and peak per-core CPU utilization.
#[derive(Debug, Clone)]
pub struct CpuUtilization {
    precision: f64,
    previous: Option<Vec<CpuTimes>>,
    cpu_count: Option<u32>,
    avg: TelemetrySeries,
    max: TelemetrySeries,
}

impl CpuUtilization {
    pub fn new() -> Self {
        Self::with_precision(DEFAULT_CPU_PRECISION)
    }

    pub fn with_precision(precision: f64) -> Self {
        Self {
            precision,
            previous: None,
            cpu_count: None,
            avg: TelemetrySeries::new(),
            max: TelemetrySeries::new(),
        }
    }

    /// Take a sample at `timestamp`.
    ///
    /// Utilization is measured between consecutive readings, so the first call
    /// only primes the counters.
    pub fn sample(&mut self, probe: &mut dyn CpuProbe, timestamp: u64) {
        let Some(current) = probe.cpu_times() else {
            trace!("cpu probe returned no data");
            return;
        };
        self.cpu_count = u32::try_from(current.len()).ok();

        if let Some(previous) = self.previous.as_ref() {
            let loads: Vec<f64> = previous
                .iter()
                .zip(current.iter())
                .filter_map(|(before, after)| core_load(before, after))
                .collect();
            if !loads.is_empty() {
                let avg = loads.iter().sum::<f64>() / loads.len() as f64;
                let max = loads.iter().copied().fold(0.0, f64::max);
                self.avg.add_point(TelemetryPoint::new(timestamp, avg), self.precision);
                self.max.add_point(TelemetryPoint::new(timestamp, max), self.precision);
            }
        }
        self.previous = Some(current);
    }

    pub fn avg_series(&self) -> &TelemetrySeries {
        &self.avg
    }

    pub fn max_series(&self) -> &TelemetrySeries {
        &self.max
    }

    /// Write `cpuCount`, `cpuAvg` and `cpuMax` into the report.
    pub fn enrich(&self, report: &mut Report) {
        report.cpu_count = self.cpu_count;
        if !self.avg.is_empty() {
            report.cpu_avg = Some(self.avg.to_transport_form());
            report.cpu_max = Some(self.max.to_transport_form());
        }
        debug!(
            cpu_count = ?self.cpu_count,
            points = self.avg.len(),
            "enriched report with cpu telemetry"
        );
    }
}

impl Default for CpuUtilization {
    fn default() -> Self {
        Self::new()
    }
}

fn core_load(before: &CpuTimes, after: &CpuTimes) -> Option<f64> {
    let total = after.total.checked_sub(before.total)?;
    if total == 0 {
        return None;
    }
    let busy = after.busy.saturating_sub(before.busy);
    Some(busy as f64 / total as f64 * 100.0)
}

/// Tracks used-memory percentage.
#[derive(Debug, Clone)]
pub struct RamUtilization {
    precision: f64,
    total_bytes: Option<u64>,
    series: TelemetrySeries,
}

impl RamUtilization {
    pub fn new() -> Self {
        Self::with_precision(DEFAULT_RAM_PRECISION)
    }

    pub fn with_precision(precision: f64) -> Self {
        Self {
            precision,
            total_bytes: None,
            series: TelemetrySeries::new(),
        }
    }

    pub fn sample(&mut self, probe: &mut dyn MemoryProbe, timestamp: u64) {
        let Some(stats) = probe.memory() else {
            trace!("memory probe returned no data");
            return;
        };
        if stats.total_bytes == 0 {
            return;
        }
        self.total_bytes = Some(stats.total_bytes);
        let percent = stats.used_bytes as f64 / stats.total_bytes as f64 * 100.0;
        self.series
            .add_point(TelemetryPoint::new(timestamp, percent), self.precision);
    }

    pub fn series(&self) -> &TelemetrySeries {
        &self.series
    }

    /// Write `ram` and `ramBytes` into the report.
    pub fn enrich(&self, report: &mut Report) {
        report.ram_bytes = self.total_bytes;
        if !self.series.is_empty() {
            report.ram = Some(self.series.to_transport_form());
        }
        debug!(points = self.series.len(), "enriched report with ram telemetry");
    }
}

impl Default for RamUtilization {
    fn default() -> Self {
        Self::new()
    }
}
