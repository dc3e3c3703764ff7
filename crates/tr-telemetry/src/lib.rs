//! testrelay telemetry.
//!
//! This crate provides:
//! - Greedy streaming compaction of utilization time series
//! - A delta-encoded transport form for compacted series
//! - CPU/RAM trackers that enrich a report from caller-supplied probes

pub mod series;
pub mod utilization;

pub use series::{decode_transport_form, TelemetryPoint, TelemetrySeries, MAX_VALUE, MIN_VALUE};
pub use utilization::{
    now_ms, CpuProbe, CpuTimes, CpuUtilization, MemoryProbe, MemoryStats, RamUtilization,
    DEFAULT_CPU_PRECISION, DEFAULT_RAM_PRECISION,
};
